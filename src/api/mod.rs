//! Purpose: Define the stable public Rust API boundary for graphkit.
//! Exports: Node/cursor types, the transport seam, `HttpTransport`, errors.
//! Role: Public, additive-only surface used by the CLI and by callers.
//! Invariants: Everything a caller needs is reachable from this module.

mod http;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::attrs::Attributes;
pub use crate::core::cursor::{Cursor, PageEnvelope, PageLinks};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::node::Node;
pub use crate::core::schema::{AnyNode, ID_FIELD, NodeType};
pub use crate::core::transport::{
    Method, Params, RequestPath, SharedTransport, Transport, clear_default_transport,
    default_transport, set_default_transport,
};
pub use async_trait::async_trait;
pub use http::HttpTransport;
