//! Purpose: Define the transport collaborator every remote operation goes through.
//! Exports: `Transport`, `SharedTransport`, `Method`, `RequestPath`, `Params`, default registry.
//! Role: Seam between the object layer and HTTP (or test stubs).
//! Invariants: Transports are shared read-only; this crate never mutates one.
//! Invariants: Errors returned by a transport are propagated without wrapping.
use crate::core::error::Error;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Request parameters. Non-string scalars travel in their JSON text form.
pub type Params = Map<String, Value>;

pub type SharedTransport = Arc<dyn Transport>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RequestPath {
    /// Path built locally, relative to the transport's root.
    Segments(Vec<String>),
    /// Continuation token issued by the server, used verbatim.
    Absolute(String),
}

impl RequestPath {
    pub fn root() -> Self {
        Self::Segments(Vec::new())
    }

    pub fn segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Segments(segments.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestPath::Segments(segments) => write!(f, "/{}", segments.join("/")),
            RequestPath::Absolute(token) => f.write_str(token),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues one request. Read responses are a field mapping, a paginated
    /// envelope, or an id-keyed mapping depending on the call.
    async fn call(
        &self,
        method: Method,
        path: &RequestPath,
        params: &Params,
    ) -> Result<Value, Error>;
}

static DEFAULT_TRANSPORT: RwLock<Option<SharedTransport>> = RwLock::new(None);

/// Registers the transport used by nodes constructed without one.
pub fn set_default_transport(transport: SharedTransport) {
    let mut slot = DEFAULT_TRANSPORT
        .write()
        .unwrap_or_else(|poison| poison.into_inner());
    *slot = Some(transport);
}

pub fn default_transport() -> Option<SharedTransport> {
    DEFAULT_TRANSPORT
        .read()
        .unwrap_or_else(|poison| poison.into_inner())
        .clone()
}

pub fn clear_default_transport() {
    let mut slot = DEFAULT_TRANSPORT
        .write()
        .unwrap_or_else(|poison| poison.into_inner());
    *slot = None;
}
