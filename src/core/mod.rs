// Object layer: attribute storage, tracked nodes, edge cursors and the transport seam.
pub mod attrs;
pub mod cursor;
pub mod error;
pub mod node;
pub mod schema;
pub mod transport;
