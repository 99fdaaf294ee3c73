// Type-level schema declared by each concrete node type.
use crate::core::error::Error;
use crate::core::node::Node;

/// Field holding a node's identity.
pub const ID_FIELD: &str = "id";

/// A concrete kind of node on the remote graph.
///
/// `FIELDS` pre-registers accessors and does not restrict which fields may be
/// set. `ENDPOINT` names the relationship under which nodes of this type are
/// listed when they are the target of an edge (`{source}/{ENDPOINT}`).
pub trait NodeType: Send + Sync + Sized + 'static {
    const FIELDS: &'static [&'static str];
    const ENDPOINT: &'static str;

    /// Path segments addressing `node` remotely. Composite types override this.
    fn node_path(node: &Node<Self>) -> Result<Vec<String>, Error> {
        Ok(vec![node.id()?])
    }
}

/// Untyped node with an empty schema, for callers that only know field names at runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyNode;

impl NodeType for AnyNode {
    const FIELDS: &'static [&'static str] = &[];
    const ENDPOINT: &'static str = "";
}
