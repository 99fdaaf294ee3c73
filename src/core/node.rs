//! Purpose: Change-tracked graph nodes with remote read/write verbs.
//! Exports: `Node`.
//! Role: Owns an attribute store plus a separate change set; talks to a `Transport`.
//! Invariants: Every change-set key exists in the store with the same value.
//! Invariants: Authoritative loads clean the fields they supply; `set` dirties them again.
//! Invariants: `export_data` reflects caller intent only, never server-echoed values.
use crate::core::attrs::Attributes;
use crate::core::cursor::Cursor;
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::{ID_FIELD, NodeType};
use crate::core::transport::{Method, Params, RequestPath, SharedTransport, default_transport};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

type ApiResult<T> = Result<T, Error>;

pub struct Node<T: NodeType> {
    attrs: Attributes,
    changes: Attributes,
    parent_id: Option<String>,
    transport: Option<SharedTransport>,
    _type: PhantomData<fn() -> T>,
}

impl<T: NodeType> Node<T> {
    /// Creates an empty node bound to the process-wide default transport, if any.
    pub fn new() -> Self {
        Self::from_parts(None, None, default_transport())
    }

    /// Creates a node seeded with `data`. The seed counts as an authoritative load.
    pub fn from_data(data: Map<String, Value>) -> Self {
        Self::from_parts(Some(data), None, default_transport())
    }

    pub(crate) fn from_parts(
        data: Option<Map<String, Value>>,
        parent_id: Option<String>,
        transport: Option<SharedTransport>,
    ) -> Self {
        let mut node = Self {
            attrs: Attributes::new(T::FIELDS),
            changes: Attributes::default(),
            parent_id,
            transport,
            _type: PhantomData,
        };
        if let Some(data) = data {
            node.set_data(&data);
        }
        node
    }

    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attrs.get(field)
    }

    /// Reads one field through serde. Unset fields and explicit nulls yield `None`.
    pub fn get_as<V: DeserializeOwned>(&self, field: &str) -> ApiResult<Option<V>> {
        match self.attrs.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|err| {
                Error::new(ErrorKind::Decode)
                    .with_message(format!("field `{field}` has an unexpected shape"))
                    .with_source(err)
            }),
        }
    }

    /// Deserializes the full attribute store into a caller-defined view.
    pub fn to_typed<S: DeserializeOwned>(&self) -> ApiResult<S> {
        serde_json::from_value(Value::Object(self.attrs.export_data())).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("node data does not match the requested type")
                .with_source(err)
        })
    }

    /// Writes a field and records it as a pending change.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let field = field.into();
        let value = value.into();
        self.attrs.set(field.clone(), value.clone());
        self.changes.set(field, value);
        self
    }

    /// Authoritative load: applies `data` and marks its fields clean.
    pub fn set_data(&mut self, data: &Map<String, Value>) -> &mut Self {
        self.attrs.set_data(data);
        for field in data.keys() {
            self.changes.remove(field);
        }
        self
    }

    /// Pending changes since the last authoritative load; the body of a write.
    pub fn export_data(&self) -> Map<String, Value> {
        self.changes.export_data()
    }

    /// Full attribute store, loaded and modified fields alike.
    pub fn data(&self) -> &Map<String, Value> {
        self.attrs.as_map()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// Drops pending changes without touching stored values.
    pub fn clear_history(&mut self) -> &mut Self {
        self.changes.clear();
        self
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn id(&self) -> ApiResult<String> {
        match self.attrs.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(Error::new(ErrorKind::IdentityMissing)
                .with_message("node has no id")
                .with_hint("Set or load an `id` before addressing the node remotely.")),
        }
    }

    pub fn node_path(&self) -> ApiResult<RequestPath> {
        T::node_path(self).map(RequestPath::Segments)
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn transport(&self) -> ApiResult<&SharedTransport> {
        self.transport.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::Config)
                .with_message("no transport is configured")
                .with_hint("Establish a session first, e.g. `HttpTransport::install_default`.")
        })
    }

    /// Fetches `fields` (plus `params`) and applies the response as an authoritative load.
    pub async fn read(&mut self, fields: &[&str], params: Params) -> ApiResult<&mut Self> {
        let path = self.node_path()?;
        let transport = self.transport()?.clone();
        let params = with_fields(params, fields);
        debug!(path = %path, fields = fields.len(), "reading node");
        let response = transport.call(Method::Get, &path, &params).await?;
        let data = expect_object(response, &path)?;
        self.set_data(&data);
        Ok(self)
    }

    /// Builds an unloaded cursor over the edge whose targets are `U` nodes.
    pub fn edge<U: NodeType>(&self, fields: &[&str], params: Params) -> ApiResult<Cursor<U>> {
        Cursor::new(self, with_fields(params, fields))
    }

    /// Builds a cursor over the edge and loads its first page.
    pub async fn fetch_edge<U: NodeType>(
        &self,
        fields: &[&str],
        params: Params,
    ) -> ApiResult<Cursor<U>> {
        let mut cursor = self.edge::<U>(fields, params)?;
        cursor.next().await?;
        Ok(cursor)
    }

    /// Fetches several nodes in one request. Results follow the response's key
    /// order, which need not match `ids`.
    pub async fn get_by_ids<I, S>(
        ids: I,
        params: Params,
        fields: &[&str],
        transport: Option<SharedTransport>,
    ) -> ApiResult<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let transport = transport.or_else(default_transport).ok_or_else(|| {
            Error::new(ErrorKind::Config)
                .with_message("no transport is configured")
                .with_hint("Pass a transport or establish a session first.")
        })?;
        let ids: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = with_fields(params, fields);
        params.insert("ids".to_string(), Value::String(ids.join(",")));
        let path = RequestPath::root();
        debug!(ids = ids.len(), "fetching nodes by id");
        let response = transport.call(Method::Get, &path, &params).await?;
        let entries = expect_object(response, &path)?;
        entries
            .into_iter()
            .map(|(id, raw)| {
                let data = expect_object(raw, &path)
                    .map_err(|err| err.with_message(format!("entry `{id}` is not an object")))?;
                Ok(Self::from_parts(Some(data), None, Some(transport.clone())))
            })
            .collect()
    }

    /// Creates the node under `parent_id` from its pending changes.
    pub async fn create(&mut self, parent_id: &str) -> ApiResult<&mut Self> {
        if T::ENDPOINT.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("node type has no edge endpoint to create under"));
        }
        if self.id().is_ok() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("node already has an id")
                .with_hint("Use `update` to modify an existing node."));
        }
        let transport = self.transport()?.clone();
        let path = RequestPath::segments([parent_id, T::ENDPOINT]);
        let params = self.export_data();
        debug!(path = %path, fields = params.len(), "creating node");
        let response = transport.call(Method::Post, &path, &params).await?;
        let response = expect_object(response, &path)?;
        let id = match response.get(ID_FIELD) {
            Some(id @ (Value::String(_) | Value::Number(_))) => id.clone(),
            _ => {
                return Err(Error::new(ErrorKind::Decode)
                    .with_message("create response has no id")
                    .with_path(path.to_string()));
            }
        };
        let mut loaded = Map::new();
        loaded.insert(ID_FIELD.to_string(), id);
        self.set_data(&loaded);
        self.clear_history();
        self.parent_id = Some(parent_id.to_string());
        Ok(self)
    }

    /// Sends pending changes. Nothing is sent when the node is clean; on
    /// failure the changes are kept.
    pub async fn update(&mut self) -> ApiResult<&mut Self> {
        let path = self.node_path()?;
        let transport = self.transport()?.clone();
        if !self.is_dirty() {
            debug!(path = %path, "update skipped: no pending changes");
            return Ok(self);
        }
        let params = self.export_data();
        debug!(path = %path, fields = params.len(), "updating node");
        transport.call(Method::Post, &path, &params).await?;
        self.clear_history();
        Ok(self)
    }

    pub async fn delete(&self) -> ApiResult<()> {
        let path = self.node_path()?;
        let transport = self.transport()?.clone();
        debug!(path = %path, "deleting node");
        transport.call(Method::Delete, &path, &Params::new()).await?;
        Ok(())
    }
}

impl<T: NodeType> Default for Node<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NodeType> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            attrs: self.attrs.clone(),
            changes: self.changes.clone(),
            parent_id: self.parent_id.clone(),
            transport: self.transport.clone(),
            _type: PhantomData,
        }
    }
}

impl<T: NodeType> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("type", &std::any::type_name::<T>())
            .field("data", self.attrs.as_map())
            .field("changes", self.changes.as_map())
            .field("parent_id", &self.parent_id)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

pub(crate) fn with_fields(mut params: Params, fields: &[&str]) -> Params {
    if !fields.is_empty() {
        params.insert("fields".to_string(), Value::String(fields.join(",")));
    }
    params
}

fn expect_object(value: Value, path: &RequestPath) -> ApiResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::new(ErrorKind::Decode)
            .with_message(format!("expected a json object, got {}", json_type(&other)))
            .with_path(path.to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::{Node, with_fields};
    use crate::core::error::ErrorKind;
    use crate::core::schema::NodeType;
    use crate::core::transport::{Params, RequestPath};
    use serde::Deserialize;
    use serde_json::{Map, Value, json};

    struct User;

    impl NodeType for User {
        const FIELDS: &'static [&'static str] = &["id", "name", "email"];
        const ENDPOINT: &'static str = "users";
    }

    struct Membership;

    impl NodeType for Membership {
        const FIELDS: &'static [&'static str] = &["group_id", "user_id"];
        const ENDPOINT: &'static str = "members";

        fn node_path(node: &Node<Self>) -> Result<Vec<String>, crate::core::error::Error> {
            let group = node.get_as::<String>("group_id")?.unwrap_or_default();
            let user = node.get_as::<String>("user_id")?.unwrap_or_default();
            Ok(vec![group, "members".to_string(), user])
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn detached(data: Value) -> Node<User> {
        Node::from_parts(Some(object(data)), None, None)
    }

    #[test]
    fn seeded_node_exports_nothing() {
        let data = object(json!({"id": "7", "name": "Alice"}));
        let node: Node<User> = Node::from_parts(Some(data.clone()), None, None);
        assert!(node.export_data().is_empty());
        assert_eq!(node.data(), &data);
        assert!(!node.is_dirty());
    }

    #[test]
    fn export_holds_latest_value_per_touched_field() {
        let mut node = detached(json!({"id": "7", "name": "Alice", "email": "a@x"}));
        node.set("name", "Bob").set("name", "Carol").set("bio", "hi");
        let exported = node.export_data();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported.get("name"), Some(&json!("Carol")));
        assert_eq!(exported.get("bio"), Some(&json!("hi")));
        assert_eq!(node.get("email"), Some(&json!("a@x")));
    }

    #[test]
    fn authoritative_load_cleans_supplied_fields_only() {
        let mut node = detached(json!({"id": "7"}));
        node.set("name", "Bob").set("email", "b@x");
        node.set_data(&object(json!({"name": "Server Bob"})));
        let exported = node.export_data();
        assert_eq!(exported.keys().collect::<Vec<_>>(), vec!["email"]);
        assert_eq!(node.get("name"), Some(&json!("Server Bob")));

        node.set("name", "Bob again");
        assert_eq!(node.export_data().get("name"), Some(&json!("Bob again")));
    }

    #[test]
    fn clear_history_keeps_values() {
        let mut node = detached(json!({"id": "7"}));
        node.set("name", "Bob");
        node.clear_history();
        assert!(node.export_data().is_empty());
        assert_eq!(node.get("name"), Some(&json!("Bob")));
    }

    #[test]
    fn id_requires_identity() {
        let node = detached(json!({"name": "nobody"}));
        let err = node.id().expect_err("missing id");
        assert_eq!(err.kind(), ErrorKind::IdentityMissing);

        let node = detached(json!({"id": ""}));
        assert_eq!(node.id().expect_err("empty id").kind(), ErrorKind::IdentityMissing);

        let node = detached(json!({"id": 1234}));
        assert_eq!(node.id().expect("numeric id"), "1234");
    }

    #[test]
    fn node_path_defaults_to_id_and_can_be_overridden() {
        let node = detached(json!({"id": "7"}));
        assert_eq!(node.node_path().expect("path"), RequestPath::segments(["7"]));

        let membership: Node<Membership> = Node::from_parts(
            Some(object(json!({"group_id": "g1", "user_id": "u9"}))),
            None,
            None,
        );
        assert_eq!(
            membership.node_path().expect("path"),
            RequestPath::segments(["g1", "members", "u9"])
        );
    }

    #[test]
    fn missing_transport_is_config_error() {
        let node = detached(json!({"id": "7"}));
        let err = node.transport().err().expect("no transport");
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.hint().is_some());
    }

    #[test]
    fn typed_views_decode_fields() {
        #[derive(Deserialize)]
        struct UserView {
            id: String,
            name: Option<String>,
        }

        let node = detached(json!({"id": "7", "name": "Alice", "age": 30}));
        let view: UserView = node.to_typed().expect("typed");
        assert_eq!(view.id, "7");
        assert_eq!(view.name.as_deref(), Some("Alice"));
        assert_eq!(node.get_as::<u32>("age").expect("age"), Some(30));
        assert_eq!(node.get_as::<u32>("email").expect("unset"), None);
        let err = node.get_as::<u32>("name").expect_err("shape");
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn declared_fields_are_registered() {
        let node = detached(json!({}));
        assert!(node.attributes().is_registered("email"));
        assert_eq!(node.get("email"), None);
    }

    #[test]
    fn fields_fold_into_params() {
        let params = with_fields(Params::new(), &["name", "email"]);
        assert_eq!(params.get("fields"), Some(&json!("name,email")));
        assert!(with_fields(Params::new(), &[]).is_empty());
    }
}
