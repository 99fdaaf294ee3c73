//! Purpose: Named-field storage for graph nodes.
//! Exports: `Attributes`.
//! Role: Leaf container under `Node`; knows nothing about identity or transports.
//! Invariants: Reading an unset field yields `None`, never an error.
//! Invariants: Unknown fields are registered on first write, never rejected.
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes {
    fields: Vec<String>,
    values: Map<String, Value>,
}

impl Attributes {
    /// Creates an empty store with the declared field names pre-registered.
    pub fn new(fields: &[&str]) -> Self {
        let mut attrs = Self::default();
        for field in fields {
            attrs.register(field);
        }
        attrs
    }

    pub fn with_data(fields: &[&str], data: &Map<String, Value>) -> Self {
        let mut attrs = Self::new(fields);
        attrs.set_data(data);
        attrs
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// True once `field` has been declared or written.
    pub fn is_registered(&self, field: &str) -> bool {
        self.fields.iter().any(|known| known == field)
    }

    /// Registered field names in registration order, set or not.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let field = field.into();
        self.register(&field);
        self.values.insert(field, value.into());
        self
    }

    /// Applies `set` for every key of `data` in the mapping's own order.
    pub fn set_data(&mut self, data: &Map<String, Value>) -> &mut Self {
        for (field, value) in data {
            self.set(field.clone(), value.clone());
        }
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn export_data(&self) -> Map<String, Value> {
        self.values.clone()
    }

    fn register(&mut self, field: &str) {
        if !self.is_registered(field) {
            self.fields.push(field.to_string());
        }
    }
}
