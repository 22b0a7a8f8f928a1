//! Span labels.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Label flag marking a node as a build step.
pub const BUILD_NODE_FLAG: &str = "broccoliNode";

/// Label flag marking a build step that was served from cache.
pub const CACHED_NODE_FLAG: &str = "broccoliCachedNode";

/// Label flag carried by the four phase root spans.
pub const PHASE_MARKER_FLAG: &str = "emberCLI";

/// A span label: a name plus an open set of scalar flags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpanLabel {
    name: String,
    flags: BTreeMap<String, Value>,
}

impl SpanLabel {
    /// Create a label with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: BTreeMap::new(),
        }
    }

    /// Label for a build step.
    pub fn build_node(name: impl Into<String>) -> Self {
        Self::new(name).with_flag(BUILD_NODE_FLAG, true)
    }

    /// Label for a build step served from cache.
    pub fn cached_build_node(name: impl Into<String>) -> Self {
        Self::build_node(name).with_flag(CACHED_NODE_FLAG, true)
    }

    /// Set a boolean flag.
    pub fn with_flag(mut self, key: impl Into<String>, value: bool) -> Self {
        self.flags.insert(key.into(), Value::Bool(value));
        self
    }

    /// Set a scalar attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    /// The label name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw flag value, if set.
    pub fn flag(&self, key: &str) -> Option<&Value> {
        self.flags.get(key)
    }

    /// Whether a flag is set to a truthy value.
    pub fn is_set(&self, key: &str) -> bool {
        self.flags.get(key).is_some_and(is_truthy)
    }

    /// Whether this node counts as a build step: flagged as a build node and
    /// not flagged as cached.
    pub fn is_build_step(&self) -> bool {
        self.is_set(BUILD_NODE_FLAG) && !self.is_set(CACHED_NODE_FLAG)
    }

    /// JSON form with falsy flags omitted.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        for (key, value) in &self.flags {
            if is_truthy(value) {
                map.insert(key.clone(), value.clone());
            }
        }
        map
    }
}

impl From<&str> for SpanLabel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SpanLabel {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Truthiness as understood by the visualization consumer: `false`, `null`,
/// `0` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
