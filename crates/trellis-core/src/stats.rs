//! Per-node statistics and the monitor registry.
//!
//! A monitor is a named counter shape. The registry only knows how to build
//! the default record for a name; the records themselves live on the span
//! nodes and are created the first time a monitor is touched while that node
//! is open.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{SpanError, SpanResult};

/// A monitor's counter record for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatRecord {
    fields: BTreeMap<String, i64>,
}

impl StatRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field initialisation, used by shape factories.
    pub fn with_field(mut self, field: impl Into<String>, value: i64) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    /// Overwrite a field.
    pub fn set(&mut self, field: impl Into<String>, value: i64) {
        self.fields.insert(field.into(), value);
    }

    /// Add `delta` to a field, treating a missing field as zero.
    pub fn increment(&mut self, field: impl Into<String>, delta: i64) {
        *self.fields.entry(field.into()).or_insert(0) += delta;
    }

    /// Read a field.
    pub fn get(&self, field: &str) -> Option<i64> {
        self.fields.get(field).copied()
    }

    /// Iterate over `(field, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON object form.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        Value::Object(map)
    }
}

/// Statistics owned by a single span node.
#[derive(Debug, Clone, Default)]
pub struct NodeStats {
    /// Time this node spent as the innermost open node.
    pub time_self: Duration,
    /// Monitor records touched while this node was open, by monitor name.
    pub monitors: BTreeMap<String, StatRecord>,
}

impl NodeStats {
    /// Self time in nanoseconds, as reported in summaries and exports.
    pub fn self_time_nanos(&self) -> u64 {
        u64::try_from(self.time_self.as_nanos()).unwrap_or(u64::MAX)
    }

    /// The record for `monitor`, if it was touched on this node.
    pub fn monitor(&self, monitor: &str) -> Option<&StatRecord> {
        self.monitors.get(monitor)
    }

    /// Iterate over `(stat name, value)` pairs, starting with `time.self`.
    pub fn iter(&self) -> impl Iterator<Item = (String, i64)> + '_ {
        let time = std::iter::once((
            "time.self".to_string(),
            i64::try_from(self.self_time_nanos()).unwrap_or(i64::MAX),
        ));
        let monitors = self.monitors.iter().flat_map(|(monitor, record)| {
            record
                .iter()
                .map(move |(field, value)| (format!("{}.{}", monitor, field), value))
        });
        time.chain(monitors)
    }

    /// JSON form: `time: {self}` plus one entry per touched monitor.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("time".to_string(), json!({ "self": self.self_time_nanos() }));
        for (name, record) in &self.monitors {
            map.insert(name.clone(), record.to_json());
        }
        map
    }
}

/// Factory producing the default record for a monitor.
pub type ShapeFactory = Box<dyn Fn() -> StatRecord + Send>;

/// Registry of monitor shapes.
#[derive(Default)]
pub struct MonitorRegistry {
    shapes: HashMap<String, ShapeFactory>,
}

impl MonitorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor shape.
    ///
    /// # Errors
    ///
    /// Returns an error if a monitor with the same name already exists.
    /// Re-registration is rejected even when the shape is identical.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> SpanResult<()>
    where
        F: Fn() -> StatRecord + Send + 'static,
    {
        let name = name.into();
        if self.shapes.contains_key(&name) {
            return Err(SpanError::MonitorAlreadyRegistered(name));
        }
        debug!(monitor = %name, "Monitor registered");
        self.shapes.insert(name, Box::new(factory));
        Ok(())
    }

    /// Whether a monitor is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.shapes.contains_key(name)
    }

    /// Build a fresh default record for `name`.
    pub fn instantiate(&self, name: &str) -> SpanResult<StatRecord> {
        self.shapes
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| SpanError::UnknownMonitor(name.to_string()))
    }

    /// Registered monitor names.
    pub fn names(&self) -> Vec<String> {
        self.shapes.keys().cloned().collect()
    }

    /// Number of registered monitors.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether no monitors are registered.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl std::fmt::Debug for MonitorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorRegistry")
            .field("monitors", &self.shapes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_record_increment_and_set() {
        let mut record = StatRecord::new().with_field("x", 1);
        record.increment("x", 2);
        record.increment("y", 4);
        record.set("z", 9);

        assert_eq!(record.get("x"), Some(3));
        assert_eq!(record.get("y"), Some(4));
        assert_eq!(record.get("z"), Some(9));
        assert_eq!(record.to_json(), json!({ "x": 3, "y": 4, "z": 9 }));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = MonitorRegistry::new();
        registry.register("mystats", StatRecord::new).unwrap();

        let err = registry
            .register("mystats", || StatRecord::new().with_field("x", 0))
            .unwrap_err();
        assert!(matches!(err, SpanError::MonitorAlreadyRegistered(name) if name == "mystats"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_instantiates_default_shape() {
        let mut registry = MonitorRegistry::new();
        registry
            .register("fs", || StatRecord::new().with_field("count", 0))
            .unwrap();

        assert_eq!(registry.instantiate("fs").unwrap().get("count"), Some(0));
        assert!(matches!(
            registry.instantiate("nope"),
            Err(SpanError::UnknownMonitor(_))
        ));
    }

    #[test]
    fn test_node_stats_json() {
        let mut stats = NodeStats {
            time_self: Duration::from_nanos(1500),
            ..Default::default()
        };
        stats
            .monitors
            .insert("mystats".to_string(), StatRecord::new().with_field("x", 3));

        let json = Value::Object(stats.to_json());
        assert_eq!(json, json!({ "time": { "self": 1500 }, "mystats": { "x": 3 } }));

        let flat: Vec<_> = stats.iter().collect();
        assert_eq!(
            flat,
            vec![("time.self".to_string(), 1500), ("mystats.x".to_string(), 3)]
        );
    }
}
