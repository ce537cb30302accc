//! Leaf values
//!
//! The model never stores what the user typed. A [`ValueCollector`] supplies
//! leaf values on demand and checks them against the leaf's materialized
//! constraints.

use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;

use crate::instance::{FieldInstance, InstanceId};
use crate::keywords;
use crate::kind::FieldKind;

/// Source of leaf values
pub trait ValueCollector {
    /// Current value of a leaf, `None` when nothing was entered
    fn get_value(&self, instance: &FieldInstance) -> Option<Value>;

    /// Whether `value` satisfies the leaf's own constraints
    fn check_leaf_constraints(&self, instance: &FieldInstance, value: &Value) -> bool;

    /// Instances were torn down; values kept for them can go
    fn forget(&mut self, _ids: &[InstanceId]) {}
}

/// In-memory collector keyed by instance id.
///
/// Leaves without a stored value fall back to what the schema implies:
/// `const`, a single-valued `enum`, `default`, then `null` for null fields.
#[derive(Debug, Clone, Default)]
pub struct DefaultValueCollector {
    values: HashMap<InstanceId, Value>,
}

impl DefaultValueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning the previous one
    pub fn set_value(&mut self, id: InstanceId, value: Value) -> Option<Value> {
        self.values.insert(id, value)
    }

    pub fn clear_value(&mut self, id: InstanceId) -> Option<Value> {
        self.values.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Value a schema implies for a leaf nobody filled in
fn implied_value(instance: &FieldInstance) -> Option<Value> {
    let constraints = instance.constraints();

    if let FieldKind::Enumerated { values } = instance.field_kind() {
        if values.len() == 1 {
            return values.first().cloned();
        }
    }
    if let Some(default) = constraints.get(keywords::DEFAULT) {
        return Some(default.clone());
    }
    match instance.field_kind() {
        FieldKind::Null => Some(Value::Null),
        _ => None,
    }
}

impl ValueCollector for DefaultValueCollector {
    fn get_value(&self, instance: &FieldInstance) -> Option<Value> {
        self.values
            .get(&instance.id())
            .cloned()
            .or_else(|| implied_value(instance))
    }

    fn check_leaf_constraints(&self, instance: &FieldInstance, value: &Value) -> bool {
        let schema = Value::Object(instance.constraints().clone());
        match JSONSchema::compile(&schema) {
            Ok(compiled) => compiled.is_valid(value),
            Err(error) => {
                tracing::warn!(pointer = %instance.pointer(), %error, "leaf constraints do not compile; value accepted");
                true
            }
        }
    }

    fn forget(&mut self, ids: &[InstanceId]) {
        for id in ids {
            self.values.remove(id);
        }
    }
}
