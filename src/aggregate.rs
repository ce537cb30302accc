//! Keyword Aggregation
//!
//! Merges flattened constraint maps into one. Used both when an `allOf` is
//! resolved and when the selected alternatives of a tree are materialized.
//!
//! Collision rules:
//! - member-schema maps (`properties` & co.): union by name, colliding
//!   sub-schemas are aggregated recursively
//! - `required`: set union, first-occurrence order
//! - anything else: the later map wins and a diagnostic is raised
//!
//! Annotations (`title`, `description`, ...) come from the first map only.

use serde_json::{json, Map, Value};

use crate::diagnostics::Diagnostics;
use crate::keywords;

/// A flattened set of schema keywords
pub type ConstraintMap = Map<String, Value>;

/// Aggregate constraint maps left to right.
///
/// The first map is the outermost schema: its annotations are kept and its
/// keywords lose every last-write-wins collision.
pub fn aggregate(maps: &[ConstraintMap], diagnostics: &mut Diagnostics) -> ConstraintMap {
    let mut iter = maps.iter();
    let mut acc = match iter.next() {
        Some(first) => first.clone(),
        None => return ConstraintMap::new(),
    };

    for map in iter {
        merge_into(&mut acc, map, diagnostics);
    }

    acc
}

fn merge_into(acc: &mut ConstraintMap, incoming: &ConstraintMap, diagnostics: &mut Diagnostics) {
    for (keyword, value) in incoming {
        if keywords::is_annotation(keyword) {
            continue;
        }

        let Some(existing) = acc.get_mut(keyword) else {
            acc.insert(keyword.clone(), value.clone());
            continue;
        };

        if keywords::is_member_schemas(keyword) {
            merge_members(keyword, existing, value, diagnostics);
        } else if keyword == keywords::REQUIRED {
            merge_required(existing, value, diagnostics);
        } else if existing != value {
            diagnostics.unspecified_aggregation(keyword, existing, value);
            *existing = value.clone();
        }
    }
}

fn merge_members(keyword: &str, existing: &mut Value, incoming: &Value, diagnostics: &mut Diagnostics) {
    match (existing, incoming) {
        (Value::Object(members), Value::Object(new_members)) => {
            for (name, schema) in new_members {
                match members.get_mut(name) {
                    Some(current) => {
                        let combined = combine_member_schemas(current, schema, diagnostics);
                        *current = combined;
                    }
                    None => {
                        members.insert(name.clone(), schema.clone());
                    }
                }
            }
        }
        (existing, incoming) => {
            diagnostics.unspecified_aggregation(keyword, existing, incoming);
            *existing = incoming.clone();
        }
    }
}

/// Combine two sub-schemas declared under the same member name.
///
/// Sub-schemas that still carry combinators are not flattened here: they are
/// wrapped in an `allOf` so the child's own resolve pass keeps their branches.
fn combine_member_schemas(left: &Value, right: &Value, diagnostics: &mut Diagnostics) -> Value {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) if !has_combinator(l) && !has_combinator(r) => {
            Value::Object(aggregate(&[l.clone(), r.clone()], diagnostics))
        }
        _ if left == right => left.clone(),
        _ => json!({ keywords::ALL_OF: [left, right] }),
    }
}

fn has_combinator(schema: &ConstraintMap) -> bool {
    schema.keys().any(|k| keywords::is_combinator(k))
}

fn merge_required(existing: &mut Value, incoming: &Value, diagnostics: &mut Diagnostics) {
    match (existing, incoming) {
        (Value::Array(names), Value::Array(new_names)) => {
            for name in new_names {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        (existing, incoming) => {
            diagnostics.unspecified_aggregation(keywords::REQUIRED, existing, incoming);
            *existing = incoming.clone();
        }
    }
}
