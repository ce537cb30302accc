//! Reference resolution
//!
//! The form model only works on reference-free schemas. A [`Dereferencer`]
//! inlines every `$ref` before the model is built; any failure aborts the
//! build, so a model never sees a partially resolved schema.

use serde_json::{Map, Value};
use std::path::Path;

use crate::config::ReferenceConfig;
use crate::error::{FormError, Result};
use crate::keywords;

/// Read a JSON schema document from disk
pub fn load_schema(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Turns a schema with references into an equivalent reference-free one
pub trait Dereferencer {
    fn resolve_references(&self, schema: &Value) -> Result<Value>;
}

/// Inlines `#`-rooted JSON pointer references within a single document.
///
/// A `$ref` with sibling keywords becomes `{...siblings, "allOf": [target]}`,
/// with the target's annotations lifted next to the siblings unless a sibling
/// overrides them. Definition sections (`$defs`, `definitions`) and literal
/// values (`const`, `enum`, `default`, `examples`) are copied as they are.
#[derive(Debug, Clone, Default)]
pub struct LocalDereferencer {
    allow_external: bool,
}

impl LocalDereferencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave references outside the document in place instead of failing
    pub fn allow_external(mut self, allow: bool) -> Self {
        self.allow_external = allow;
        self
    }

    pub fn from_config(config: &ReferenceConfig) -> Self {
        Self::new().allow_external(config.allow_external)
    }

    fn expand(&self, value: &Value, root: &Value, pointer: &str, chain: &mut Vec<String>) -> Result<Value> {
        match value {
            Value::Object(map) => match map.get(keywords::REF) {
                Some(Value::String(reference)) => self.expand_reference(reference, map, root, pointer, chain),
                _ => self.expand_members(map, root, pointer, chain).map(Value::Object),
            },
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.expand(item, root, &format!("{}/{}", pointer, i), chain))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    /// Expand the keywords of one schema object
    fn expand_members(
        &self,
        map: &Map<String, Value>,
        root: &Value,
        pointer: &str,
        chain: &mut Vec<String>,
    ) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for (keyword, value) in map {
            let child_pointer = format!("{}/{}", pointer, keywords::escape_segment(keyword));
            let expanded = match value {
                _ if is_definitions(keyword) || keywords::is_literal(keyword) => value.clone(),
                Value::Object(members) if keywords::is_member_schemas(keyword) => {
                    Value::Object(self.expand_named(members, root, &child_pointer, chain)?)
                }
                _ => self.expand(value, root, &child_pointer, chain)?,
            };
            out.insert(keyword.clone(), expanded);
        }
        Ok(out)
    }

    /// Expand a name-to-schema map such as `properties`
    fn expand_named(
        &self,
        members: &Map<String, Value>,
        root: &Value,
        pointer: &str,
        chain: &mut Vec<String>,
    ) -> Result<Map<String, Value>> {
        members
            .iter()
            .map(|(name, schema)| {
                let member_pointer = format!("{}/{}", pointer, keywords::escape_segment(name));
                Ok((name.clone(), self.expand(schema, root, &member_pointer, chain)?))
            })
            .collect()
    }

    fn expand_reference(
        &self,
        reference: &str,
        map: &Map<String, Value>,
        root: &Value,
        pointer: &str,
        chain: &mut Vec<String>,
    ) -> Result<Value> {
        let Some(fragment) = reference.strip_prefix('#') else {
            if self.allow_external {
                tracing::warn!(reference, pointer, "external reference left unresolved");
                return Ok(Value::Object(map.clone()));
            }
            return Err(FormError::ExternalReference(reference.to_string()));
        };

        if chain.iter().any(|seen| seen == reference) {
            return Err(FormError::RecursiveReference {
                reference: reference.to_string(),
                pointer: pointer.to_string(),
            });
        }

        let target = lookup(root, fragment).ok_or_else(|| FormError::UnresolvedReference {
            reference: reference.to_string(),
            pointer: pointer.to_string(),
        })?;

        chain.push(reference.to_string());
        let resolved = self.expand(target, root, pointer, chain);
        chain.pop();
        let resolved = resolved?;

        let siblings: Map<String, Value> = map
            .iter()
            .filter(|(keyword, _)| keyword.as_str() != keywords::REF)
            .map(|(keyword, value)| (keyword.clone(), value.clone()))
            .collect();
        if siblings.is_empty() {
            return Ok(resolved);
        }

        let mut combined = self.expand_members(&siblings, root, pointer, chain)?;
        if let Value::Object(target) = &resolved {
            for (keyword, value) in target {
                if keywords::is_annotation(keyword) && !combined.contains_key(keyword) {
                    combined.insert(keyword.clone(), value.clone());
                }
            }
        }

        match combined.get_mut(keywords::ALL_OF) {
            Some(Value::Array(members)) => members.insert(0, resolved),
            _ => {
                combined.insert(keywords::ALL_OF.to_string(), Value::Array(vec![resolved]));
            }
        }
        Ok(Value::Object(combined))
    }
}

impl Dereferencer for LocalDereferencer {
    fn resolve_references(&self, schema: &Value) -> Result<Value> {
        if !matches!(schema, Value::Object(_) | Value::Bool(_)) {
            return Err(FormError::InvalidSchema(format!(
                "expected an object or a boolean at the root, got {}",
                schema
            )));
        }
        self.expand(schema, schema, "", &mut Vec::new())
    }
}

fn is_definitions(keyword: &str) -> bool {
    matches!(keyword, "$defs" | "definitions")
}

/// Follow a JSON pointer fragment (`""` or `/a/b`) from the document root
fn lookup<'a>(root: &'a Value, fragment: &str) -> Option<&'a Value> {
    if fragment.is_empty() {
        return Some(root);
    }
    let path = fragment.strip_prefix('/')?;

    path.split('/').try_fold(root, |current, segment| {
        let segment = keywords::unescape_segment(segment);
        match current {
            Value::Object(map) => map.get(segment.as_str()),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}
