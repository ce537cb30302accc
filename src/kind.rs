//! Field Kind Detection
//!
//! Maps a materialized constraint map onto the closed set of field kinds the
//! model knows how to build. Pure detection: no instances are created here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::ConstraintMap;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::keywords;

/// JSON type named by the `type` keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl JsonType {
    pub fn from_json_type(type_str: &str) -> Option<Self> {
        match type_str {
            "array" => Some(Self::Array),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "null" => Some(Self::Null),
            "number" => Some(Self::Number),
            "object" => Some(Self::Object),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Null => "null",
            Self::Number => "number",
            Self::Object => "object",
            Self::String => "string",
        }
    }
}

/// What kind of field a materialized schema turns into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Container with positional and/or repeatable children
    Array,
    /// Container with declared and/or extra members
    Object,
    Boolean,
    Integer,
    Number,
    String,
    Null,
    /// Value fixed by `const`, or picked from `enum`
    Enumerated { values: Vec<Value> },
}

impl FieldKind {
    /// Detect the kind of a materialized schema.
    ///
    /// `const` and `enum` win over `type`. A missing or unusable `type` falls
    /// back to a string leaf and is reported.
    pub fn detect(constraints: &ConstraintMap, pointer: &str, diagnostics: &mut Diagnostics) -> Self {
        if let Some(value) = constraints.get(keywords::CONST) {
            return Self::Enumerated { values: vec![value.clone()] };
        }
        if let Some(values) = constraints.get(keywords::ENUM).and_then(Value::as_array) {
            return Self::Enumerated { values: values.clone() };
        }

        match constraints.get(keywords::TYPE) {
            Some(Value::String(name)) => match JsonType::from_json_type(name) {
                Some(json_type) => Self::from(json_type),
                None => {
                    diagnostics.warning(
                        pointer,
                        DiagnosticCode::UnsupportedType,
                        format!("Unsupported type \"{}\"; falling back to string", name),
                    );
                    Self::String
                }
            },
            // Union types: the first non-null member decides, `null` alone is null
            Some(Value::Array(names)) => {
                let types: Vec<JsonType> = names
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(JsonType::from_json_type)
                    .collect();
                match types.iter().find(|t| **t != JsonType::Null).or(types.first()) {
                    Some(json_type) => Self::from(*json_type),
                    None => {
                        diagnostics.warning(
                            pointer,
                            DiagnosticCode::UnsupportedType,
                            "Type list names no JSON type; falling back to string",
                        );
                        Self::String
                    }
                }
            }
            _ => {
                diagnostics.warning(
                    pointer,
                    DiagnosticCode::MissingType,
                    "No \"type\" keyword; falling back to string",
                );
                Self::String
            }
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Array | Self::Object)
    }
}

impl From<JsonType> for FieldKind {
    fn from(json_type: JsonType) -> Self {
        match json_type {
            JsonType::Array => Self::Array,
            JsonType::Boolean => Self::Boolean,
            JsonType::Integer => Self::Integer,
            JsonType::Null => Self::Null,
            JsonType::Number => Self::Number,
            JsonType::Object => Self::Object,
            JsonType::String => Self::String,
        }
    }
}
