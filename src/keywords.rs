//! JSON Schema keywords the form model cares about
//!
//! Grouped by the role they play in materialization.

/// Keywords that only describe a schema and never constrain it.
/// Aggregation takes these from the outermost schema only.
pub const ANNOTATIONS: &[&str] = &[
    "default",
    "deprecated",
    "description",
    "examples",
    "readOnly",
    "title",
    "writeOnly",
];

/// Keywords holding instance data rather than sub-schemas
pub const LITERALS: &[&str] = &["const", "default", "enum", "examples"];

pub const ALL_OF: &str = "allOf";
pub const ANY_OF: &str = "anyOf";
pub const ONE_OF: &str = "oneOf";

/// In-place combinators consumed by `resolve`
pub const COMBINATORS: &[&str] = &[ALL_OF, ANY_OF, ONE_OF];

/// Keywords whose value maps names to sub-schemas
pub const MEMBER_SCHEMAS: &[&str] = &[
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

pub const REQUIRED: &str = "required";
pub const TYPE: &str = "type";
pub const TITLE: &str = "title";
pub const DEFAULT: &str = "default";
pub const CONST: &str = "const";
pub const ENUM: &str = "enum";
pub const REF: &str = "$ref";

pub const PROPERTIES: &str = "properties";
pub const ADDITIONAL_PROPERTIES: &str = "additionalProperties";
pub const MIN_PROPERTIES: &str = "minProperties";
pub const MAX_PROPERTIES: &str = "maxProperties";

pub const ITEMS: &str = "items";
pub const ADDITIONAL_ITEMS: &str = "additionalItems";
pub const MIN_ITEMS: &str = "minItems";
pub const MAX_ITEMS: &str = "maxItems";

pub fn is_annotation(keyword: &str) -> bool {
    ANNOTATIONS.contains(&keyword)
}

pub fn is_literal(keyword: &str) -> bool {
    LITERALS.contains(&keyword)
}

pub fn is_combinator(keyword: &str) -> bool {
    COMBINATORS.contains(&keyword)
}

pub fn is_member_schemas(keyword: &str) -> bool {
    MEMBER_SCHEMAS.contains(&keyword)
}

/// Escape a property name for use inside a pointer segment
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Reverse of [`escape_segment`]
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
