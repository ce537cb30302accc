//! Error types for the form model

use thiserror::Error;

/// Result type for form model operations
pub type Result<T> = std::result::Result<T, FormError>;

/// Form model errors
///
/// Only construction-time and lookup failures live here. Refused collection
/// operations and aggregation conflicts are outcomes or diagnostics, not errors.
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Unresolved reference: {reference} (at {pointer})")]
    UnresolvedReference { reference: String, pointer: String },

    #[error("Recursive reference: {reference} (at {pointer})")]
    RecursiveReference { reference: String, pointer: String },

    #[error("External reference not allowed: {0}")]
    ExternalReference(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown branch set: {path}")]
    UnknownBranchSet { path: String },

    #[error("Alternative {index} out of range for {path} ({count} alternatives)")]
    AlternativeOutOfRange { path: String, index: usize, count: usize },

    #[error("Unknown field instance: {0}")]
    UnknownInstance(u64),

    #[error("Field instance {0} at \"{1}\" has no child collection")]
    NoCollection(u64, String),

    #[error("Invalid leaf values at: {}", .0.join(", "))]
    InvalidLeaves(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
