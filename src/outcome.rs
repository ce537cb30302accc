//! Outcomes of user actions
//!
//! A refused action is a normal result, not an error: state is left untouched
//! and the caller decides how to surface it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an action was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Refusal {
    /// Collection already holds its maximum number of children
    MaximumReached { max: usize },
    /// Collection already holds its minimum number of children
    MinimumReached { min: usize },
    /// No entry with this key in the collection
    UnknownKey { key: u64 },
    /// Field kind has no enable toggle
    NotToggleable,
    /// Field is inactive because an ancestor is
    Inactive,
    /// Member name already used in the same object
    DuplicateName { name: String },
    /// Member names only exist in object-like collections
    NotNamed,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaximumReached { max } => write!(f, "maximum of {} children reached", max),
            Self::MinimumReached { min } => write!(f, "minimum of {} children reached", min),
            Self::UnknownKey { key } => write!(f, "no child with key {}", key),
            Self::NotToggleable => write!(f, "field has no enable toggle"),
            Self::Inactive => write!(f, "field is inactive"),
            Self::DuplicateName { name } => write!(f, "member name \"{}\" already in use", name),
            Self::NotNamed => write!(f, "field is not a named member"),
        }
    }
}

/// Result of an action that may be refused
pub type Outcome<T> = std::result::Result<T, Refusal>;
