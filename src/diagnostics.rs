//! Diagnostics
//!
//! Collects non-fatal findings while resolving, materializing and building
//! the form model. Nothing in here stops a model from being built: every
//! diagnostic has a documented fallback applied at the point it is raised.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Aggregation ===
    /// Keyword collided during aggregation and has no merge rule (last write wins)
    UnspecifiedAggregation,

    // === Schema shape ===
    /// No usable `type` keyword; the field falls back to a string leaf
    MissingType,
    /// `type` names something outside the JSON type set
    UnsupportedType,
    /// Combinator alternative has no `title` to display
    UntitledAlternative,
    /// Combinator with no alternatives
    EmptyCombinator,
    /// Keyword value has the wrong JSON shape and was ignored
    MalformedKeyword,

    // === Collections ===
    /// Minimum bound exceeds the maximum bound or the pre-population limit
    ConflictingBounds,
    /// Object member without a name was left out of the assembled value
    UnnamedMember,

    // === Model ===
    /// A user action was refused (cardinality, state)
    RefusedAction,
    /// A renderer kept queueing follow-ups; the rest of the queue was dropped
    FollowUpLimit,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnspecifiedAggregation => "W001",
            Self::MissingType => "W002",
            Self::UnsupportedType => "W003",
            Self::UntitledAlternative => "W004",
            Self::EmptyCombinator => "W005",
            Self::ConflictingBounds => "W006",
            Self::UnnamedMember => "W007",
            Self::MalformedKeyword => "W008",
            Self::FollowUpLimit => "W009",
            Self::RefusedAction => "I001",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::RefusedAction => Severity::Info,

            Self::UnspecifiedAggregation
            | Self::MissingType
            | Self::UnsupportedType
            | Self::UntitledAlternative
            | Self::EmptyCombinator
            | Self::MalformedKeyword
            | Self::ConflictingBounds
            | Self::UnnamedMember
            | Self::FollowUpLimit => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Schema path or instance pointer the diagnostic refers to
    pub pointer: String,
    /// Diagnostic code
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Additional context (e.g. the colliding values)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(pointer: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pointer = if self.pointer.is_empty() { "#" } else { &self.pointer };
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            pointer
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics gathered while the model is built and used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item, mirroring it to the log
    pub fn push(&mut self, item: DiagnosticItem) {
        match item.severity() {
            Severity::Warning => tracing::warn!(code = %item.code, pointer = %item.pointer, "{}", item.message),
            Severity::Info => tracing::debug!(code = %item.code, pointer = %item.pointer, "{}", item.message),
        }
        self.items.push(item);
    }

    /// Add a warning
    pub fn warning(&mut self, pointer: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(pointer, code, message));
    }

    /// Add diagnostic for a keyword collision without a merge rule
    pub fn unspecified_aggregation(&mut self, keyword: &str, previous: &serde_json::Value, winner: &serde_json::Value) {
        self.push(
            DiagnosticItem::new(
                keyword,
                DiagnosticCode::UnspecifiedAggregation,
                format!("Keyword aggregation not defined for \"{}\"; last value wins", keyword),
            )
            .with_context(format!("Discarded: {}", previous))
            .with_context(format!("Kept: {}", winner)),
        );
    }

    /// Add diagnostic for a refused user action
    pub fn refused(&mut self, pointer: impl Into<String>, reason: impl fmt::Display) {
        self.push(DiagnosticItem::new(
            pointer,
            DiagnosticCode::RefusedAction,
            format!("Action refused: {}", reason),
        ));
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Warning)
    }

    /// Get all warnings
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// Get all items with the given code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    /// Get all items
    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another Diagnostics into this one, skipping items already present
    pub fn merge(&mut self, other: Diagnostics) {
        for item in other.items {
            if !self.items.contains(&item) {
                self.items.push(item);
            }
        }
    }

    /// Drop everything collected so far
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
