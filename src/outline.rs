//! Text outline of a form model
//!
//! One line per field, indented by depth:
//!
//! ```text
//! + Person: object (root) [oneOf: *Adult | Child]
//!   + name: string (required)
//!   - nickname: string (optional)
//!   + additionalProperties 1 of 0..2
//!     + Item: string (removable) as "extra"
//! ```
//!
//! `+` marks an enabled field, `-` one disabled by its own toggle and `.` an
//! inactive one. The selected alternative of a selector is starred. Collection
//! lines start with `+` while children can still be added, `=` once full.

use std::fmt::Write;

use crate::collection::{ChildCollection, CollectionEntry};
use crate::config::FormOptions;
use crate::controller::{ActionQueue, ModelChange, Renderer};
use crate::instance::{Content, FieldInstance};
use crate::kind::FieldKind;
use crate::state::ElementKind;

/// Render the instance tree below `root` as indented text
pub fn render_outline(root: &FieldInstance, options: &FormOptions) -> String {
    let mut out = String::new();
    write_instance(&mut out, root, options, 0, None);
    out
}

fn marker(instance: &FieldInstance) -> char {
    let state = instance.state();
    if state.is_enabled() {
        '+'
    } else if state.is_active() {
        '-'
    } else {
        '.'
    }
}

fn kind_label(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Array => "array".to_string(),
        FieldKind::Object => "object".to_string(),
        FieldKind::Boolean => "boolean".to_string(),
        FieldKind::Integer => "integer".to_string(),
        FieldKind::Number => "number".to_string(),
        FieldKind::String => "string".to_string(),
        FieldKind::Null => "null".to_string(),
        FieldKind::Enumerated { values } => format!(
            "enum({})",
            values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn element_label(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::Root => "root",
        ElementKind::Required => "required",
        ElementKind::Optional => "optional",
        ElementKind::Removable => "removable",
    }
}

fn write_instance(
    out: &mut String,
    instance: &FieldInstance,
    options: &FormOptions,
    depth: usize,
    entry: Option<&CollectionEntry>,
) {
    let indent = "  ".repeat(depth);
    let title = match instance.title(options) {
        title if title.is_empty() => "(untitled)".to_string(),
        title => title,
    };

    let _ = write!(
        out,
        "{}{} {}: {} ({})",
        indent,
        marker(instance),
        title,
        kind_label(instance.field_kind()),
        element_label(instance.kind())
    );

    for selector in instance.selectors(options) {
        let choices: Vec<String> = selector
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| {
                if i == selector.selected {
                    format!("*{}", option)
                } else {
                    option.clone()
                }
            })
            .collect();
        let _ = write!(out, " [{}: {}]", selector.combinator.keyword(), choices.join(" | "));
    }

    if let Some(name) = entry.and_then(|entry| entry.name.as_deref()) {
        let _ = write!(out, " as \"{}\"", name);
    }
    out.push('\n');

    match instance.content() {
        Content::Leaf => {}
        Content::Object { properties, additional } => {
            for child in properties.values() {
                write_instance(out, child, options, depth + 1, None);
            }
            if let Some(collection) = additional {
                write_collection(out, collection, options, depth + 1);
            }
        }
        Content::Array { prefix, additional } => {
            for child in prefix {
                write_instance(out, child, options, depth + 1, None);
            }
            if let Some(collection) = additional {
                write_collection(out, collection, options, depth + 1);
            }
        }
    }
}

fn write_collection(out: &mut String, collection: &ChildCollection, options: &FormOptions, depth: usize) {
    let bound = |b: Option<usize>| b.map(|n| n.to_string()).unwrap_or_default();
    let _ = writeln!(
        out,
        "{}{} {} {} of {}..{}",
        "  ".repeat(depth),
        if collection.can_add() { '+' } else { '=' },
        collection.slot().keyword(),
        collection.count(),
        bound(collection.min()),
        bound(collection.max()),
    );

    for entry in collection.entries() {
        write_instance(out, &entry.instance, options, depth + 1, Some(entry));
    }
}

/// Renderer keeping the latest outline of the model
#[derive(Debug, Clone, Default)]
pub struct OutlineRenderer {
    options: FormOptions,
    outline: String,
    renders: usize,
}

impl OutlineRenderer {
    pub fn new(options: FormOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Outline drawn on the latest notification
    pub fn outline(&self) -> &str {
        &self.outline
    }

    /// Number of notifications received
    pub fn renders(&self) -> usize {
        self.renders
    }
}

impl Renderer for OutlineRenderer {
    fn render(&mut self, change: &ModelChange, root: &FieldInstance, _queue: &mut ActionQueue) {
        self.renders += 1;
        if let Some(refusal) = &change.refusal {
            tracing::info!(instance = %change.affected, %refusal, "action refused");
        }
        self.outline = render_outline(root, &self.options);
    }
}
