//! Schema Forms
//!
//! A live form model for JSON Schemas with branching combinators and
//! open-ended collections.
//!
//! ## Features
//!
//! - **Materialization**: `allOf` / `anyOf` / `oneOf` resolved into a tree of
//!   alternatives, flattened on demand into one concrete constraint map
//! - **Field States**: required, optional and removable fields with cascading
//!   activation that preserves each field's own toggle
//! - **Collections**: array items and extra object members with count bounds
//!   and stable keys
//! - **Change Cycles**: one controller applies user actions and notifies a
//!   renderer, never re-entrantly
//!
//! ## Architecture
//!
//! ```text
//! schema ──deref──▶ MaterializationTree ──materialize──▶ constraints
//!                          ▲                                   │
//!                    select branch                       FieldInstance
//!                          │                          (state, content,
//!                   ModelController ◀── actions ──     collections)
//!                          │
//!                          └── ModelChange ──▶ Renderer
//! ```

pub mod aggregate;
pub mod checksum;
pub mod collection;
pub mod collector;
pub mod config;
pub mod controller;
pub mod deref;
pub mod diagnostics;
pub mod error;
pub mod instance;
pub mod keywords;
pub mod kind;
pub mod outcome;
pub mod outline;
pub mod state;
pub mod tree;

pub use aggregate::{aggregate, ConstraintMap};
pub use checksum::Checksum;
pub use collection::{AddOutcome, ChildCollection, CollectionBounds, CollectionEntry, CollectionSlot, RemoveOutcome};
pub use collector::{DefaultValueCollector, ValueCollector};
pub use config::{FormConfig, FormOptions};
pub use controller::{
    Action, ActionQueue, ChangeCause, ModelChange, ModelController, NullRenderer, Renderer, MAX_FOLLOW_UPS,
};
pub use deref::{load_schema, Dereferencer, LocalDereferencer};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use error::{FormError, Result};
pub use instance::{get_instance_value, Content, FieldInstance, InstanceFactory, InstanceId, RenderHandle};
pub use kind::{FieldKind, JsonType};
pub use outcome::{Outcome, Refusal};
pub use outline::{render_outline, OutlineRenderer};
pub use state::{ElementKind, FieldState};
pub use tree::{resolve, BranchSelector, BranchSet, Combinator, MaterializationTree, SchemaNode};
