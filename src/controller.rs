//! Model Controller
//!
//! The [`ModelController`] owns the root field and is the only component that
//! talks to the outside: it resolves references, applies user [`Action`]s,
//! and notifies the [`Renderer`] after every cycle.
//!
//! Cycles never nest. A renderer receives the model read-only together with
//! an [`ActionQueue`]; follow-up actions and render handles it puts there are
//! applied once the current cycle is over, in the order they were queued.
//! At most [`MAX_FOLLOW_UPS`] follow-ups run per dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

use crate::checksum::Checksum;
use crate::collector::ValueCollector;
use crate::config::FormOptions;
use crate::deref::Dereferencer;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{FormError, Result};
use crate::instance::{get_instance_value, FieldInstance, InstanceFactory, InstanceId, RenderHandle};
use crate::outcome::Refusal;

/// Follow-up actions applied after one dispatch before the queue is dropped
pub const MAX_FOLLOW_UPS: usize = 64;

/// A user request against the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Pick alternative `index` of the branch set at `path` inside `instance`'s tree
    SelectBranch {
        instance: InstanceId,
        path: String,
        index: usize,
    },
    AddChild { owner: InstanceId },
    RemoveChild { owner: InstanceId, key: u64 },
    Toggle { instance: InstanceId },
    SetMemberName {
        owner: InstanceId,
        key: u64,
        name: String,
    },
}

impl Action {
    /// Instance the action is addressed to
    pub fn target(&self) -> InstanceId {
        match self {
            Self::SelectBranch { instance, .. } | Self::Toggle { instance } => *instance,
            Self::AddChild { owner } | Self::RemoveChild { owner, .. } | Self::SetMemberName { owner, .. } => *owner,
        }
    }
}

/// What triggered a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum ChangeCause {
    /// The whole model was (re)built from a schema
    Built,
    Action { action: Action },
}

/// Notification sent to the renderer after each cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelChange {
    pub cause: ChangeCause,
    /// Instance whose content or state changed
    pub affected: InstanceId,
    /// Key of a collection entry created by the action
    pub added: Option<u64>,
    /// Instances that no longer exist
    pub torn_down: Vec<InstanceId>,
    /// Set when the action was refused and nothing changed
    pub refusal: Option<Refusal>,
    /// Findings raised during this cycle only
    #[serde(default, skip_serializing_if = "Diagnostics::is_empty")]
    pub diagnostics: Diagnostics,
}

impl ModelChange {
    fn built(root: InstanceId, torn_down: Vec<InstanceId>) -> Self {
        Self {
            cause: ChangeCause::Built,
            affected: root,
            added: None,
            torn_down,
            refusal: None,
            diagnostics: Diagnostics::new(),
        }
    }

    fn applied(action: Action) -> Self {
        Self {
            affected: action.target(),
            cause: ChangeCause::Action { action },
            added: None,
            torn_down: Vec::new(),
            refusal: None,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn is_refused(&self) -> bool {
        self.refusal.is_some()
    }
}

/// Requests a renderer makes while being notified
#[derive(Debug, Default)]
pub struct ActionQueue {
    actions: VecDeque<Action>,
    handles: Vec<(InstanceId, RenderHandle)>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after the current cycle
    pub fn enqueue(&mut self, action: Action) {
        self.actions.push_back(action);
    }

    /// Link `instance` to the render handle drawn for it
    pub fn attach(&mut self, instance: InstanceId, handle: RenderHandle) {
        self.handles.push((instance, handle));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Observer of the model
pub trait Renderer {
    /// Called after every build and every applied or refused action
    fn render(&mut self, change: &ModelChange, root: &FieldInstance, queue: &mut ActionQueue);
}

/// Renderer that draws nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _change: &ModelChange, _root: &FieldInstance, _queue: &mut ActionQueue) {}
}

/// Owns a form model and drives its change cycles
pub struct ModelController<R: Renderer, C: ValueCollector> {
    root: FieldInstance,
    factory: InstanceFactory,
    diagnostics: Diagnostics,
    fingerprint: Checksum,
    renderer: R,
    collector: C,
}

impl<R: Renderer, C: ValueCollector> ModelController<R, C> {
    /// Resolve references in `schema` and build the model.
    ///
    /// Reference failures abort the build; the renderer is first notified
    /// once the model exists.
    pub fn new(
        schema: &Value,
        dereferencer: &dyn Dereferencer,
        options: FormOptions,
        renderer: R,
        collector: C,
    ) -> Result<Self> {
        let resolved = dereferencer.resolve_references(schema)?;
        let fingerprint = Checksum::from_json(&resolved);

        let mut factory = InstanceFactory::new(options);
        let mut diagnostics = Diagnostics::new();
        let root = factory.build_root(&resolved, &mut diagnostics);
        tracing::debug!(%fingerprint, instances = root.subtree_ids().len(), "form model built");

        let mut controller = Self {
            root,
            factory,
            diagnostics,
            fingerprint,
            renderer,
            collector,
        };
        let mut change = ModelChange::built(controller.root.id(), Vec::new());
        change.diagnostics = controller.diagnostics.clone();
        let follow_ups = controller.notify_and_drain(&change);
        controller.diagnostics.merge(follow_ups);
        Ok(controller)
    }

    pub fn root(&self) -> &FieldInstance {
        &self.root
    }

    pub fn options(&self) -> &FormOptions {
        self.factory.options()
    }

    /// Findings from building the model and assembling its value.
    ///
    /// Findings of individual actions travel on their [`ModelChange`].
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Fingerprint of the dereferenced schema the model was built from
    pub fn fingerprint(&self) -> &Checksum {
        &self.fingerprint
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    pub fn collector_mut(&mut self) -> &mut C {
        &mut self.collector
    }

    pub fn find(&self, id: InstanceId) -> Option<&FieldInstance> {
        self.root.find(id)
    }

    pub fn find_by_pointer(&self, pointer: &str) -> Option<&FieldInstance> {
        self.root.find_by_pointer(pointer)
    }

    /// Link an instance to a render handle outside of a notification
    pub fn attach_handle(&mut self, id: InstanceId, handle: RenderHandle) -> Result<Option<RenderHandle>> {
        let instance = self.root.find_mut(id).ok_or(FormError::UnknownInstance(id.0))?;
        Ok(instance.set_handle(handle))
    }

    /// Apply `action`, notify the renderer, then run any follow-ups it queued.
    ///
    /// Returns the change caused by `action` itself. Failing follow-ups are
    /// logged and added to its diagnostics; they never undo earlier changes.
    pub fn dispatch(&mut self, action: Action) -> Result<ModelChange> {
        let mut change = self.apply(action)?;
        let follow_ups = self.notify_and_drain(&change);
        change.diagnostics.merge(follow_ups);
        Ok(change)
    }

    /// Notify, then apply queued follow-ups. Returns what went wrong with them.
    fn notify_and_drain(&mut self, change: &ModelChange) -> Diagnostics {
        let mut failures = Diagnostics::new();
        let mut pending = self.notify(change);
        let mut applied = 0;

        while let Some(next) = pending.pop_front() {
            if applied == MAX_FOLLOW_UPS {
                tracing::warn!(dropped = pending.len() + 1, "follow-up limit reached");
                let pointer = self
                    .root
                    .find(change.affected)
                    .map(|instance| instance.pointer().to_string())
                    .unwrap_or_default();
                failures.warning(
                    pointer,
                    DiagnosticCode::FollowUpLimit,
                    format!(
                        "More than {} follow-up actions queued; {} dropped",
                        MAX_FOLLOW_UPS,
                        pending.len() + 1
                    ),
                );
                break;
            }
            applied += 1;

            match self.apply(next) {
                Ok(follow_up) => pending.extend(self.notify(&follow_up)),
                Err(error) => {
                    tracing::warn!(%error, "queued action failed");
                    failures.refused("", &error);
                }
            }
        }
        failures
    }

    fn notify(&mut self, change: &ModelChange) -> VecDeque<Action> {
        let mut queue = ActionQueue::new();
        self.renderer.render(change, &self.root, &mut queue);

        for (id, handle) in queue.handles {
            match self.root.find_mut(id) {
                Some(instance) => {
                    instance.set_handle(handle);
                }
                None => tracing::warn!(%id, "render handle for unknown instance dropped"),
            }
        }
        queue.actions
    }

    fn apply(&mut self, action: Action) -> Result<ModelChange> {
        tracing::debug!(?action, "applying action");
        let mut change = ModelChange::applied(action.clone());

        let instance = self
            .root
            .find_mut(action.target())
            .ok_or(FormError::UnknownInstance(action.target().0))?;
        let pointer = instance.pointer().to_string();
        let diagnostics = &mut change.diagnostics;

        let refusal = match action {
            Action::SelectBranch { path, index, .. } => {
                change.torn_down = instance.select_branch(&path, index, &mut self.factory, diagnostics)?;
                None
            }
            Action::AddChild { .. } => match instance.add_child(&mut self.factory, diagnostics)? {
                Ok(key) => {
                    change.added = Some(key);
                    None
                }
                Err(refusal) => Some(refusal),
            },
            Action::RemoveChild { key, .. } => match instance.remove_child(key)? {
                Ok(removed) => {
                    change.torn_down = removed.subtree_ids();
                    None
                }
                Err(refusal) => Some(refusal),
            },
            Action::Toggle { .. } => instance.toggle().err(),
            Action::SetMemberName { key, name, .. } => instance.set_member_name(key, &name)?.err(),
        };

        if let Some(refusal) = &refusal {
            change.diagnostics.refused(pointer, refusal);
        }
        if !change.torn_down.is_empty() {
            self.collector.forget(&change.torn_down);
        }
        change.refusal = refusal;
        Ok(change)
    }

    /// Assembled value of the whole form
    pub fn value(&mut self) -> Value {
        let mut diagnostics = Diagnostics::new();
        let value = get_instance_value(&self.root, &self.collector, &mut diagnostics);
        self.diagnostics.merge(diagnostics);
        value
    }

    /// Assemble the value after checking every enabled leaf
    pub fn submit(&mut self) -> Result<Value> {
        let invalid: Vec<String> = self
            .root
            .enabled_leaves()
            .into_iter()
            .filter(|leaf| {
                let value = self.collector.get_value(leaf).unwrap_or(Value::Null);
                !self.collector.check_leaf_constraints(leaf, &value)
            })
            .map(|leaf| match leaf.pointer() {
                "" => "#".to_string(),
                pointer => pointer.to_string(),
            })
            .collect();

        if !invalid.is_empty() {
            tracing::info!(count = invalid.len(), "submission rejected");
            return Err(FormError::InvalidLeaves(invalid));
        }
        Ok(self.value())
    }

    /// Rebuild from `schema` unless its fingerprint is unchanged.
    ///
    /// Returns whether a rebuild happened. Branch selections, collection
    /// entries and toggles do not survive a rebuild.
    pub fn reload(&mut self, schema: &Value, dereferencer: &dyn Dereferencer) -> Result<bool> {
        let resolved = dereferencer.resolve_references(schema)?;
        let fingerprint = Checksum::from_json(&resolved);
        if fingerprint == self.fingerprint {
            tracing::debug!(%fingerprint, "schema unchanged; model kept");
            return Ok(false);
        }

        let torn_down = self.root.subtree_ids();
        self.diagnostics.clear();
        self.root = self.factory.build_root(&resolved, &mut self.diagnostics);
        self.fingerprint = fingerprint;
        self.collector.forget(&torn_down);

        let mut change = ModelChange::built(self.root.id(), torn_down);
        change.diagnostics = self.diagnostics.clone();
        let follow_ups = self.notify_and_drain(&change);
        self.diagnostics.merge(follow_ups);
        Ok(true)
    }
}
