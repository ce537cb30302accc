//! Field State Machine
//!
//! Every field instance carries an `active` flag, owned by its ancestors, and
//! an optional `disabled` flag, owned by the field itself. A field is enabled
//! when it is active and not disabled by its own toggle.
//!
//! Transitions never touch children directly. They return a [`Cascade`]
//! telling the owner what to propagate, so the per-field `disabled` flags of
//! descendants survive any number of deactivate/activate rounds.

use serde::{Deserialize, Serialize};

use crate::outcome::{Outcome, Refusal};

/// How a field came to exist, which decides the transitions it allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// The form itself: always active, no toggle
    Root,
    /// Declared and required: follows its parent, no toggle
    Required,
    /// Declared but optional: has its own toggle
    Optional,
    /// Collection member: follows its parent, can be removed
    Removable,
}

impl ElementKind {
    pub fn has_toggle(&self) -> bool {
        matches!(self, Self::Optional)
    }

    pub fn is_removable(&self) -> bool {
        matches!(self, Self::Removable)
    }
}

/// What a transition asks the owner to do with the field's children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
    None,
    Activate,
    Deactivate,
}

/// Activation state of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState {
    active: bool,
    /// `None` for kinds without a toggle
    disabled: Option<bool>,
}

impl FieldState {
    pub fn new(active: bool, disabled: Option<bool>) -> Self {
        Self { active, disabled }
    }

    pub fn root() -> Self {
        Self::new(true, None)
    }

    /// Initial state of a child created under a parent that is (or isn't) enabled
    pub fn for_child(kind: ElementKind, parent_enabled: bool, init_togglers_off: bool) -> Self {
        match kind {
            ElementKind::Optional => Self::new(parent_enabled, Some(init_togglers_off)),
            ElementKind::Root => Self::root(),
            ElementKind::Required | ElementKind::Removable => Self::new(parent_enabled, None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn disabled(&self) -> Option<bool> {
        self.disabled
    }

    pub fn is_enabled(&self) -> bool {
        self.active && !self.is_self_disabled()
    }

    fn is_self_disabled(&self) -> bool {
        self.disabled == Some(true)
    }

    /// Parent became enabled
    pub fn activate(&mut self) -> Cascade {
        if self.active {
            return Cascade::None;
        }
        self.active = true;
        if self.is_self_disabled() {
            Cascade::None
        } else {
            Cascade::Activate
        }
    }

    /// Parent stopped being enabled. The own `disabled` flag is kept.
    pub fn deactivate(&mut self) -> Cascade {
        if !self.active {
            return Cascade::None;
        }
        self.active = false;
        if self.is_self_disabled() {
            Cascade::None
        } else {
            Cascade::Deactivate
        }
    }

    /// Flip the own toggle of an active optional field
    pub fn toggle(&mut self, kind: ElementKind) -> Outcome<Cascade> {
        if !kind.has_toggle() {
            return Err(Refusal::NotToggleable);
        }
        if !self.active {
            return Err(Refusal::Inactive);
        }

        if self.is_self_disabled() {
            self.disabled = Some(false);
            Ok(Cascade::Activate)
        } else {
            self.disabled = Some(true);
            Ok(Cascade::Deactivate)
        }
    }
}

impl Default for FieldState {
    fn default() -> Self {
        Self::root()
    }
}
