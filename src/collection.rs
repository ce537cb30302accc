//! Child Collections
//!
//! A [`ChildCollection`] holds the repeatable children of one container:
//! array items, extra tuple items, or extra object members. Entries are keyed
//! by a monotonically increasing integer that is never handed out twice, so a
//! renderer can keep referring to an entry after its siblings were removed.
//!
//! Count bounds are read once, when the collection is built from its owner's
//! materialized constraints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::aggregate::ConstraintMap;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::instance::{FieldInstance, InstanceFactory, Placement};
use crate::keywords;
use crate::outcome::{Outcome, Refusal};
use crate::state::{ElementKind, FieldState};

/// Which child applicator a collection stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionSlot {
    /// `items` with a single schema
    Items,
    /// `additionalItems` after a tuple `items`
    AdditionalItems,
    /// `additionalProperties`
    AdditionalProperties,
}

impl CollectionSlot {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Items => keywords::ITEMS,
            Self::AdditionalItems => keywords::ADDITIONAL_ITEMS,
            Self::AdditionalProperties => keywords::ADDITIONAL_PROPERTIES,
        }
    }

    /// Entries carry member names and assemble into an object
    pub fn is_named(&self) -> bool {
        matches!(self, Self::AdditionalProperties)
    }
}

/// Minimum and maximum child count of a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionBounds {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl CollectionBounds {
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }

    /// Read `min_keyword`/`max_keyword`, minus the children that are not part
    /// of the collection (tuple positions, declared properties).
    ///
    /// Integral floats such as `2.0` count; negative or fractional values are
    /// ignored with a warning.
    pub fn read(
        constraints: &ConstraintMap,
        min_keyword: &str,
        max_keyword: &str,
        fixed: usize,
        pointer: &str,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut bound = |keyword: &str| {
            let value = constraints.get(keyword)?;
            match count_value(value) {
                Some(n) => Some(usize::try_from(n).unwrap_or(usize::MAX).saturating_sub(fixed)),
                None => {
                    diagnostics.warning(
                        format!("{}/{}", pointer, keyword),
                        DiagnosticCode::MalformedKeyword,
                        format!("{} must be a non-negative integer, found {}; ignored", keyword, value),
                    );
                    None
                }
            }
        };
        let min = bound(min_keyword);
        let max = bound(max_keyword);
        Self::new(min, max)
    }
}

fn count_value(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Some(f as u64),
        _ => None,
    }
}

/// Largest minimum a collection is pre-populated to
pub const MAX_PREPOPULATED: usize = 1024;

/// One child of a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionEntry {
    pub key: u64,
    /// Member name; always `None` for list-like collections
    pub name: Option<String>,
    pub instance: FieldInstance,
}

pub type AddOutcome = Outcome<u64>;
pub type RemoveOutcome = Outcome<FieldInstance>;

/// Keyed, bounded set of repeatable children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildCollection {
    slot: CollectionSlot,
    owner_pointer: String,
    item_schema: Value,
    bounds: CollectionBounds,
    /// Names of declared properties, unavailable to extra members
    reserved_names: Vec<String>,
    next_key: u64,
    entries: BTreeMap<u64, CollectionEntry>,
}

impl ChildCollection {
    /// Build a collection pre-populated with its minimum number of children
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        slot: CollectionSlot,
        owner_pointer: &str,
        item_schema: Value,
        bounds: CollectionBounds,
        reserved_names: Vec<String>,
        owner_enabled: bool,
        factory: &mut InstanceFactory,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let bounds = match bounds {
            CollectionBounds { min: Some(min), max: Some(max) } if min > max => {
                diagnostics.warning(
                    format!("{}/{}", owner_pointer, slot.keyword()),
                    DiagnosticCode::ConflictingBounds,
                    format!("Minimum of {} children exceeds maximum of {}; using {} for both", min, max, max),
                );
                CollectionBounds::new(Some(max), Some(max))
            }
            CollectionBounds { min: Some(min), max } if min > MAX_PREPOPULATED => {
                diagnostics.warning(
                    format!("{}/{}", owner_pointer, slot.keyword()),
                    DiagnosticCode::ConflictingBounds,
                    format!(
                        "Minimum of {} children exceeds the limit of {} created up front; using {}",
                        min, MAX_PREPOPULATED, MAX_PREPOPULATED
                    ),
                );
                CollectionBounds::new(Some(MAX_PREPOPULATED), max)
            }
            bounds => bounds,
        };

        let mut collection = Self {
            slot,
            owner_pointer: owner_pointer.to_string(),
            item_schema,
            bounds,
            reserved_names,
            next_key: 0,
            entries: BTreeMap::new(),
        };

        for _ in 0..bounds.min.unwrap_or(0) {
            collection.insert_entry(owner_enabled, factory, diagnostics);
        }

        collection
    }

    pub fn slot(&self) -> CollectionSlot {
        self.slot
    }

    pub fn item_schema(&self) -> &Value {
        &self.item_schema
    }

    pub fn min(&self) -> Option<usize> {
        self.bounds.min
    }

    pub fn max(&self) -> Option<usize> {
        self.bounds.max
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn can_add(&self) -> bool {
        self.bounds.max.map_or(true, |max| self.count() < max)
    }

    pub fn can_remove(&self) -> bool {
        self.bounds.min.map_or(true, |min| self.count() > min)
    }

    /// Entries in key order, which is creation order
    pub fn entries(&self) -> impl Iterator<Item = &CollectionEntry> {
        self.entries.values()
    }

    pub fn entry(&self, key: u64) -> Option<&CollectionEntry> {
        self.entries.get(&key)
    }

    pub fn keys(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    pub(crate) fn instances(&self) -> impl Iterator<Item = &FieldInstance> {
        self.entries.values().map(|entry| &entry.instance)
    }

    pub(crate) fn instances_mut(&mut self) -> impl Iterator<Item = &mut FieldInstance> {
        self.entries.values_mut().map(|entry| &mut entry.instance)
    }

    /// Add one child, returning its key
    pub fn add_child(
        &mut self,
        owner_enabled: bool,
        factory: &mut InstanceFactory,
        diagnostics: &mut Diagnostics,
    ) -> AddOutcome {
        if let Some(max) = self.bounds.max {
            if self.count() >= max {
                return Err(Refusal::MaximumReached { max });
            }
        }
        Ok(self.insert_entry(owner_enabled, factory, diagnostics))
    }

    /// Remove the child with `key`, handing back its instance for teardown
    pub fn remove_child(&mut self, key: u64) -> RemoveOutcome {
        if !self.entries.contains_key(&key) {
            return Err(Refusal::UnknownKey { key });
        }
        if let Some(min) = self.bounds.min {
            if self.count() <= min {
                return Err(Refusal::MinimumReached { min });
            }
        }
        self.entries
            .remove(&key)
            .map(|entry| entry.instance)
            .ok_or(Refusal::UnknownKey { key })
    }

    /// Set the member name of an object-like entry.
    ///
    /// Names must be unique among the entries and must not shadow a declared
    /// property. Setting an entry's current name again is accepted.
    pub fn set_member_name(&mut self, key: u64, name: &str) -> Outcome<()> {
        if !self.slot.is_named() {
            return Err(Refusal::NotNamed);
        }
        if !self.entries.contains_key(&key) {
            return Err(Refusal::UnknownKey { key });
        }

        let taken = self.reserved_names.iter().any(|reserved| reserved == name)
            || self
                .entries
                .values()
                .any(|entry| entry.key != key && entry.name.as_deref() == Some(name));
        if taken {
            return Err(Refusal::DuplicateName { name: name.to_string() });
        }

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.name = Some(name.to_string());
        }
        Ok(())
    }

    fn insert_entry(&mut self, owner_enabled: bool, factory: &mut InstanceFactory, diagnostics: &mut Diagnostics) -> u64 {
        let key = self.next_key;
        self.next_key += 1;

        let placement = Placement {
            pointer: format!("{}/{}-{}", self.owner_pointer, self.slot.keyword(), key),
            kind: ElementKind::Removable,
            state: FieldState::for_child(ElementKind::Removable, owner_enabled, factory.options().init_togglers_off),
            property_key: None,
        };
        let instance = factory.build(&self.item_schema, placement, diagnostics);
        tracing::trace!(pointer = %instance.pointer(), key, "collection entry created");

        self.entries.insert(
            key,
            CollectionEntry {
                key,
                name: None,
                instance,
            },
        );
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormOptions;
    use serde_json::json;

    fn collection(slot: CollectionSlot, bounds: CollectionBounds) -> (ChildCollection, InstanceFactory, Diagnostics) {
        let mut factory = InstanceFactory::new(FormOptions::default());
        let mut diags = Diagnostics::new();
        let reserved = vec!["declared".to_string()];
        let collection = ChildCollection::new(
            slot,
            "",
            json!({"type": "string"}),
            bounds,
            reserved,
            true,
            &mut factory,
            &mut diags,
        );
        (collection, factory, diags)
    }

    #[test]
    fn test_bounds_read_with_fixed_children() {
        let constraints = json!({"minItems": 1, "maxItems": 4});
        let map = constraints.as_object().unwrap();

        let mut diags = Diagnostics::new();

        let bounds = CollectionBounds::read(map, keywords::MIN_ITEMS, keywords::MAX_ITEMS, 2, "", &mut diags);
        assert_eq!(bounds, CollectionBounds::new(Some(0), Some(2)));

        let none = CollectionBounds::read(map, keywords::MIN_PROPERTIES, keywords::MAX_PROPERTIES, 0, "", &mut diags);
        assert_eq!(none, CollectionBounds::default());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_bounds_accept_integral_floats() {
        let constraints = json!({"minItems": 2.0, "maxItems": 2.5});
        let map = constraints.as_object().unwrap();
        let mut diags = Diagnostics::new();

        let bounds = CollectionBounds::read(map, keywords::MIN_ITEMS, keywords::MAX_ITEMS, 0, "/list", &mut diags);
        assert_eq!(bounds, CollectionBounds::new(Some(2), None));

        let malformed: Vec<_> = diags.with_code(DiagnosticCode::MalformedKeyword).collect();
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].pointer, "/list/maxItems");

        let negative = json!({"minItems": -1});
        let bounds = CollectionBounds::read(
            negative.as_object().unwrap(),
            keywords::MIN_ITEMS,
            keywords::MAX_ITEMS,
            0,
            "",
            &mut diags,
        );
        assert_eq!(bounds.min, None);
    }

    #[test]
    fn test_prepopulation_is_capped() {
        let (c, _, diags) = collection(CollectionSlot::Items, CollectionBounds::new(Some(1_000_000), None));
        assert_eq!(c.count(), MAX_PREPOPULATED);
        assert_eq!(c.min(), Some(MAX_PREPOPULATED));
        assert_eq!(diags.with_code(DiagnosticCode::ConflictingBounds).count(), 1);
    }

    #[test]
    fn test_prepopulated_to_minimum() {
        let (c, _, _) = collection(CollectionSlot::Items, CollectionBounds::new(Some(2), Some(3)));
        assert_eq!(c.count(), 2);
        assert_eq!(c.keys(), vec![0, 1]);
        assert!(c.entries().all(|e| e.instance.kind() == ElementKind::Removable));
    }

    #[test]
    fn test_cardinality_refusals_leave_count() {
        let (mut c, mut factory, mut diags) = collection(CollectionSlot::Items, CollectionBounds::new(Some(2), Some(3)));

        assert_eq!(c.add_child(true, &mut factory, &mut diags), Ok(2));
        assert!(!c.can_add());
        assert_eq!(c.add_child(true, &mut factory, &mut diags), Err(Refusal::MaximumReached { max: 3 }));
        assert_eq!(c.count(), 3);

        assert!(c.remove_child(0).is_ok());
        assert_eq!(c.remove_child(1), Err(Refusal::MinimumReached { min: 2 }));
        assert_eq!(c.count(), 2);
    }

    #[test]
    fn test_keys_never_reused() {
        let (mut c, mut factory, mut diags) = collection(CollectionSlot::Items, CollectionBounds::default());

        let a = c.add_child(true, &mut factory, &mut diags).unwrap();
        let b = c.add_child(true, &mut factory, &mut diags).unwrap();
        c.remove_child(b).unwrap();
        let d = c.add_child(true, &mut factory, &mut diags).unwrap();

        assert_eq!((a, b, d), (0, 1, 2));
        assert_eq!(c.remove_child(b), Err(Refusal::UnknownKey { key: b }));
        assert_eq!(c.keys(), vec![0, 2]);
    }

    #[test]
    fn test_new_child_follows_owner() {
        let (mut c, mut factory, mut diags) = collection(CollectionSlot::Items, CollectionBounds::default());
        let key = c.add_child(false, &mut factory, &mut diags).unwrap();

        let state = c.entry(key).unwrap().instance.state();
        assert!(!state.is_active());
        assert_eq!(state.disabled(), None);
    }

    #[test]
    fn test_member_names_unique() {
        let (mut c, mut factory, mut diags) =
            collection(CollectionSlot::AdditionalProperties, CollectionBounds::default());
        let a = c.add_child(true, &mut factory, &mut diags).unwrap();
        let b = c.add_child(true, &mut factory, &mut diags).unwrap();

        assert_eq!(c.set_member_name(a, "extra"), Ok(()));
        assert_eq!(c.set_member_name(a, "extra"), Ok(()));
        assert_eq!(
            c.set_member_name(b, "extra"),
            Err(Refusal::DuplicateName { name: "extra".to_string() })
        );
        assert_eq!(
            c.set_member_name(b, "declared"),
            Err(Refusal::DuplicateName { name: "declared".to_string() })
        );
        assert_eq!(c.entry(b).unwrap().name, None);
    }

    #[test]
    fn test_list_entries_have_no_names() {
        let (mut c, _, _) = collection(CollectionSlot::Items, CollectionBounds::new(Some(1), None));
        assert_eq!(c.set_member_name(0, "x"), Err(Refusal::NotNamed));
    }

    #[test]
    fn test_conflicting_bounds_clamped() {
        let (c, _, diags) = collection(CollectionSlot::Items, CollectionBounds::new(Some(5), Some(2)));
        assert_eq!(c.count(), 2);
        assert_eq!(c.min(), Some(2));
        assert_eq!(diags.with_code(DiagnosticCode::ConflictingBounds).count(), 1);
    }
}
