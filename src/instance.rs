//! Field Instances
//!
//! A [`FieldInstance`] is one live field of the form. It owns its own
//! [`MaterializationTree`], the constraints materialized from the current
//! branch selection, and the children built from those constraints. Children
//! are owned exclusively by their parent; rebuilding or removing a field drops
//! its whole subtree.
//!
//! Instance pointers name the position of a field in the model, one segment
//! per level: `/properties-{name}`, `/items-{n}` for tuple positions and
//! `/{slot}-{key}` for collection entries.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::aggregate::ConstraintMap;
use crate::collection::{AddOutcome, ChildCollection, CollectionBounds, CollectionSlot, RemoveOutcome};
use crate::collector::ValueCollector;
use crate::config::FormOptions;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{FormError, Result};
use crate::keywords;
use crate::kind::FieldKind;
use crate::outcome::Outcome;
use crate::state::{Cascade, ElementKind, FieldState};
use crate::tree::{BranchSelector, MaterializationTree};

/// Process-local identity of a field instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque token a renderer attaches to the instance it drew
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderHandle(pub String);

/// Where a new instance goes and how it starts out
#[derive(Debug, Clone)]
pub struct Placement {
    pub pointer: String,
    pub kind: ElementKind,
    pub state: FieldState,
    pub property_key: Option<String>,
}

/// Children of a field, by shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "content", rename_all = "snake_case")]
pub enum Content {
    Leaf,
    Object {
        /// Declared properties in declaration order
        properties: IndexMap<String, FieldInstance>,
        additional: Option<ChildCollection>,
    },
    Array {
        /// Tuple positions
        prefix: Vec<FieldInstance>,
        additional: Option<ChildCollection>,
    },
}

/// A live field of the form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInstance {
    id: InstanceId,
    pointer: String,
    kind: ElementKind,
    property_key: Option<String>,
    state: FieldState,
    #[serde(skip)]
    tree: MaterializationTree,
    constraints: ConstraintMap,
    field_kind: FieldKind,
    content: Content,
    handle: Option<RenderHandle>,
}

impl FieldInstance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Property name for declared object members
    pub fn property_key(&self) -> Option<&str> {
        self.property_key.as_deref()
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    pub fn tree(&self) -> &MaterializationTree {
        &self.tree
    }

    /// Constraints materialized from the current branch selection
    pub fn constraints(&self) -> &ConstraintMap {
        &self.constraints
    }

    pub fn field_kind(&self) -> &FieldKind {
        &self.field_kind
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn handle(&self) -> Option<&RenderHandle> {
        self.handle.as_ref()
    }

    /// Attach a render handle, returning the one it replaces
    pub fn set_handle(&mut self, handle: RenderHandle) -> Option<RenderHandle> {
        self.handle.replace(handle)
    }

    /// Display title: the `title` annotation, else a label derived from placement
    pub fn title(&self, options: &FormOptions) -> String {
        if let Some(title) = self.constraints.get(keywords::TITLE).and_then(Value::as_str) {
            return title.to_string();
        }
        if self.kind.is_removable() {
            return options.array_item_title.clone();
        }
        self.property_key.clone().unwrap_or_default()
    }

    /// Branch selectors on the currently selected path
    pub fn selectors(&self, options: &FormOptions) -> Vec<BranchSelector> {
        self.tree.active_selectors(&options.alternative_title_prefix)
    }

    pub fn collection(&self) -> Option<&ChildCollection> {
        match &self.content {
            Content::Leaf => None,
            Content::Object { additional, .. } | Content::Array { additional, .. } => additional.as_ref(),
        }
    }

    pub fn collection_mut(&mut self) -> Option<&mut ChildCollection> {
        match &mut self.content {
            Content::Leaf => None,
            Content::Object { additional, .. } | Content::Array { additional, .. } => additional.as_mut(),
        }
    }

    /// Direct children: declared members or tuple positions, then collection entries
    pub fn children(&self) -> Box<dyn Iterator<Item = &FieldInstance> + '_> {
        match &self.content {
            Content::Leaf => Box::new(std::iter::empty()),
            Content::Object { properties, additional } => {
                Box::new(properties.values().chain(additional.iter().flat_map(|c| c.instances())))
            }
            Content::Array { prefix, additional } => {
                Box::new(prefix.iter().chain(additional.iter().flat_map(|c| c.instances())))
            }
        }
    }

    fn children_mut(&mut self) -> Box<dyn Iterator<Item = &mut FieldInstance> + '_> {
        match &mut self.content {
            Content::Leaf => Box::new(std::iter::empty()),
            Content::Object { properties, additional } => Box::new(
                properties
                    .values_mut()
                    .chain(additional.iter_mut().flat_map(|c| c.instances_mut())),
            ),
            Content::Array { prefix, additional } => Box::new(
                prefix
                    .iter_mut()
                    .chain(additional.iter_mut().flat_map(|c| c.instances_mut())),
            ),
        }
    }

    pub fn find(&self, id: InstanceId) -> Option<&FieldInstance> {
        if self.id == id {
            return Some(self);
        }
        self.children().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: InstanceId) -> Option<&mut FieldInstance> {
        if self.id == id {
            return Some(self);
        }
        for child in self.children_mut() {
            if let Some(found) = child.find_mut(id) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_by_pointer(&self, pointer: &str) -> Option<&FieldInstance> {
        if self.pointer == pointer {
            return Some(self);
        }
        self.children()
            .filter(|child| pointer.starts_with(child.pointer()))
            .find_map(|child| child.find_by_pointer(pointer))
    }

    /// Ids of this instance and every descendant, parents first
    pub fn subtree_ids(&self) -> Vec<InstanceId> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, ids: &mut Vec<InstanceId>) {
        ids.push(self.id);
        for child in self.children() {
            child.collect_ids(ids);
        }
    }

    // -------------------------------------------------------------------------
    // State transitions
    // -------------------------------------------------------------------------

    fn activate(&mut self) {
        let cascade = self.state.activate();
        self.cascade(cascade);
    }

    fn deactivate(&mut self) {
        let cascade = self.state.deactivate();
        self.cascade(cascade);
    }

    fn cascade(&mut self, cascade: Cascade) {
        match cascade {
            Cascade::None => {}
            Cascade::Activate => self.children_mut().for_each(FieldInstance::activate),
            Cascade::Deactivate => self.children_mut().for_each(FieldInstance::deactivate),
        }
    }

    /// Flip the own toggle of an optional field, cascading to descendants
    pub fn toggle(&mut self) -> Outcome<()> {
        let cascade = self.state.toggle(self.kind)?;
        tracing::debug!(pointer = %self.pointer, enabled = self.is_enabled(), "field toggled");
        self.cascade(cascade);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Structural changes
    // -------------------------------------------------------------------------

    /// Select an alternative and rebuild the content from the new constraints.
    ///
    /// Returns the ids of the children that were torn down.
    pub fn select_branch(
        &mut self,
        path: &str,
        index: usize,
        factory: &mut InstanceFactory,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<InstanceId>> {
        self.tree.select(path, index)?;

        let torn_down: Vec<InstanceId> = self.children().flat_map(FieldInstance::subtree_ids).collect();

        self.constraints = self.tree.materialize(diagnostics);
        self.field_kind = FieldKind::detect(&self.constraints, &self.pointer, diagnostics);
        self.content = factory.build_content(
            &self.pointer,
            &self.constraints,
            &self.field_kind,
            self.state.is_enabled(),
            diagnostics,
        );

        tracing::debug!(
            pointer = %self.pointer,
            path,
            index,
            torn_down = torn_down.len(),
            "branch selected, content rebuilt"
        );
        Ok(torn_down)
    }

    fn require_collection(&mut self) -> Result<&mut ChildCollection> {
        let id = self.id;
        let pointer = self.pointer.clone();
        self.collection_mut()
            .ok_or(FormError::NoCollection(id.0, pointer))
    }

    /// Add an entry to this field's collection
    pub fn add_child(&mut self, factory: &mut InstanceFactory, diagnostics: &mut Diagnostics) -> Result<AddOutcome> {
        let enabled = self.is_enabled();
        let collection = self.require_collection()?;
        Ok(collection.add_child(enabled, factory, diagnostics))
    }

    /// Remove an entry from this field's collection
    pub fn remove_child(&mut self, key: u64) -> Result<RemoveOutcome> {
        Ok(self.require_collection()?.remove_child(key))
    }

    pub fn set_member_name(&mut self, key: u64, name: &str) -> Result<Outcome<()>> {
        Ok(self.require_collection()?.set_member_name(key, name))
    }

    // -------------------------------------------------------------------------
    // Value assembly
    // -------------------------------------------------------------------------

    /// Assemble the JSON value of this field from its enabled descendants
    pub fn value(&self, collector: &dyn ValueCollector, diagnostics: &mut Diagnostics) -> Value {
        match &self.content {
            Content::Leaf => collector.get_value(self).unwrap_or(Value::Null),
            Content::Object { properties, additional } => {
                let mut object = Map::new();
                for (name, child) in properties.iter().filter(|(_, child)| child.is_enabled()) {
                    object.insert(name.clone(), child.value(collector, diagnostics));
                }
                let extra = additional.iter().flat_map(|c| c.entries());
                for entry in extra.filter(|entry| entry.instance.is_enabled()) {
                    match &entry.name {
                        Some(name) => {
                            let value = entry.instance.value(collector, diagnostics);
                            object.insert(name.clone(), value);
                        }
                        None => diagnostics.warning(
                            entry.instance.pointer(),
                            DiagnosticCode::UnnamedMember,
                            "Extra member has no name; left out of the value",
                        ),
                    }
                }
                Value::Object(object)
            }
            Content::Array { prefix, additional } => {
                let items = prefix
                    .iter()
                    .chain(additional.iter().flat_map(|c| c.instances()))
                    .filter(|child| child.is_enabled())
                    .map(|child| child.value(collector, diagnostics))
                    .collect();
                Value::Array(items)
            }
        }
    }

    /// Enabled leaves below (and including) this field
    pub fn enabled_leaves(&self) -> Vec<&FieldInstance> {
        let mut leaves = Vec::new();
        self.collect_enabled_leaves(&mut leaves);
        leaves
    }

    fn collect_enabled_leaves<'a>(&'a self, leaves: &mut Vec<&'a FieldInstance>) {
        if !self.is_enabled() {
            return;
        }
        match self.content {
            Content::Leaf => leaves.push(self),
            _ => {
                for child in self.children() {
                    child.collect_enabled_leaves(leaves);
                }
            }
        }
    }
}

/// Assembled JSON value of a whole form
pub fn get_instance_value(root: &FieldInstance, collector: &dyn ValueCollector, diagnostics: &mut Diagnostics) -> Value {
    root.value(collector, diagnostics)
}

// =============================================================================
// Factory
// =============================================================================

/// Builds instances, handing out unique ids
#[derive(Debug, Clone)]
pub struct InstanceFactory {
    options: FormOptions,
    next_id: u64,
}

impl InstanceFactory {
    pub fn new(options: FormOptions) -> Self {
        Self { options, next_id: 0 }
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    fn next_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Build the root field of a reference-free schema
    pub fn build_root(&mut self, schema: &Value, diagnostics: &mut Diagnostics) -> FieldInstance {
        let placement = Placement {
            pointer: String::new(),
            kind: ElementKind::Root,
            state: FieldState::root(),
            property_key: None,
        };
        self.build(schema, placement, diagnostics)
    }

    pub(crate) fn build(&mut self, schema: &Value, placement: Placement, diagnostics: &mut Diagnostics) -> FieldInstance {
        let id = self.next_id();
        let tree = MaterializationTree::build(schema, diagnostics);
        let constraints = tree.materialize(diagnostics);
        let field_kind = FieldKind::detect(&constraints, &placement.pointer, diagnostics);
        let content = self.build_content(
            &placement.pointer,
            &constraints,
            &field_kind,
            placement.state.is_enabled(),
            diagnostics,
        );

        FieldInstance {
            id,
            pointer: placement.pointer,
            kind: placement.kind,
            property_key: placement.property_key,
            state: placement.state,
            tree,
            constraints,
            field_kind,
            content,
            handle: None,
        }
    }

    fn build_content(
        &mut self,
        pointer: &str,
        constraints: &ConstraintMap,
        field_kind: &FieldKind,
        enabled: bool,
        diagnostics: &mut Diagnostics,
    ) -> Content {
        match field_kind {
            FieldKind::Object => self.build_object(pointer, constraints, enabled, diagnostics),
            FieldKind::Array => self.build_array(pointer, constraints, enabled, diagnostics),
            _ => Content::Leaf,
        }
    }

    fn build_object(
        &mut self,
        pointer: &str,
        constraints: &ConstraintMap,
        enabled: bool,
        diagnostics: &mut Diagnostics,
    ) -> Content {
        let required: Vec<&str> = constraints
            .get(keywords::REQUIRED)
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut properties = IndexMap::new();
        if let Some(declared) = constraints.get(keywords::PROPERTIES).and_then(Value::as_object) {
            for (name, schema) in declared {
                let kind = if required.contains(&name.as_str()) {
                    ElementKind::Required
                } else {
                    ElementKind::Optional
                };
                let placement = Placement {
                    pointer: format!("{}/properties-{}", pointer, keywords::escape_segment(name)),
                    kind,
                    state: FieldState::for_child(kind, enabled, self.options.init_togglers_off),
                    property_key: Some(name.clone()),
                };
                let child = self.build(schema, placement, diagnostics);
                properties.insert(name.clone(), child);
            }
        }

        let additional = collection_schema(constraints.get(keywords::ADDITIONAL_PROPERTIES)).map(|schema| {
            let bounds = CollectionBounds::read(
                constraints,
                keywords::MIN_PROPERTIES,
                keywords::MAX_PROPERTIES,
                properties.len(),
                pointer,
                diagnostics,
            );
            ChildCollection::new(
                CollectionSlot::AdditionalProperties,
                pointer,
                schema,
                bounds,
                properties.keys().cloned().collect(),
                enabled,
                self,
                diagnostics,
            )
        });

        Content::Object { properties, additional }
    }

    fn build_array(
        &mut self,
        pointer: &str,
        constraints: &ConstraintMap,
        enabled: bool,
        diagnostics: &mut Diagnostics,
    ) -> Content {
        match constraints.get(keywords::ITEMS) {
            Some(Value::Array(tuple)) => {
                let prefix: Vec<FieldInstance> = tuple
                    .iter()
                    .enumerate()
                    .map(|(i, schema)| {
                        let placement = Placement {
                            pointer: format!("{}/{}-{}", pointer, keywords::ITEMS, i),
                            kind: ElementKind::Required,
                            state: FieldState::for_child(ElementKind::Required, enabled, self.options.init_togglers_off),
                            property_key: None,
                        };
                        self.build(schema, placement, diagnostics)
                    })
                    .collect();

                let additional = collection_schema(constraints.get(keywords::ADDITIONAL_ITEMS)).map(|schema| {
                    let bounds = CollectionBounds::read(
                        constraints,
                        keywords::MIN_ITEMS,
                        keywords::MAX_ITEMS,
                        prefix.len(),
                        pointer,
                        diagnostics,
                    );
                    ChildCollection::new(
                        CollectionSlot::AdditionalItems,
                        pointer,
                        schema,
                        bounds,
                        Vec::new(),
                        enabled,
                        self,
                        diagnostics,
                    )
                });

                Content::Array { prefix, additional }
            }
            items => {
                let additional = collection_schema(items).map(|schema| {
                    let bounds = CollectionBounds::read(
                        constraints,
                        keywords::MIN_ITEMS,
                        keywords::MAX_ITEMS,
                        0,
                        pointer,
                        diagnostics,
                    );
                    ChildCollection::new(
                        CollectionSlot::Items,
                        pointer,
                        schema,
                        bounds,
                        Vec::new(),
                        enabled,
                        self,
                        diagnostics,
                    )
                });

                Content::Array {
                    prefix: Vec::new(),
                    additional,
                }
            }
        }
    }
}

/// Item schema of a collection keyword; `true` allows anything, `false` or absent means no collection
fn collection_schema(value: Option<&Value>) -> Option<Value> {
    match value {
        Some(schema @ Value::Object(_)) => Some(schema.clone()),
        Some(Value::Bool(true)) => Some(json!({})),
        _ => None,
    }
}
