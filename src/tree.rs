//! Materialization Tree
//!
//! In-place combinators are modeled as a tree. Each [`SchemaNode`] keeps the
//! keywords common to every materialization of its subtree, plus one
//! [`BranchSet`] per disjunctive combinator (`anyOf` / `oneOf`) found at or
//! below it through `allOf`. A concrete schema is obtained by aggregating the
//! common keywords of every node along the currently selected path.
//!
//! Branch sets are keyed by a pointer-like path that names the combinator,
//! e.g. `/oneOf`, `/allOf/1/anyOf`, `/oneOf/0/oneOf`. Paths are unique per
//! tree, so branch sets lifted out of `allOf` members never clash.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::aggregate::{aggregate, ConstraintMap};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{FormError, Result};
use crate::keywords;

/// Disjunctive combinator kind
///
/// Both kinds materialize identically; only the surrounding UI semantics differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Combinator {
    AnyOf,
    OneOf,
}

impl Combinator {
    pub fn keyword(&self) -> &'static str {
        match self {
            Combinator::AnyOf => keywords::ANY_OF,
            Combinator::OneOf => keywords::ONE_OF,
        }
    }
}

/// One node of the materialization tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaNode {
    common: ConstraintMap,
    branch_sets: IndexMap<String, BranchSet>,
}

/// The resolved alternatives of one `anyOf` / `oneOf`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchSet {
    combinator: Combinator,
    alternatives: Vec<SchemaNode>,
    selected: usize,
}

/// What a renderer needs to draw one selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSelector {
    /// Path of the branch set inside the tree
    pub path: String,
    pub combinator: Combinator,
    /// One display title per alternative, in declaration order
    pub options: Vec<String>,
    pub selected: usize,
}

// =============================================================================
// Resolve
// =============================================================================

/// Build the subtree for `schema`, naming branch sets under `path`.
pub fn resolve(schema: &Value, path: &str, diagnostics: &mut Diagnostics) -> SchemaNode {
    let direct = match schema {
        Value::Object(map) => map.clone(),
        Value::Bool(true) => ConstraintMap::new(),
        Value::Bool(false) => match json!({ "not": {} }) {
            Value::Object(map) => map,
            _ => ConstraintMap::new(),
        },
        other => {
            diagnostics.warning(
                path,
                DiagnosticCode::MalformedKeyword,
                format!("Schema must be an object or a boolean, found {}", other),
            );
            ConstraintMap::new()
        }
    };

    let mut common: ConstraintMap = direct
        .iter()
        .filter(|(keyword, _)| !keywords::is_combinator(keyword))
        .map(|(keyword, value)| (keyword.clone(), value.clone()))
        .collect();

    let mut branch_sets = IndexMap::new();

    if let Some(all_of) = direct.get(keywords::ALL_OF) {
        let all_of_path = format!("{}/{}", path, keywords::ALL_OF);
        match all_of.as_array() {
            Some(members) => {
                let mut maps = Vec::with_capacity(members.len() + 1);
                maps.push(common);
                for (i, member) in members.iter().enumerate() {
                    let node = resolve(member, &format!("{}/{}", all_of_path, i), diagnostics);
                    maps.push(node.common);
                    branch_sets.extend(node.branch_sets);
                }
                common = aggregate(&maps, diagnostics);
            }
            None => diagnostics.warning(
                all_of_path,
                DiagnosticCode::MalformedKeyword,
                "allOf must be an array of schemas; ignored",
            ),
        }
    }

    for combinator in [Combinator::AnyOf, Combinator::OneOf] {
        let Some(value) = direct.get(combinator.keyword()) else {
            continue;
        };
        let set_path = format!("{}/{}", path, combinator.keyword());

        match value.as_array() {
            Some(alternatives) if !alternatives.is_empty() => {
                let nodes = alternatives
                    .iter()
                    .enumerate()
                    .map(|(i, alternative)| {
                        let alternative_path = format!("{}/{}", set_path, i);
                        if alternative.get(keywords::TITLE).and_then(Value::as_str).is_none() {
                            diagnostics.warning(
                                alternative_path.as_str(),
                                DiagnosticCode::UntitledAlternative,
                                "Alternative has no title; a generated label will be shown",
                            );
                        }
                        resolve(alternative, &alternative_path, diagnostics)
                    })
                    .collect();
                branch_sets.insert(set_path, BranchSet::new(combinator, nodes));
            }
            Some(_) => diagnostics.warning(
                set_path,
                DiagnosticCode::EmptyCombinator,
                format!("{} has no alternatives; ignored", combinator.keyword()),
            ),
            None => diagnostics.warning(
                set_path,
                DiagnosticCode::MalformedKeyword,
                format!("{} must be an array of schemas; ignored", combinator.keyword()),
            ),
        }
    }

    SchemaNode { common, branch_sets }
}

// =============================================================================
// Nodes
// =============================================================================

impl SchemaNode {
    /// Keywords shared by every materialization of this subtree
    pub fn common(&self) -> &ConstraintMap {
        &self.common
    }

    pub fn branch_sets(&self) -> &IndexMap<String, BranchSet> {
        &self.branch_sets
    }

    pub fn is_leaf(&self) -> bool {
        self.branch_sets.is_empty()
    }

    /// Flatten this subtree following the current selection of every branch set.
    ///
    /// Always recomputed from scratch; nothing is cached between selections.
    pub fn materialize(&self, diagnostics: &mut Diagnostics) -> ConstraintMap {
        if self.branch_sets.is_empty() {
            return self.common.clone();
        }

        let mut maps = Vec::with_capacity(self.branch_sets.len() + 1);
        maps.push(self.common.clone());
        for set in self.branch_sets.values() {
            maps.push(set.selected_alternative().materialize(diagnostics));
        }

        aggregate(&maps, diagnostics)
    }

    fn title(&self) -> Option<&str> {
        self.common.get(keywords::TITLE).and_then(Value::as_str)
    }

    fn find_branch_set(&self, path: &str) -> Option<&BranchSet> {
        if let Some(set) = self.branch_sets.get(path) {
            return Some(set);
        }
        self.branch_sets
            .iter()
            .filter(|(set_path, _)| is_below(path, set_path))
            .flat_map(|(_, set)| set.alternatives.iter())
            .find_map(|alternative| alternative.find_branch_set(path))
    }

    fn find_branch_set_mut(&mut self, path: &str) -> Option<&mut BranchSet> {
        if self.branch_sets.contains_key(path) {
            return self.branch_sets.get_mut(path);
        }
        for (set_path, set) in self.branch_sets.iter_mut() {
            if !is_below(path, set_path) {
                continue;
            }
            for alternative in set.alternatives.iter_mut() {
                if let Some(found) = alternative.find_branch_set_mut(path) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn collect_selectors(&self, prefix: &str, out: &mut Vec<BranchSelector>) {
        for (path, set) in &self.branch_sets {
            out.push(BranchSelector {
                path: path.clone(),
                combinator: set.combinator,
                options: set.option_titles(prefix),
                selected: set.selected,
            });
            set.selected_alternative().collect_selectors(prefix, out);
        }
    }

    fn count_branch_sets(&self) -> usize {
        self.branch_sets
            .values()
            .map(|set| 1 + set.alternatives.iter().map(SchemaNode::count_branch_sets).sum::<usize>())
            .sum()
    }
}

/// Whether `path` names a branch set nested inside the set at `set_path`
fn is_below(path: &str, set_path: &str) -> bool {
    path.len() > set_path.len() && path.starts_with(set_path) && path[set_path.len()..].starts_with('/')
}

impl BranchSet {
    fn new(combinator: Combinator, alternatives: Vec<SchemaNode>) -> Self {
        Self {
            combinator,
            alternatives,
            selected: 0,
        }
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn alternatives(&self) -> &[SchemaNode] {
        &self.alternatives
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_alternative(&self) -> &SchemaNode {
        &self.alternatives[self.selected]
    }

    fn option_titles(&self, prefix: &str) -> Vec<String> {
        self.alternatives
            .iter()
            .enumerate()
            .map(|(i, alternative)| match alternative.title() {
                Some(title) => title.to_string(),
                None => format!("{} {}", prefix, i + 1),
            })
            .collect()
    }
}

// =============================================================================
// Tree
// =============================================================================

/// Materialization tree for one field instance, plus its branch selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterializationTree {
    root: SchemaNode,
}

impl MaterializationTree {
    /// Resolve a reference-free schema into a tree
    pub fn build(schema: &Value, diagnostics: &mut Diagnostics) -> Self {
        Self {
            root: resolve(schema, "", diagnostics),
        }
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Whether any alternative can be selected at all
    pub fn has_branches(&self) -> bool {
        !self.root.is_leaf()
    }

    /// Total number of branch sets, selected or not
    pub fn branch_set_count(&self) -> usize {
        self.root.count_branch_sets()
    }

    /// The schema as currently configured
    pub fn materialize(&self, diagnostics: &mut Diagnostics) -> ConstraintMap {
        self.root.materialize(diagnostics)
    }

    pub fn branch_set(&self, path: &str) -> Option<&BranchSet> {
        self.root.find_branch_set(path)
    }

    /// Change the selected alternative of the branch set at `path`.
    ///
    /// Selecting the current index again is allowed and changes nothing.
    /// Branch sets inside unselected alternatives can be preselected; they
    /// take effect once their enclosing alternative is selected.
    pub fn select(&mut self, path: &str, index: usize) -> Result<()> {
        let set = self
            .root
            .find_branch_set_mut(path)
            .ok_or_else(|| FormError::UnknownBranchSet { path: path.to_string() })?;

        if index >= set.alternatives.len() {
            return Err(FormError::AlternativeOutOfRange {
                path: path.to_string(),
                index,
                count: set.alternatives.len(),
            });
        }

        tracing::trace!(path, from = set.selected, to = index, "branch selected");
        set.selected = index;
        Ok(())
    }

    /// Selectors along the currently selected path, outermost first
    pub fn active_selectors(&self, title_prefix: &str) -> Vec<BranchSelector> {
        let mut out = Vec::new();
        self.root.collect_selectors(title_prefix, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(schema: Value) -> (MaterializationTree, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tree = MaterializationTree::build(&schema, &mut diags);
        (tree, diags)
    }

    fn scenario_a() -> Value {
        json!({
            "type": "object",
            "oneOf": [
                {"title": "X", "properties": {"x": {"type": "string"}}},
                {"title": "Y", "properties": {"y": {"type": "number"}}}
            ]
        })
    }

    #[test]
    fn test_leaf_schema_has_no_branches() {
        let (tree, diags) = build(json!({"type": "string", "minLength": 2}));
        assert!(!tree.has_branches());
        assert_eq!(tree.materialize(&mut Diagnostics::new()), tree.root().common().clone());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_combinators_never_in_common() {
        let (tree, _) = build(json!({
            "allOf": [{"oneOf": [{"title": "a"}, {"title": "b"}]}],
            "anyOf": [{"title": "c"}]
        }));
        for kw in keywords::COMBINATORS {
            assert!(tree.root().common().get(*kw).is_none());
        }
        assert!(tree.branch_set("/allOf/0/oneOf").is_some());
        assert!(tree.branch_set("/anyOf").is_some());
    }

    #[test]
    fn test_scenario_a_selection() {
        let (mut tree, _) = build(scenario_a());
        let mut diags = Diagnostics::new();

        let first = tree.materialize(&mut diags);
        assert!(first["properties"].get("x").is_some());
        assert!(first["properties"].get("y").is_none());

        tree.select("/oneOf", 1).unwrap();
        let second = tree.materialize(&mut diags);
        assert!(second["properties"].get("x").is_none());
        assert!(second["properties"].get("y").is_some());
        assert_eq!(second["type"], json!("object"));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_scenario_c_all_of_required() {
        let (tree, _) = build(json!({"allOf": [{"required": ["a"]}, {"required": ["b"]}]}));
        let materialized = tree.materialize(&mut Diagnostics::new());

        let mut required: Vec<&str> = materialized["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        required.sort();
        assert_eq!(required, vec!["a", "b"]);
    }

    #[test]
    fn test_selection_is_idempotent() {
        let (mut tree, _) = build(scenario_a());
        let mut diags = Diagnostics::new();

        tree.select("/oneOf", 1).unwrap();
        let once = tree.materialize(&mut diags);
        tree.select("/oneOf", 1).unwrap();
        let twice = tree.materialize(&mut diags);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_invalid_selection_leaves_state() {
        let (mut tree, _) = build(scenario_a());

        let err = tree.select("/oneOf", 2).unwrap_err();
        assert!(matches!(err, FormError::AlternativeOutOfRange { count: 2, .. }));
        assert!(matches!(tree.select("/anyOf", 0), Err(FormError::UnknownBranchSet { .. })));
        assert_eq!(tree.branch_set("/oneOf").unwrap().selected(), 0);
    }

    #[test]
    fn test_nested_branches_follow_selection() {
        let (mut tree, _) = build(json!({
            "type": "object",
            "oneOf": [
                {
                    "title": "A",
                    "oneOf": [
                        {"title": "A.1", "properties": {"a1": {"type": "boolean"}}},
                        {"title": "A.2", "properties": {"a2": {"type": "string"}}}
                    ]
                },
                {"title": "B", "properties": {"b": {"type": "integer"}}}
            ]
        }));
        let mut diags = Diagnostics::new();

        assert_eq!(tree.branch_set_count(), 2);
        let selectors = tree.active_selectors("Option");
        assert_eq!(selectors.len(), 2);
        assert_eq!(selectors[1].path, "/oneOf/0/oneOf");
        assert_eq!(selectors[1].options, vec!["A.1", "A.2"]);

        tree.select("/oneOf/0/oneOf", 1).unwrap();
        let m = tree.materialize(&mut diags);
        assert!(m["properties"].get("a2").is_some());

        tree.select("/oneOf", 1).unwrap();
        let m = tree.materialize(&mut diags);
        assert!(m["properties"].get("b").is_some());
        assert!(m["properties"].get("a2").is_none());
        assert_eq!(tree.active_selectors("Option").len(), 1);

        // the nested choice is remembered for when A comes back
        tree.select("/oneOf", 0).unwrap();
        let m = tree.materialize(&mut diags);
        assert!(m["properties"].get("a2").is_some());
    }

    #[test]
    fn test_untitled_and_empty_combinators_are_diagnosed() {
        let (tree, diags) = build(json!({"anyOf": [{"type": "string"}], "oneOf": []}));

        assert_eq!(diags.with_code(DiagnosticCode::UntitledAlternative).count(), 1);
        assert_eq!(diags.with_code(DiagnosticCode::EmptyCombinator).count(), 1);
        assert!(tree.branch_set("/oneOf").is_none());
        assert_eq!(tree.active_selectors("Option")[0].options, vec!["Option 1"]);
    }

    #[test]
    fn test_boolean_schemas() {
        let (tree, diags) = build(json!(true));
        assert!(tree.root().common().is_empty());
        assert!(diags.is_empty());

        let (tree, _) = build(json!(false));
        assert_eq!(tree.root().common().get("not"), Some(&json!({})));
    }
}
