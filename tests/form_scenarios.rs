//! Form Model Scenarios
//!
//! End-to-end behaviour of the model through the controller: branch
//! switching, collection bounds, aggregation and cascading activation.

use serde_json::{json, Value};

use schema_forms::{
    Action, Content, DefaultValueCollector, ElementKind, FieldInstance, FormError, FormOptions, InstanceId,
    LocalDereferencer, ModelController, OutlineRenderer, Refusal,
};

type Controller = ModelController<OutlineRenderer, DefaultValueCollector>;

fn fixture(content: &str) -> Value {
    serde_json::from_str(content).unwrap()
}

fn controller(schema: &Value) -> Controller {
    ModelController::new(
        schema,
        &LocalDereferencer::new(),
        FormOptions::default(),
        OutlineRenderer::new(FormOptions::default()),
        DefaultValueCollector::new(),
    )
    .unwrap()
}

fn id_at(controller: &Controller, pointer: &str) -> InstanceId {
    controller
        .find_by_pointer(pointer)
        .unwrap_or_else(|| panic!("no field at {}", pointer))
        .id()
}

fn property_names(instance: &FieldInstance) -> Vec<String> {
    match instance.content() {
        Content::Object { properties, .. } => properties.keys().cloned().collect(),
        other => panic!("expected object content, got {:?}", other),
    }
}

// =============================================================================
// Branch Selection
// =============================================================================

#[test]
fn test_scenario_a_branch_switch() {
    let mut c = controller(&fixture(include_str!("fixtures/scenario_a.json")));
    let root = c.root().id();
    assert_eq!(property_names(c.root()), vec!["x"]);
    let x = id_at(&c, "/properties-x");

    let change = c
        .dispatch(Action::SelectBranch {
            instance: root,
            path: "/oneOf".to_string(),
            index: 1,
        })
        .unwrap();

    assert_eq!(property_names(c.root()), vec!["y"]);
    assert!(change.torn_down.contains(&x));
    assert!(c.find(x).is_none());
    assert!(c.renderer().outline().contains("+ y: number (optional)"));
    assert!(!c.renderer().outline().contains("x: string"));
}

#[test]
fn test_branch_switch_idempotent_and_bounded() {
    let mut c = controller(&fixture(include_str!("fixtures/scenario_a.json")));
    let root = c.root().id();
    let select = |index| Action::SelectBranch {
        instance: root,
        path: "/oneOf".to_string(),
        index,
    };

    c.dispatch(select(1)).unwrap();
    let once = c.root().constraints().clone();
    c.dispatch(select(1)).unwrap();
    assert_eq!(c.root().constraints(), &once);

    let err = c.dispatch(select(2)).unwrap_err();
    assert!(matches!(err, FormError::AlternativeOutOfRange { index: 2, count: 2, .. }));
    assert_eq!(c.root().tree().branch_set("/oneOf").unwrap().selected(), 1);
    assert_eq!(c.root().constraints(), &once);

    let err = c
        .dispatch(Action::SelectBranch {
            instance: root,
            path: "/anyOf".to_string(),
            index: 0,
        })
        .unwrap_err();
    assert!(matches!(err, FormError::UnknownBranchSet { .. }));
}

// =============================================================================
// Collections
// =============================================================================

#[test]
fn test_scenario_b_cardinality() {
    let mut c = controller(&fixture(include_str!("fixtures/scenario_b.json")));
    let root = c.root().id();
    let count = |c: &Controller| c.root().collection().unwrap().count();

    assert_eq!(count(&c), 2);
    assert_eq!(c.value(), json!(["tag", "tag"]));

    let added = c.dispatch(Action::AddChild { owner: root }).unwrap();
    assert!(added.refusal.is_none());
    assert_eq!(count(&c), 3);

    let refused = c.dispatch(Action::AddChild { owner: root }).unwrap();
    assert_eq!(refused.refusal, Some(Refusal::MaximumReached { max: 3 }));
    assert_eq!(count(&c), 3);

    let keys = c.root().collection().unwrap().keys();
    c.dispatch(Action::RemoveChild { owner: root, key: keys[0] }).unwrap();
    assert_eq!(count(&c), 2);

    let refused = c.dispatch(Action::RemoveChild { owner: root, key: keys[1] }).unwrap();
    assert_eq!(refused.refusal, Some(Refusal::MinimumReached { min: 2 }));
    assert_eq!(count(&c), 2);
}

#[test]
fn test_branch_switch_rebuilds_collection_bounds() {
    let mut c = controller(&json!({
        "oneOf": [
            {"title": "Single", "type": "array", "minItems": 1, "maxItems": 1, "items": {"type": "string"}},
            {"title": "Many", "type": "array", "minItems": 3, "items": {"type": "string"}}
        ]
    }));
    let root = c.root().id();
    let bounds = |c: &Controller| {
        let collection = c.root().collection().unwrap();
        (collection.count(), collection.min(), collection.max())
    };
    let select = |index| Action::SelectBranch {
        instance: root,
        path: "/oneOf".to_string(),
        index,
    };

    assert_eq!(bounds(&c), (1, Some(1), Some(1)));
    let refused = c.dispatch(Action::AddChild { owner: root }).unwrap();
    assert_eq!(refused.refusal, Some(Refusal::MaximumReached { max: 1 }));

    let single = c.root().collection().unwrap().keys();
    let change = c.dispatch(select(1)).unwrap();
    assert_eq!(bounds(&c), (3, Some(3), None));
    assert_eq!(change.torn_down.len(), single.len());

    let first = c.root().collection().unwrap().keys()[0];
    let refused = c.dispatch(Action::RemoveChild { owner: root, key: first }).unwrap();
    assert_eq!(refused.refusal, Some(Refusal::MinimumReached { min: 3 }));
    for _ in 0..2 {
        let added = c.dispatch(Action::AddChild { owner: root }).unwrap();
        assert!(added.refusal.is_none());
    }
    assert_eq!(bounds(&c), (5, Some(3), None));

    let change = c.dispatch(select(0)).unwrap();
    assert_eq!(bounds(&c), (1, Some(1), Some(1)));
    assert_eq!(change.torn_down.len(), 5);
    let only = c.root().collection().unwrap().keys()[0];
    let refused = c.dispatch(Action::RemoveChild { owner: root, key: only }).unwrap();
    assert_eq!(refused.refusal, Some(Refusal::MinimumReached { min: 1 }));
}

#[test]
fn test_keys_are_never_reissued() {
    let mut c = controller(&fixture(include_str!("fixtures/scenario_b.json")));
    let root = c.root().id();
    let mut seen: Vec<u64> = c.root().collection().unwrap().keys();

    for _ in 0..5 {
        let added = c.dispatch(Action::AddChild { owner: root }).unwrap().added.unwrap();
        assert!(!seen.contains(&added));
        assert!(seen.iter().all(|key| *key < added));
        seen.push(added);

        let oldest = c.root().collection().unwrap().keys()[0];
        c.dispatch(Action::RemoveChild { owner: root, key: oldest }).unwrap();
        assert_eq!(c.root().collection().unwrap().count(), 2);
    }

    let stale = seen[0];
    let change = c.dispatch(Action::RemoveChild { owner: root, key: stale }).unwrap();
    assert_eq!(change.refusal, Some(Refusal::UnknownKey { key: stale }));
}

#[test]
fn test_cardinality_holds_for_any_sequence() {
    let mut c = controller(&fixture(include_str!("fixtures/scenario_b.json")));
    let root = c.root().id();

    // add, add, remove, add, remove, remove, remove, add...
    let pattern = [true, true, false, true, false, false, false, true, true, true, false];
    for add in pattern {
        let action = if add {
            Action::AddChild { owner: root }
        } else {
            let key = *c.root().collection().unwrap().keys().last().unwrap();
            Action::RemoveChild { owner: root, key }
        };
        c.dispatch(action).unwrap();

        let count = c.root().collection().unwrap().count();
        assert!((2..=3).contains(&count), "count {} out of bounds", count);
    }
}

// =============================================================================
// Aggregation
// =============================================================================

#[test]
fn test_scenario_c_all_of_required() {
    let c = controller(&fixture(include_str!("fixtures/scenario_c.json")));

    let required = c.root().constraints()["required"].clone();
    assert_eq!(required, json!(["a", "b"]));
    assert_eq!(c.find_by_pointer("/properties-a").unwrap().kind(), ElementKind::Required);
    assert_eq!(c.find_by_pointer("/properties-b").unwrap().kind(), ElementKind::Required);
    assert_eq!(c.find_by_pointer("/properties-c").unwrap().kind(), ElementKind::Optional);
}

// =============================================================================
// Cascading Activation
// =============================================================================

const LEVEL1: &str = "/properties-level1";
const FIXED1: &str = "/properties-level1/properties-fixed1";
const LEVEL2: &str = "/properties-level1/properties-fixed1/properties-level2";
const FIXED2: &str = "/properties-level1/properties-fixed1/properties-level2/properties-fixed2";
const LEVEL3: &str = "/properties-level1/properties-fixed1/properties-level2/properties-fixed2/properties-level3";
const FIXED3: &str =
    "/properties-level1/properties-fixed1/properties-level2/properties-fixed2/properties-level3/properties-fixed3";

fn assert_required_follow_parents(c: &Controller) {
    for (parent, required) in [(LEVEL1, FIXED1), (LEVEL2, FIXED2), (LEVEL3, FIXED3)] {
        let parent = c.find_by_pointer(parent).unwrap();
        let required = c.find_by_pointer(required).unwrap();
        assert_eq!(
            required.is_enabled(),
            parent.is_enabled(),
            "{} does not follow {}",
            required.pointer(),
            parent.pointer()
        );
    }
}

fn enabled(c: &Controller, pointer: &str) -> bool {
    c.find_by_pointer(pointer).unwrap().is_enabled()
}

#[test]
fn test_scenario_d_required_follow_parents() {
    let mut c = controller(&fixture(include_str!("fixtures/scenario_d.json")));
    let toggle = |c: &Controller, pointer| Action::Toggle { instance: id_at(c, pointer) };

    assert_required_follow_parents(&c);

    for pointer in [LEVEL3, LEVEL2, LEVEL1, LEVEL1, LEVEL2] {
        let action = toggle(&c, pointer);
        let change = c.dispatch(action).unwrap();
        assert!(change.refusal.is_none(), "toggle of {} refused", pointer);
        assert_required_follow_parents(&c);
    }

    // level1 and level2 back on, level3 still off
    assert!(enabled(&c, FIXED2));
    assert!(!enabled(&c, FIXED3));
}

#[test]
fn test_cascade_restores_own_flags() {
    let mut c = controller(&fixture(include_str!("fixtures/scenario_d.json")));

    let level3 = id_at(&c, LEVEL3);
    c.dispatch(Action::Toggle { instance: level3 }).unwrap();
    let before: Vec<(String, bool, Option<bool>)> = [LEVEL1, LEVEL2, LEVEL3, FIXED3]
        .iter()
        .map(|p| {
            let f = c.find_by_pointer(p).unwrap();
            (p.to_string(), f.state().is_active(), f.state().disabled())
        })
        .collect();

    let level1 = id_at(&c, LEVEL1);
    c.dispatch(Action::Toggle { instance: level1 }).unwrap();
    assert!(!enabled(&c, LEVEL2));
    assert!(!c.find_by_pointer(LEVEL3).unwrap().state().is_active());

    // an inactive optional cannot be toggled
    let refused = c.dispatch(Action::Toggle { instance: level3 }).unwrap();
    assert_eq!(refused.refusal, Some(Refusal::Inactive));

    c.dispatch(Action::Toggle { instance: level1 }).unwrap();
    let after: Vec<(String, bool, Option<bool>)> = [LEVEL1, LEVEL2, LEVEL3, FIXED3]
        .iter()
        .map(|p| {
            let f = c.find_by_pointer(p).unwrap();
            (p.to_string(), f.state().is_active(), f.state().disabled())
        })
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_disabled_fields_leave_the_value() {
    let mut c = controller(&fixture(include_str!("fixtures/scenario_d.json")));
    assert_eq!(
        c.value(),
        json!({"level1": {"fixed1": {"level2": {"fixed2": {"level3": {"fixed3": "deep"}}}}}})
    );

    let level2 = id_at(&c, LEVEL2);
    c.dispatch(Action::Toggle { instance: level2 }).unwrap();
    assert_eq!(c.value(), json!({"level1": {"fixed1": {}}}));
}

// =============================================================================
// References, tuples and extra members
// =============================================================================

#[test]
fn test_contact_form_end_to_end() {
    let mut c = controller(&fixture(include_str!("fixtures/contact.json")));

    assert_eq!(
        c.value(),
        json!({
            "name": null,
            "channel": {"address": "someone@example.org"},
            "location": [0, 0]
        })
    );
    match c.submit() {
        Err(FormError::InvalidLeaves(pointers)) => assert_eq!(pointers, vec!["/properties-name"]),
        other => panic!("expected invalid name, got {:?}", other),
    }

    let name = id_at(&c, "/properties-name");
    c.collector_mut().set_value(name, json!("Ada"));

    // switch the referenced oneOf to the phone alternative
    let channel = id_at(&c, "/properties-channel");
    let selectors = c.find(channel).unwrap().selectors(c.options());
    assert_eq!(selectors[0].options, vec!["Email", "Phone"]);
    c.dispatch(Action::SelectBranch {
        instance: channel,
        path: "/oneOf".to_string(),
        index: 1,
    })
    .unwrap();

    let number = id_at(&c, "/properties-channel/properties-number");
    c.collector_mut().set_value(number, json!("12ab"));
    match c.submit() {
        Err(FormError::InvalidLeaves(pointers)) => {
            assert_eq!(pointers, vec!["/properties-channel/properties-number"])
        }
        other => panic!("expected invalid number, got {:?}", other),
    }
    c.collector_mut().set_value(number, json!("+44 1234"));

    // tuple positions stay, one altitude may be added
    let location = id_at(&c, "/properties-location");
    let altitude = c.dispatch(Action::AddChild { owner: location }).unwrap().added.unwrap();
    let refused = c.dispatch(Action::AddChild { owner: location }).unwrap();
    assert_eq!(refused.refusal, Some(Refusal::MaximumReached { max: 1 }));
    let altitude_id = id_at(&c, &format!("/properties-location/additionalItems-{}", altitude));
    c.collector_mut().set_value(altitude_id, json!(120));

    // extra member names cannot shadow declared properties
    let root = c.root().id();
    let key = c.dispatch(Action::AddChild { owner: root }).unwrap().added.unwrap();
    let shadowing = c
        .dispatch(Action::SetMemberName {
            owner: root,
            key,
            name: "name".to_string(),
        })
        .unwrap();
    assert_eq!(shadowing.refusal, Some(Refusal::DuplicateName { name: "name".to_string() }));
    c.dispatch(Action::SetMemberName {
        owner: root,
        key,
        name: "nickname".to_string(),
    })
    .unwrap();
    let extra = id_at(&c, &format!("/additionalProperties-{}", key));
    c.collector_mut().set_value(extra, json!("Countess"));

    assert_eq!(
        c.submit().unwrap(),
        json!({
            "name": "Ada",
            "channel": {"number": "+44 1234"},
            "location": [0, 0, 120],
            "nickname": "Countess"
        })
    );
}

#[test]
fn test_recursive_schema_rejected() {
    let schema = json!({
        "$defs": {"tree": {"type": "object", "properties": {"children": {"type": "array", "items": {"$ref": "#/$defs/tree"}}}}},
        "$ref": "#/$defs/tree"
    });
    let result = ModelController::new(
        &schema,
        &LocalDereferencer::new(),
        FormOptions::default(),
        OutlineRenderer::default(),
        DefaultValueCollector::new(),
    );
    assert!(matches!(result, Err(FormError::RecursiveReference { .. })));
}
