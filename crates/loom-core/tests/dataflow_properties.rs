use loom_core::*;
use proptest::prelude::*;
use serde_json::{json, Value};

fn runtime_with(ids: &[&str]) -> Runtime {
    let mut rt = Runtime::default();
    rt.register_type(ComponentDefinition::new("input").with_capability(Capability::new(
        "value",
        vec![ConnectionPoint::bidirectional("value", DataType::Any)],
    )));
    for id in ids {
        rt.create_instance(&WidgetKind::Input, id, PropertyMap::new());
    }
    rt
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_identity_connection_delivers_value_unchanged(value in arb_value()) {
        let mut rt = runtime_with(&["a", "b"]);
        rt.connect("a", "value", "b", "value", None).unwrap();
        rt.emit("a", "value", value.clone()).unwrap();
        prop_assert_eq!(rt.instances().state_value("b", "value"), Some(&value));
    }

    #[test]
    fn prop_transform_connection_delivers_transformed_value(
        value in arb_value(),
        name in prop::sample::select(vec!["toString", "toUpperCase", "reverse", "negate", "add:3"]),
    ) {
        let mut rt = runtime_with(&["a", "b"]);
        let transform = Transform::builtin(name).unwrap();
        let expected = transform.apply(&value);
        rt.connect("a", "value", "b", "value", Some(transform)).unwrap();
        rt.emit("a", "value", value).unwrap();
        prop_assert_eq!(rt.instances().state_value("b", "value"), Some(&expected));
    }

    #[test]
    fn prop_removing_instance_removes_its_connections(
        edges in prop::collection::vec((0usize..4, 0usize..4), 1..12),
        victim in 0usize..4,
    ) {
        let ids = ["n0", "n1", "n2", "n3"];
        let mut rt = runtime_with(&ids);
        for (from, to) in &edges {
            rt.connect(ids[*from], "value", ids[*to], "value", None).unwrap();
        }

        rt.remove_instance(ids[victim]);
        let victim = ids[victim];
        prop_assert!(rt
            .connections()
            .all_connections()
            .all(|c| c.source.component != victim && c.target.component != victim));
    }

    #[test]
    fn prop_update_state_preserves_other_keys(
        first in "[a-z]{1,5}",
        second in "[a-z]{1,5}",
        a in any::<i32>(),
        b in any::<i32>(),
    ) {
        prop_assume!(first != second);
        let mut rt = runtime_with(&["a"]);
        let mut one = PropertyMap::new();
        one.insert(first.clone(), json!(a));
        let mut two = PropertyMap::new();
        two.insert(second.clone(), json!(b));

        rt.update_instance("a", InstanceUpdate::state(one));
        rt.update_instance("a", InstanceUpdate::state(two));

        let state = &rt.get_instance("a").unwrap().state;
        prop_assert_eq!(state.get(&first), Some(&json!(a)));
        prop_assert_eq!(state.get(&second), Some(&json!(b)));
    }
}

#[test]
fn removed_connection_no_longer_propagates() {
    let mut rt = runtime_with(&["a", "b"]);
    let id = rt.connect("a", "value", "b", "value", None).unwrap();
    rt.emit("a", "value", json!(1)).unwrap();
    assert!(rt.remove_connection(&id));

    rt.emit("a", "value", json!(2)).unwrap();
    assert_eq!(rt.instances().state_value("b", "value"), Some(&json!(1)));
}

#[test]
fn toggle_scenario_cycles_size() {
    let mut rt = Runtime::default();
    rt.register_type(ComponentDefinition::new("button"));
    rt.create_instance(&WidgetKind::Button, "b1", PropertyMap::new());

    let options = BehaviorOptions::default()
        .with_param("states", json!(["small", "medium", "large"]))
        .with_param("property", json!("size"))
        .with_param("index", json!(1));
    rt.apply_behavior("b1", "toggle", &options).unwrap();

    let size = |rt: &Runtime| rt.instances().property("b1", "size").cloned();
    assert_eq!(size(&rt), Some(json!("medium")));
    rt.send_input("b1", "trigger", Value::Null);
    assert_eq!(size(&rt), Some(json!("large")));
    rt.send_input("b1", "trigger", Value::Null);
    assert_eq!(size(&rt), Some(json!("small")));
}

#[test]
fn incompatible_behavior_leaves_component_untouched() {
    let mut rt = Runtime::default();
    rt.register_type(ComponentDefinition::new("image"));
    rt.create_instance(&WidgetKind::Image, "img", PropertyMap::new());
    let before = rt.get_instance("img").cloned();

    let err = rt
        .apply_behavior("img", "counter", &BehaviorOptions::default())
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Behavior(BehaviorError::Incompatible { .. })));
    assert_eq!(rt.get_instance("img").cloned(), before);
}

#[test]
fn observers_see_dataflow_events() {
    use std::sync::{Arc, Mutex};

    let mut rt = runtime_with(&["a", "b"]);
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    rt.events_mut()
        .subscribe(&[EventKind::ConnectionDataReceived], move |event| {
            sink.lock().unwrap().push(event.payload["value"].clone());
        });

    rt.connect("a", "value", "b", "value", None).unwrap();
    rt.emit("a", "value", json!("hi")).unwrap();
    assert_eq!(*received.lock().unwrap(), vec![json!("hi")]);
}
