use loom_core::{
    Capability, ComponentDefinition, ConnectionPoint, DataType, PropertyMap, Runtime, ViewBinding,
    WidgetKind,
};
use loom_script::{compile_handler, compile_transform, Invocation};
use proptest::prelude::*;
use serde_json::{json, Value};

fn runtime() -> Runtime {
    let mut rt = Runtime::default();
    rt.register_type(ComponentDefinition::new("button").with_capability(Capability::new(
        "events",
        vec![ConnectionPoint::output("click", DataType::Any)],
    )));
    rt.register_type(ComponentDefinition::new("text").with_capability(Capability::new(
        "content",
        vec![ConnectionPoint::input("text", DataType::Text)],
    )));
    rt.create_instance(&WidgetKind::Button, "b1", PropertyMap::new());
    rt.create_instance(&WidgetKind::Text, "out", PropertyMap::new());
    rt
}

fn invoke(rt: &mut Runtime, code: &str, self_id: &str, event: Value) -> loom_script::ExecOutcome {
    compile_handler(code)
        .unwrap()
        .run(
            Invocation {
                event,
                self_id: Some(self_id),
                max_steps: 10_000,
            },
            rt,
        )
        .unwrap()
}

#[test]
fn handler_sets_property_through_accessor() {
    let mut rt = runtime();
    let outcome = invoke(
        &mut rt,
        "function (event, accessor) { accessor('#out').setProperty('text', 'clicked') }",
        "b1",
        Value::Null,
    );

    assert_eq!(rt.property("out", "text"), Some(json!("clicked")));
    assert!(outcome.touched.contains("out"));
}

#[test]
fn handler_emit_propagates_over_connection() {
    let mut rt = runtime();
    rt.connect("b1", "click", "out", "text", None).unwrap();

    invoke(&mut rt, "accessor('self').emit('click', event.label)", "b1", json!({"label": "go"}));

    assert_eq!(rt.instances().state_value("out", "text"), Some(&json!("go")));
}

#[test]
fn presentation_calls_and_class_selection() {
    let mut rt = runtime();
    invoke(
        &mut rt,
        "const t = accessor('text'); t.addClass('loud').setStyle('color', 'red'); accessor('.loud').hide()",
        "b1",
        Value::Null,
    );

    assert_eq!(rt.style("out", "color"), Some(json!("red")));
    assert_eq!(rt.is_hidden("out"), Some(true));

    let outcome = invoke(&mut rt, "accessor('#out').getStyle('color')", "b1", Value::Null);
    assert_eq!(outcome.value, json!("red"));
}

#[test]
fn unmatched_selector_is_a_no_op() {
    let mut rt = runtime();
    let before = rt.get_instance("out").cloned();
    let outcome = invoke(&mut rt, "accessor('#ghost').setProperty('text', 'x')", "b1", Value::Null);

    assert!(outcome.touched.is_empty());
    assert_eq!(rt.get_instance("out").cloned(), before);
}

#[test]
fn custom_transform_on_connection() {
    let mut rt = runtime();
    let transform = compile_transform("'Count: ' + value", 1000).unwrap();
    rt.connect("b1", "click", "out", "text", Some(transform)).unwrap();

    rt.emit("b1", "click", json!(3)).unwrap();
    assert_eq!(rt.instances().state_value("out", "text"), Some(&json!("Count: 3")));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_integer_arithmetic_matches(a in -1000i64..1000, b in -1000i64..1000, c in -1000i64..1000) {
        let handler = compile_handler(&format!("({a}) + ({b}) * ({c})")).unwrap();
        let mut rt = Runtime::default();
        let outcome = handler
            .run(Invocation { event: Value::Null, self_id: None, max_steps: 100 }, &mut rt)
            .unwrap();
        prop_assert_eq!(outcome.value, json!(a + b * c));
    }
}
