//! Built-in behaviors: toggle, position, counter and visibility

use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{Behavior, BehaviorContext, BehaviorPoints, BehaviorSystem, Compatibility};
use crate::coerce::{number, to_number};
use crate::kind::WidgetKind;
use crate::types::{ConnectionPoint, DataType, PropertyMap};

pub fn register_builtins(system: &mut BehaviorSystem) {
    system.register_behavior(Arc::new(ToggleBehavior));
    system.register_behavior(Arc::new(PositionBehavior));
    system.register_behavior(Arc::new(CounterBehavior));
    system.register_behavior(Arc::new(VisibilityBehavior));
}

fn defaults(value: Value) -> PropertyMap {
    match value {
        Value::Object(map) => map,
        _ => PropertyMap::new(),
    }
}

fn int_state(ctx: &BehaviorContext<'_>, key: &str, fallback: i64) -> i64 {
    ctx.get(key)
        .map(to_number)
        .filter(|n| n.is_finite())
        .map(|n| n as i64)
        .unwrap_or(fallback)
}

fn str_state(ctx: &BehaviorContext<'_>, key: &str, fallback: &str) -> String {
    ctx.get(key)
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

/// Cycles through `states`, writing the current one into `property`
///
/// State: `states` (array), `property` (string), `index` (current position).
pub struct ToggleBehavior;

impl ToggleBehavior {
    fn states(ctx: &BehaviorContext<'_>) -> Vec<Value> {
        ctx.get("states")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    fn write_current(ctx: &mut BehaviorContext<'_>) -> Option<Value> {
        let states = Self::states(ctx);
        if states.is_empty() {
            return None;
        }
        let len = states.len() as i64;
        let index = int_state(ctx, "index", 0).rem_euclid(len);
        ctx.set("index", json!(index));
        let current = states[index as usize].clone();
        let property = str_state(ctx, "property", "state");
        ctx.set_property(property, current.clone());
        Some(current)
    }
}

impl Behavior for ToggleBehavior {
    fn id(&self) -> &str {
        "toggle"
    }

    fn kind(&self) -> &str {
        "interaction"
    }

    fn points(&self) -> BehaviorPoints {
        BehaviorPoints {
            inputs: vec![ConnectionPoint::input("trigger", DataType::Any).named("Trigger")],
            outputs: vec![ConnectionPoint::output("toggled", DataType::Any).named("Toggled")],
        }
    }

    fn default_state(&self) -> PropertyMap {
        defaults(json!({"states": [false, true], "property": "state", "index": 0}))
    }

    fn on_attach(&self, ctx: &mut BehaviorContext<'_>) {
        Self::write_current(ctx);
    }

    fn on_input(&self, _point: &str, _value: &Value, ctx: &mut BehaviorContext<'_>) {
        let len = Self::states(ctx).len().max(1) as i64;
        let next = int_state(ctx, "index", 0).rem_euclid(len) + 1;
        ctx.set("index", json!(next));
        if let Some(current) = Self::write_current(ctx) {
            ctx.emit("toggled", current);
        }
    }
}

/// Moves its owner by writing `left`/`top` styles
///
/// State: `left`, `top` (pixels), `maxLeft`, `maxTop` (random move bounds).
pub struct PositionBehavior;

impl PositionBehavior {
    fn place(ctx: &mut BehaviorContext<'_>, left: i64, top: i64) {
        ctx.set("left", json!(left));
        ctx.set("top", json!(top));
        ctx.set_style("position", json!("absolute"));
        ctx.set_style("left", json!(format!("{left}px")));
        ctx.set_style("top", json!(format!("{top}px")));
    }
}

impl Behavior for PositionBehavior {
    fn id(&self) -> &str {
        "position"
    }

    fn kind(&self) -> &str {
        "layout"
    }

    fn compatibility(&self) -> Compatibility {
        Compatibility::Only(vec![
            WidgetKind::Button,
            WidgetKind::Text,
            WidgetKind::Heading,
            WidgetKind::Image,
            WidgetKind::Card,
            WidgetKind::Container,
        ])
    }

    fn points(&self) -> BehaviorPoints {
        BehaviorPoints {
            inputs: vec![
                ConnectionPoint::input("moveRandom", DataType::Any).named("Move randomly"),
                ConnectionPoint::input("setPosition", DataType::Object).named("Set position"),
            ],
            outputs: vec![
                ConnectionPoint::output("positionChanged", DataType::Object).named("Position changed")
            ],
        }
    }

    fn default_state(&self) -> PropertyMap {
        defaults(json!({"left": 0, "top": 0, "maxLeft": 300, "maxTop": 300}))
    }

    fn on_attach(&self, ctx: &mut BehaviorContext<'_>) {
        let (left, top) = (int_state(ctx, "left", 0), int_state(ctx, "top", 0));
        Self::place(ctx, left, top);
    }

    fn on_input(&self, point: &str, value: &Value, ctx: &mut BehaviorContext<'_>) {
        let (left, top) = match point {
            "moveRandom" => {
                let max_left = int_state(ctx, "maxLeft", 300).max(0);
                let max_top = int_state(ctx, "maxTop", 300).max(0);
                let mut rng = rand::rng();
                (rng.random_range(0..=max_left), rng.random_range(0..=max_top))
            }
            "setPosition" => {
                let coordinate = |key: &str, fallback: i64| {
                    value
                        .get(key)
                        .map(to_number)
                        .filter(|n| n.is_finite())
                        .map_or(fallback, |n| n as i64)
                };
                (
                    coordinate("left", int_state(ctx, "left", 0)),
                    coordinate("top", int_state(ctx, "top", 0)),
                )
            }
            _ => return,
        };
        Self::place(ctx, left, top);
        ctx.emit("positionChanged", json!({"left": left, "top": top}));
    }
}

/// Counts up and down, mirroring the count into `property`
///
/// State: `count`, `step`, `initial`, `property`.
pub struct CounterBehavior;

impl Behavior for CounterBehavior {
    fn id(&self) -> &str {
        "counter"
    }

    fn kind(&self) -> &str {
        "data"
    }

    fn compatibility(&self) -> Compatibility {
        Compatibility::Only(vec![
            WidgetKind::Button,
            WidgetKind::Text,
            WidgetKind::Heading,
            WidgetKind::Input,
            WidgetKind::Card,
            WidgetKind::Container,
        ])
    }

    fn points(&self) -> BehaviorPoints {
        BehaviorPoints {
            inputs: vec![
                ConnectionPoint::input("increment", DataType::Any),
                ConnectionPoint::input("decrement", DataType::Any),
                ConnectionPoint::input("reset", DataType::Any),
            ],
            outputs: vec![ConnectionPoint::output("countChanged", DataType::Number)],
        }
    }

    fn default_state(&self) -> PropertyMap {
        defaults(json!({"count": 0, "step": 1, "initial": 0, "property": "count"}))
    }

    fn on_attach(&self, ctx: &mut BehaviorContext<'_>) {
        let count = ctx.get("count").cloned().unwrap_or(json!(0));
        let property = str_state(ctx, "property", "count");
        ctx.set_property(property, count);
    }

    fn on_input(&self, point: &str, _value: &Value, ctx: &mut BehaviorContext<'_>) {
        let count = ctx.get("count").map(to_number).unwrap_or(0.0);
        let step = ctx.get("step").map(to_number).unwrap_or(1.0);
        let next = match point {
            "increment" => count + step,
            "decrement" => count - step,
            "reset" => ctx.get("initial").map(to_number).unwrap_or(0.0),
            _ => return,
        };
        let next = number(next);
        ctx.set("count", next.clone());
        let property = str_state(ctx, "property", "count");
        ctx.set_property(property, next.clone());
        ctx.emit("countChanged", next);
    }
}

/// Shows and hides its owner
///
/// State: `visible`.
pub struct VisibilityBehavior;

impl Behavior for VisibilityBehavior {
    fn id(&self) -> &str {
        "visibility"
    }

    fn kind(&self) -> &str {
        "presentation"
    }

    fn points(&self) -> BehaviorPoints {
        BehaviorPoints {
            inputs: vec![
                ConnectionPoint::input("show", DataType::Any),
                ConnectionPoint::input("hide", DataType::Any),
                ConnectionPoint::input("toggle", DataType::Any),
            ],
            outputs: vec![ConnectionPoint::output("visibilityChanged", DataType::Boolean)],
        }
    }

    fn default_state(&self) -> PropertyMap {
        defaults(json!({"visible": true}))
    }

    fn on_attach(&self, ctx: &mut BehaviorContext<'_>) {
        let visible = ctx.get("visible").and_then(Value::as_bool).unwrap_or(true);
        ctx.set_hidden(!visible);
    }

    fn on_input(&self, point: &str, _value: &Value, ctx: &mut BehaviorContext<'_>) {
        let visible = match point {
            "show" => true,
            "hide" => false,
            "toggle" => ctx.is_hidden(),
            _ => return,
        };
        ctx.set("visible", json!(visible));
        ctx.set_hidden(!visible);
        ctx.emit("visibilityChanged", json!(visible));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{apply_effects, BehaviorOptions, Effect};
    use crate::binding::ViewBinding;
    use crate::instance::{ComponentInstance, InstanceStore};

    fn setup(kind: WidgetKind) -> (BehaviorSystem, InstanceStore) {
        let mut store = InstanceStore::new();
        store.register_instance(ComponentInstance::new("c1", kind, PropertyMap::new()));
        (BehaviorSystem::with_builtins(), store)
    }

    fn attach(system: &mut BehaviorSystem, store: &mut InstanceStore, id: &str, options: BehaviorOptions) {
        let (_, outcome) = system.apply_behavior("c1", id, &options, store).unwrap();
        apply_effects("c1", outcome.effects, store);
    }

    fn send(system: &mut BehaviorSystem, store: &mut InstanceStore, point: &str) -> Vec<(String, Value)> {
        let outcomes = system.deliver("c1", point, &Value::Null, store);
        outcomes
            .into_iter()
            .flat_map(|o| apply_effects("c1", o.effects, &mut *store))
            .collect()
    }

    #[test]
    fn test_toggle_cycles_states() {
        let (mut system, mut store) = setup(WidgetKind::Button);
        let options = BehaviorOptions::default()
            .with_param("states", json!(["small", "medium", "large"]))
            .with_param("property", json!("size"))
            .with_param("index", json!(1));
        attach(&mut system, &mut store, "toggle", options);
        assert_eq!(store.property("c1", "size"), Some(&json!("medium")));

        let emitted = send(&mut system, &mut store, "trigger");
        assert_eq!(store.property("c1", "size"), Some(&json!("large")));
        assert_eq!(emitted, vec![("toggled".to_string(), json!("large"))]);

        send(&mut system, &mut store, "trigger");
        assert_eq!(store.property("c1", "size"), Some(&json!("small")));
    }

    #[test]
    fn test_toggle_advances_from_extreme_index() {
        let (_, store) = setup(WidgetKind::Button);
        let mut state = defaults(json!({
            "states": ["off", "on"],
            "property": "state",
            "index": i64::MAX,
        }));
        let mut ctx = BehaviorContext::new("c1", &mut state, &store);
        ToggleBehavior.on_input("trigger", &Value::Null, &mut ctx);
        let effects = ctx.into_effects();

        assert_eq!(state.get("index"), Some(&json!(0)));
        assert!(effects.contains(&Effect::Emit {
            point: "toggled".into(),
            value: json!("off"),
        }));
    }

    #[test]
    fn test_counter_counts() {
        let (mut system, mut store) = setup(WidgetKind::Text);
        attach(&mut system, &mut store, "counter", BehaviorOptions::default().with_param("step", json!(2)));
        send(&mut system, &mut store, "increment");
        send(&mut system, &mut store, "increment");
        let emitted = send(&mut system, &mut store, "decrement");
        assert_eq!(emitted, vec![("countChanged".to_string(), json!(2))]);
        send(&mut system, &mut store, "reset");
        assert_eq!(store.property("c1", "count"), Some(&json!(0)));
    }

    #[test]
    fn test_counter_rejects_images() {
        let (mut system, store) = setup(WidgetKind::Image);
        assert!(system
            .apply_behavior("c1", "counter", &BehaviorOptions::default(), &store)
            .is_err());
    }

    #[test]
    fn test_visibility_toggle() {
        let (mut system, mut store) = setup(WidgetKind::Card);
        attach(&mut system, &mut store, "visibility", BehaviorOptions::default());
        assert_eq!(store.is_hidden("c1"), Some(false));

        let emitted = send(&mut system, &mut store, "toggle");
        assert_eq!(store.is_hidden("c1"), Some(true));
        assert_eq!(emitted, vec![("visibilityChanged".to_string(), json!(false))]);

        send(&mut system, &mut store, "show");
        assert_eq!(store.is_hidden("c1"), Some(false));
    }

    #[test]
    fn test_position_set_and_random() {
        let (mut system, mut store) = setup(WidgetKind::Image);
        attach(
            &mut system,
            &mut store,
            "position",
            BehaviorOptions::default()
                .with_param("maxLeft", json!(10))
                .with_param("maxTop", json!(10)),
        );

        let outcomes = system.deliver("c1", "setPosition", &json!({"left": 40, "top": 8}), &store);
        let effects: Vec<Effect> = outcomes.into_iter().flat_map(|o| o.effects).collect();
        apply_effects("c1", effects, &mut store);
        assert_eq!(store.style("c1", "left"), Some(json!("40px")));
        assert_eq!(store.style("c1", "top"), Some(json!("8px")));

        let emitted = send(&mut system, &mut store, "moveRandom");
        let left = emitted[0].1["left"].as_i64().unwrap();
        assert!((0..=10).contains(&left));
    }
}
