//! Behavior system
//!
//! A behavior is reusable, parametrized logic attached to a component. Each
//! application gets private state seeded from the behavior defaults and the
//! options it was applied with. Values delivered to the owner on one of the
//! behavior's input points invoke it; it answers with [`Effect`]s that the
//! runtime applies through the view binding, including emissions on its
//! output points.
//!
//! Hooks never mutate the store directly. They read through a
//! [`ViewBinding`] and queue effects, so a hook cannot observe a half-applied
//! change.

pub mod builtin;

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::binding::ViewBinding;
use crate::error::{BehaviorError, BehaviorResult};
use crate::instance::InstanceStore;
use crate::kind::WidgetKind;
use crate::types::{ConnectionPoint, PropertyMap};

/// Which widget kinds a behavior can be applied to
#[derive(Debug, Clone, PartialEq)]
pub enum Compatibility {
    Any,
    Only(Vec<WidgetKind>),
}

impl Compatibility {
    pub fn allows(&self, kind: &WidgetKind) -> bool {
        match self {
            Compatibility::Any => true,
            Compatibility::Only(kinds) => kinds.contains(kind),
        }
    }
}

/// Points a behavior adds to its owner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorPoints {
    pub inputs: Vec<ConnectionPoint>,
    pub outputs: Vec<ConnectionPoint>,
}

impl BehaviorPoints {
    pub fn input(&self, id: &str) -> Option<&ConnectionPoint> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&ConnectionPoint> {
        self.outputs.iter().find(|p| p.id == id)
    }

    pub fn all(&self) -> impl Iterator<Item = &ConnectionPoint> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// Side effect requested by a behavior hook or a handler
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetProperty { key: String, value: Value },
    SetStyle { property: String, value: Value },
    AddClass(String),
    RemoveClass(String),
    SetHidden(bool),
    Emit { point: String, value: Value },
}

/// Apply effects to `owner` and return the emissions, in order
pub fn apply_effects(
    owner: &str,
    effects: Vec<Effect>,
    view: &mut dyn ViewBinding,
) -> Vec<(String, Value)> {
    let mut emissions = Vec::new();
    for effect in effects {
        match effect {
            Effect::SetProperty { key, value } => {
                view.set_property(owner, &key, value);
            }
            Effect::SetStyle { property, value } => {
                view.set_style(owner, &property, value);
            }
            Effect::AddClass(class) => {
                view.add_class(owner, &class);
            }
            Effect::RemoveClass(class) => {
                view.remove_class(owner, &class);
            }
            Effect::SetHidden(hidden) => {
                view.set_hidden(owner, hidden);
            }
            Effect::Emit { point, value } => emissions.push((point, value)),
        }
    }
    emissions
}

/// What a hook sees: its private state, a read view of the owner, and a
/// queue of effects
pub struct BehaviorContext<'a> {
    component_id: &'a str,
    state: &'a mut PropertyMap,
    view: &'a dyn ViewBinding,
    effects: Vec<Effect>,
}

impl<'a> BehaviorContext<'a> {
    pub fn new(component_id: &'a str, state: &'a mut PropertyMap, view: &'a dyn ViewBinding) -> Self {
        Self {
            component_id,
            state,
            view,
            effects: Vec::new(),
        }
    }

    pub fn component_id(&self) -> &str {
        self.component_id
    }

    pub fn state(&self) -> &PropertyMap {
        self.state
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// Owner's effective property
    pub fn property(&self, key: &str) -> Option<Value> {
        self.view.property(self.component_id, key)
    }

    pub fn is_hidden(&self) -> bool {
        self.view.is_hidden(self.component_id).unwrap_or(false)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.effects.push(Effect::SetProperty {
            key: key.into(),
            value,
        });
    }

    pub fn set_style(&mut self, property: impl Into<String>, value: Value) {
        self.effects.push(Effect::SetStyle {
            property: property.into(),
            value,
        });
    }

    pub fn add_class(&mut self, class: impl Into<String>) {
        self.effects.push(Effect::AddClass(class.into()));
    }

    pub fn remove_class(&mut self, class: impl Into<String>) {
        self.effects.push(Effect::RemoveClass(class.into()));
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.effects.push(Effect::SetHidden(hidden));
    }

    /// Emit on one of the behavior's output points
    pub fn emit(&mut self, point: impl Into<String>, value: Value) {
        self.effects.push(Effect::Emit {
            point: point.into(),
            value,
        });
    }

    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }
}

/// Reusable stateful logic attached to components
pub trait Behavior: Send + Sync {
    fn id(&self) -> &str;

    /// Free-form category, e.g. "interaction" or "layout"
    fn kind(&self) -> &str;

    fn compatibility(&self) -> Compatibility {
        Compatibility::Any
    }

    fn points(&self) -> BehaviorPoints;

    fn default_state(&self) -> PropertyMap {
        PropertyMap::new()
    }

    fn on_attach(&self, _ctx: &mut BehaviorContext<'_>) {}

    /// A value arrived on input point `point`
    fn on_input(&self, point: &str, value: &Value, ctx: &mut BehaviorContext<'_>);

    fn on_detach(&self, _ctx: &mut BehaviorContext<'_>) {}
}

/// Options passed when applying a behavior
///
/// `initialState` wins over loose parameters, which win over the behavior
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BehaviorOptions {
    #[serde(rename = "initialState", default)]
    pub initial_state: PropertyMap,
    #[serde(flatten)]
    pub params: PropertyMap,
}

impl BehaviorOptions {
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_initial_state(mut self, state: PropertyMap) -> Self {
        self.initial_state = state;
        self
    }

    /// Read options from a loose JSON value; non-objects give defaults
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(options) => options,
            Err(e) => {
                warn!(error = %e, "Behavior options are not an object, using defaults");
                Self::default()
            }
        }
    }

    fn seed(&self, defaults: PropertyMap) -> PropertyMap {
        let mut state = defaults;
        for (key, value) in self.params.iter().chain(self.initial_state.iter()) {
            state.insert(key.clone(), value.clone());
        }
        state
    }
}

/// One application of a behavior to a component
#[derive(Debug, Clone)]
pub struct AppliedBehavior {
    pub id: String,
    pub behavior_id: String,
    pub component_id: String,
    pub state: PropertyMap,
}

/// Result of a hook run: effects the runtime must apply to the owner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookOutcome {
    pub component_id: String,
    pub effects: Vec<Effect>,
}

/// Registry of behaviors plus their live applications
#[derive(Default)]
pub struct BehaviorSystem {
    behaviors: HashMap<String, Arc<dyn Behavior>>,
    applied: Vec<AppliedBehavior>,
}

impl std::fmt::Debug for BehaviorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.behaviors.keys().collect();
        ids.sort();
        f.debug_struct("BehaviorSystem")
            .field("behaviors", &ids)
            .field("applied", &self.applied)
            .finish()
    }
}

impl BehaviorSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// System with the built-in behaviors registered
    pub fn with_builtins() -> Self {
        let mut system = Self::new();
        builtin::register_builtins(&mut system);
        system
    }

    pub fn register_behavior(&mut self, behavior: Arc<dyn Behavior>) {
        let id = behavior.id().to_string();
        if self.behaviors.insert(id.clone(), behavior).is_some() {
            warn!(behavior = %id, "Behavior already registered, overwriting");
        } else {
            debug!(behavior = %id, "Registered behavior");
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Behavior>> {
        self.behaviors.get(id)
    }

    /// Behaviors applicable to `kind`, sorted by id
    pub fn behaviors_for(&self, kind: &WidgetKind) -> Vec<Arc<dyn Behavior>> {
        let mut matching: Vec<_> = self
            .behaviors
            .values()
            .filter(|b| b.compatibility().allows(kind))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id().cmp(b.id()));
        matching
    }

    /// Attach a behavior to a component and run its attach hook
    ///
    /// Returns the applied id together with the hook's effects. An
    /// incompatible component is rejected and left untouched.
    pub fn apply_behavior(
        &mut self,
        component_id: &str,
        behavior_id: &str,
        options: &BehaviorOptions,
        store: &InstanceStore,
    ) -> BehaviorResult<(String, HookOutcome)> {
        let behavior = self
            .behaviors
            .get(behavior_id)
            .cloned()
            .ok_or_else(|| BehaviorError::UnknownBehavior(behavior_id.to_string()))?;
        let instance = store
            .get_instance(component_id)
            .ok_or_else(|| BehaviorError::UnknownComponent(component_id.to_string()))?;

        if !behavior.compatibility().allows(&instance.kind) {
            let err = BehaviorError::Incompatible {
                behavior: behavior_id.to_string(),
                component: component_id.to_string(),
                kind: instance.kind.clone(),
            };
            warn!(error = %err, "Rejected behavior");
            return Err(err);
        }

        let mut state = options.seed(behavior.default_state());
        let effects = {
            let mut ctx = BehaviorContext::new(component_id, &mut state, store);
            behavior.on_attach(&mut ctx);
            ctx.into_effects()
        };

        let applied_id = Uuid::new_v4().to_string();
        debug!(
            applied_id = %applied_id,
            behavior = %behavior_id,
            component_id = %component_id,
            "Applied behavior"
        );
        self.applied.push(AppliedBehavior {
            id: applied_id.clone(),
            behavior_id: behavior_id.to_string(),
            component_id: component_id.to_string(),
            state,
        });

        Ok((
            applied_id,
            HookOutcome {
                component_id: component_id.to_string(),
                effects,
            },
        ))
    }

    /// Detach one application, running its detach hook
    pub fn remove_behavior(
        &mut self,
        applied_id: &str,
        store: &InstanceStore,
    ) -> BehaviorResult<HookOutcome> {
        let index = self
            .applied
            .iter()
            .position(|a| a.id == applied_id)
            .ok_or_else(|| BehaviorError::UnknownApplication(applied_id.to_string()))?;
        let mut applied = self.applied.remove(index);

        let effects = match self.behaviors.get(&applied.behavior_id) {
            Some(behavior) => {
                let mut ctx = BehaviorContext::new(&applied.component_id, &mut applied.state, store);
                behavior.on_detach(&mut ctx);
                ctx.into_effects()
            }
            None => Vec::new(),
        };
        debug!(applied_id = %applied_id, behavior = %applied.behavior_id, "Removed behavior");

        Ok(HookOutcome {
            component_id: applied.component_id,
            effects,
        })
    }

    /// Discard every application on `component_id` without running hooks
    pub fn detach_all(&mut self, component_id: &str) -> usize {
        let before = self.applied.len();
        self.applied.retain(|a| a.component_id != component_id);
        let removed = before - self.applied.len();
        if removed > 0 {
            debug!(component_id = %component_id, removed, "Discarded behavior state");
        }
        removed
    }

    /// Run every behavior on `component_id` whose input is `point`
    pub fn deliver(
        &mut self,
        component_id: &str,
        point: &str,
        value: &Value,
        store: &InstanceStore,
    ) -> Vec<HookOutcome> {
        let mut outcomes = Vec::new();
        for applied in self.applied.iter_mut().filter(|a| a.component_id == component_id) {
            let Some(behavior) = self.behaviors.get(&applied.behavior_id) else {
                continue;
            };
            if behavior.points().input(point).is_none() {
                continue;
            }
            let mut ctx = BehaviorContext::new(component_id, &mut applied.state, store);
            behavior.on_input(point, value, &mut ctx);
            outcomes.push(HookOutcome {
                component_id: component_id.to_string(),
                effects: ctx.into_effects(),
            });
        }
        outcomes
    }

    /// Applications attached to a component, in application order
    pub fn attached<'a>(&'a self, component_id: &'a str) -> impl Iterator<Item = &'a AppliedBehavior> + 'a {
        self.applied.iter().filter(move |a| a.component_id == component_id)
    }

    pub fn applied(&self, applied_id: &str) -> Option<&AppliedBehavior> {
        self.applied.iter().find(|a| a.id == applied_id)
    }

    /// A point some attached behavior declares on `component_id`
    pub fn point_for(&self, component_id: &str, point: &str) -> Option<ConnectionPoint> {
        self.attached(component_id)
            .filter_map(|a| self.behaviors.get(&a.behavior_id))
            .find_map(|b| b.points().all().find(|p| p.id == point).cloned())
    }

    pub fn clear_applied(&mut self) {
        self.applied.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::ComponentInstance;
    use crate::types::DataType;
    use serde_json::json;

    struct Echo;

    impl Behavior for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        fn kind(&self) -> &str {
            "test"
        }

        fn compatibility(&self) -> Compatibility {
            Compatibility::Only(vec![WidgetKind::Text])
        }

        fn points(&self) -> BehaviorPoints {
            BehaviorPoints {
                inputs: vec![ConnectionPoint::input("in", DataType::Any)],
                outputs: vec![ConnectionPoint::output("out", DataType::Any)],
            }
        }

        fn default_state(&self) -> PropertyMap {
            json!({"prefix": ">", "seen": 0}).as_object().cloned().unwrap()
        }

        fn on_input(&self, _point: &str, value: &Value, ctx: &mut BehaviorContext<'_>) {
            let seen = ctx.get("seen").and_then(Value::as_i64).unwrap_or(0) + 1;
            ctx.set("seen", json!(seen));
            let prefix = ctx.get("prefix").and_then(Value::as_str).unwrap_or("").to_string();
            ctx.emit("out", json!(format!("{prefix}{value}")));
        }
    }

    fn setup() -> (BehaviorSystem, InstanceStore) {
        let mut system = BehaviorSystem::new();
        system.register_behavior(Arc::new(Echo));
        let mut store = InstanceStore::new();
        store.register_instance(ComponentInstance::new("t1", WidgetKind::Text, PropertyMap::new()));
        store.register_instance(ComponentInstance::new("img", WidgetKind::Image, PropertyMap::new()));
        (system, store)
    }

    #[test]
    fn test_options_seed_over_defaults() {
        let (mut system, store) = setup();
        let options = BehaviorOptions::default()
            .with_param("prefix", json!("#"))
            .with_initial_state(json!({"seen": 5}).as_object().cloned().unwrap());
        let (applied_id, _) = system.apply_behavior("t1", "echo", &options, &store).unwrap();

        let state = &system.applied(&applied_id).unwrap().state;
        assert_eq!(state.get("prefix"), Some(&json!("#")));
        assert_eq!(state.get("seen"), Some(&json!(5)));
    }

    #[test]
    fn test_incompatible_is_rejected() {
        let (mut system, store) = setup();
        let err = system
            .apply_behavior("img", "echo", &BehaviorOptions::default(), &store)
            .unwrap_err();
        assert!(matches!(err, BehaviorError::Incompatible { .. }));
        assert_eq!(system.attached("img").count(), 0);
    }

    #[test]
    fn test_deliver_only_matching_input() {
        let (mut system, store) = setup();
        system
            .apply_behavior("t1", "echo", &BehaviorOptions::default(), &store)
            .unwrap();

        assert!(system.deliver("t1", "other", &json!(1), &store).is_empty());
        let outcomes = system.deliver("t1", "in", &json!(1), &store);
        assert_eq!(
            outcomes[0].effects,
            vec![Effect::Emit {
                point: "out".into(),
                value: json!(">1")
            }]
        );
    }

    #[test]
    fn test_detach_all_discards_state() {
        let (mut system, store) = setup();
        system
            .apply_behavior("t1", "echo", &BehaviorOptions::default(), &store)
            .unwrap();
        assert_eq!(system.detach_all("t1"), 1);
        assert!(system.point_for("t1", "in").is_none());
    }

    #[test]
    fn test_behaviors_for_filters_by_kind() {
        let (system, _) = setup();
        assert_eq!(system.behaviors_for(&WidgetKind::Text).len(), 1);
        assert!(system.behaviors_for(&WidgetKind::Image).is_empty());
    }

    #[test]
    fn test_options_from_loose_value() {
        let options = BehaviorOptions::from_value(&json!({
            "states": ["a", "b"],
            "initialState": {"index": 1}
        }));
        assert_eq!(options.params.get("states"), Some(&json!(["a", "b"])));
        assert_eq!(options.initial_state.get("index"), Some(&json!(1)));
        assert_eq!(BehaviorOptions::from_value(&json!(3)), BehaviorOptions::default());
    }
}
