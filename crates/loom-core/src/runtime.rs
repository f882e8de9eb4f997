//! Runtime context
//!
//! [`Runtime`] owns the type registry, instance store, connection graph,
//! behavior system and event history for one UI tree. Nothing is global:
//! several runtimes can live side by side.
//!
//! All mutation is synchronous. An emission propagates along outgoing edges
//! in registration order, hands each delivered value to the target's
//! behaviors, applies their effects, and follows any behavior outputs. That
//! re-entry is the only way a chain continues, and it is bounded by
//! `runtime.max_emit_depth`.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use loom_config::LoomConfig;

use crate::autoconnect::{self, AutoConnectOptions, Proposal};
use crate::behavior::{apply_effects, BehaviorOptions, BehaviorSystem, Effect, HookOutcome};
use crate::binding::ViewBinding;
use crate::connection::{ConnectionManager, Delivery};
use crate::definition::ComponentDefinition;
use crate::error::{RuntimeError, RuntimeResult};
use crate::event::{Event, EventKind, EventLog};
use crate::instance::{ComponentInstance, InstanceStore, InstanceUpdate};
use crate::kind::{AliasTable, WidgetKind};
use crate::registry::TypeRegistry;
use crate::transform::Transform;
use crate::types::{ConnectionPoint, PropertyMap};

/// Registries and history for one UI tree
#[derive(Debug)]
pub struct Runtime {
    config: LoomConfig,
    aliases: AliasTable,
    types: TypeRegistry,
    instances: InstanceStore,
    connections: ConnectionManager,
    behaviors: BehaviorSystem,
    events: EventLog,
    emit_depth: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(LoomConfig::default())
    }
}

impl Runtime {
    /// Runtime with the built-in behaviors registered
    pub fn new(config: LoomConfig) -> Self {
        let aliases = AliasTable::from_config(&config.interpreter);
        let events = EventLog::new(config.runtime.event_history_capacity);
        Self {
            config,
            aliases,
            types: TypeRegistry::new(),
            instances: InstanceStore::new(),
            connections: ConnectionManager::new(),
            behaviors: BehaviorSystem::with_builtins(),
            events,
            emit_depth: 0,
        }
    }

    pub fn config(&self) -> &LoomConfig {
        &self.config
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Normalize and parse a tag with the configured aliases
    pub fn kind_of(&self, tag: &str) -> WidgetKind {
        self.aliases.kind(tag)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn instances(&self) -> &InstanceStore {
        &self.instances
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn behaviors(&self) -> &BehaviorSystem {
        &self.behaviors
    }

    pub fn behaviors_mut(&mut self) -> &mut BehaviorSystem {
        &mut self.behaviors
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }

    pub fn record(&mut self, event: Event) {
        self.events.record(event);
    }

    // --- types and instances ---

    pub fn register_type(&mut self, definition: ComponentDefinition) {
        let kind = definition.kind.to_string();
        self.types.register(definition);
        self.record(Event::new(EventKind::ComponentRegistered, kind, Value::Null));
    }

    /// Instantiate a registered kind; `None` when the kind is unknown
    pub fn create_instance(&mut self, kind: &WidgetKind, id: &str, props: PropertyMap) -> Option<String> {
        let id = self.types.instantiate(kind, id, props, &mut self.instances)?;
        self.record(Event::new(EventKind::InstanceCreated, &id, json!({"type": kind.as_tag()})));
        Some(id)
    }

    pub fn get_instance(&self, id: &str) -> Option<&ComponentInstance> {
        self.instances.get_instance(id)
    }

    pub fn update_instance(&mut self, id: &str, update: InstanceUpdate) -> bool {
        let updated = self.instances.update_instance(id, update).is_some();
        if updated {
            self.record(Event::new(EventKind::InstanceUpdated, id, Value::Null));
        }
        updated
    }

    /// Remove an instance with its connections and behavior state
    pub fn remove_instance(&mut self, id: &str) -> Option<ComponentInstance> {
        let removed = self.instances.remove_instance(id)?;

        let doomed: Vec<String> = self
            .connections
            .all_connections()
            .filter(|c| c.source.component == id || c.target.component == id)
            .map(|c| c.id.clone())
            .collect();
        self.connections.remove_connections_for(id);
        for connection_id in doomed {
            self.record(Event::new(EventKind::ConnectionRemoved, id, Value::Null).with_connection(connection_id));
        }
        self.behaviors.detach_all(id);

        self.record(Event::new(EventKind::InstanceRemoved, id, Value::Null));
        Some(removed)
    }

    /// Drop every instance, connection and behavior application
    pub fn clear(&mut self) {
        let ids: Vec<String> = self.instances.ids().map(str::to_string).collect();
        for id in ids {
            self.remove_instance(&id);
        }
        self.connections.clear();
        self.behaviors.clear_applied();
    }

    // --- points ---

    /// A point declared by the component's definition or an attached behavior
    pub fn point_of(&self, component: &str, point: &str) -> Option<ConnectionPoint> {
        let instance = self.instances.get_instance(component)?;
        self.types
            .get(&instance.kind)
            .and_then(|def| def.point(point).cloned())
            .or_else(|| self.behaviors.point_for(component, point))
    }

    /// Every point a component exposes
    pub fn points_of(&self, component: &str) -> Vec<ConnectionPoint> {
        let Some(instance) = self.instances.get_instance(component) else {
            return Vec::new();
        };
        let mut points: Vec<ConnectionPoint> = self
            .types
            .get(&instance.kind)
            .map(|def| def.points().cloned().collect())
            .unwrap_or_default();
        for applied in self.behaviors.attached(component) {
            if let Some(behavior) = self.behaviors.get(&applied.behavior_id) {
                points.extend(behavior.points().all().cloned());
            }
        }
        points
    }

    // --- connections ---

    /// Connect two declared points
    pub fn connect(
        &mut self,
        source_id: &str,
        source_point: &str,
        target_id: &str,
        target_point: &str,
        transform: Option<Transform>,
    ) -> RuntimeResult<String> {
        for (component, point) in [(source_id, source_point), (target_id, target_point)] {
            if !self.instances.contains(component) {
                warn!(component_id = %component, "Cannot connect unknown component");
                return Err(RuntimeError::UnknownComponent(component.to_string()));
            }
            if self.point_of(component, point).is_none() {
                warn!(component_id = %component, point = %point, "Cannot connect undeclared point");
                return Err(RuntimeError::unknown_point(component, point));
            }
        }
        if let Some(source) = self.point_of(source_id, source_point) {
            if !source.direction.emits() {
                warn!(component_id = %source_id, point = %source_point, "Source point does not emit");
            }
        }
        if let Some(target) = self.point_of(target_id, target_point) {
            if !target.direction.accepts() {
                warn!(component_id = %target_id, point = %target_point, "Target point does not accept");
            }
        }

        let id = self
            .connections
            .connect(source_id, source_point, target_id, target_point, transform);
        self.record(
            Event::new(
                EventKind::ConnectionCreated,
                source_id,
                json!({"sourcePoint": source_point, "targetId": target_id, "targetPoint": target_point}),
            )
            .with_connection(&id),
        );
        Ok(id)
    }

    /// Connect using a library transform name, or none
    pub fn connect_named(
        &mut self,
        source_id: &str,
        source_point: &str,
        target_id: &str,
        target_point: &str,
        transform_name: Option<&str>,
    ) -> RuntimeResult<String> {
        let transform = transform_name.and_then(|name| {
            let found = Transform::builtin(name);
            if found.is_none() {
                warn!(transform = %name, "Unknown transform, using identity");
            }
            found
        });
        self.connect(source_id, source_point, target_id, target_point, transform)
    }

    pub fn remove_connection(&mut self, id: &str) -> bool {
        let source = self.connections.get(id).map(|c| c.source.component.clone());
        let removed = self.connections.remove_connection(id);
        if let (true, Some(source)) = (removed, source) {
            self.record(Event::new(EventKind::ConnectionRemoved, source, Value::Null).with_connection(id));
        }
        removed
    }

    // --- dataflow ---

    /// Emit `value` on `component.point`
    ///
    /// Returns the direct deliveries. Failures further down the chain are
    /// logged and do not abort the emission.
    pub fn emit(&mut self, component: &str, point: &str, value: Value) -> RuntimeResult<Vec<Delivery>> {
        let max = self.config.runtime.max_emit_depth;
        if self.emit_depth >= max {
            warn!(component_id = %component, point = %point, max, "Emit depth exceeded, dropping value");
            return Err(RuntimeError::EmitDepthExceeded {
                depth: self.emit_depth + 1,
                max,
            });
        }
        if !self.instances.contains(component) {
            warn!(component_id = %component, point = %point, "Emit from unknown component ignored");
            return Ok(Vec::new());
        }

        self.emit_depth += 1;
        let deliveries = self
            .connections
            .propagate(component, point, &value, &mut self.instances);

        for delivery in &deliveries {
            self.record(
                Event::new(
                    EventKind::ConnectionDataSent,
                    component,
                    json!({"point": point, "value": value}),
                )
                .with_connection(&delivery.connection_id),
            );
            self.record(
                Event::new(
                    EventKind::ConnectionDataReceived,
                    &delivery.target.component,
                    json!({"point": delivery.target.point, "value": delivery.value}),
                )
                .with_connection(&delivery.connection_id),
            );
            self.run_behaviors(&delivery.target.component, &delivery.target.point, &delivery.value);
        }
        self.emit_depth -= 1;

        debug!(component_id = %component, point = %point, deliveries = deliveries.len(), "Emitted");
        Ok(deliveries)
    }

    /// Deliver `value` to an input of `component` as if it arrived over an
    /// edge, running any behavior listening on that point
    pub fn send_input(&mut self, component: &str, point: &str, value: Value) -> bool {
        if !self.instances.set_state_value(component, point, value.clone()) {
            return false;
        }
        self.record(Event::new(
            EventKind::ConnectionDataReceived,
            component,
            json!({"point": point, "value": value}),
        ));
        self.run_behaviors(component, point, &value);
        true
    }

    fn run_behaviors(&mut self, component: &str, point: &str, value: &Value) {
        let outcomes = self.behaviors.deliver(component, point, value, &self.instances);
        for outcome in outcomes {
            self.apply_outcome(outcome);
        }
    }

    /// Apply hook effects and follow their emissions
    fn apply_outcome(&mut self, outcome: HookOutcome) {
        let emissions = apply_effects(&outcome.component_id, outcome.effects, &mut self.instances);
        for (point, value) in emissions {
            if let Err(e) = self.emit(&outcome.component_id, &point, value) {
                warn!(component_id = %outcome.component_id, point = %point, error = %e, "Behavior output dropped");
            }
        }
    }

    /// Apply effects on behalf of a handler; emissions propagate as usual
    pub fn apply_effects(&mut self, component: &str, effects: Vec<Effect>) {
        self.apply_outcome(HookOutcome {
            component_id: component.to_string(),
            effects,
        });
    }

    // --- behaviors ---

    pub fn apply_behavior(
        &mut self,
        component: &str,
        behavior_id: &str,
        options: &BehaviorOptions,
    ) -> RuntimeResult<String> {
        let (applied_id, outcome) =
            self.behaviors
                .apply_behavior(component, behavior_id, options, &self.instances)?;
        self.record(
            Event::new(EventKind::BehaviorApplied, component, json!({"behavior": behavior_id, "appliedId": applied_id})),
        );
        self.apply_outcome(outcome);
        Ok(applied_id)
    }

    pub fn remove_behavior(&mut self, applied_id: &str) -> RuntimeResult<()> {
        let outcome = self.behaviors.remove_behavior(applied_id, &self.instances)?;
        self.record(Event::new(
            EventKind::BehaviorRemoved,
            &outcome.component_id,
            json!({"appliedId": applied_id}),
        ));
        self.apply_outcome(outcome);
        Ok(())
    }

    // --- auto-connect ---

    pub fn auto_connect_proposals(&self, components: &[&str]) -> Vec<Proposal> {
        autoconnect::propose(
            components,
            |id| self.points_of(id),
            &self.connections,
            AutoConnectOptions::from(&self.config.auto_connect),
        )
    }

    /// Create every proposed connection; returns the new ids
    pub fn apply_auto_connect(&mut self, components: &[&str]) -> Vec<String> {
        let proposals = self.auto_connect_proposals(components);
        let mut created = Vec::new();
        for proposal in proposals {
            let result = self.connect_named(
                &proposal.source.component,
                &proposal.source.point,
                &proposal.target.component,
                &proposal.target.point,
                proposal.transform.as_deref(),
            );
            match result {
                Ok(id) => created.push(id),
                Err(e) => warn!(error = %e, "Auto-connect proposal rejected"),
            }
        }
        if !created.is_empty() {
            info!(count = created.len(), "Auto-connected components");
        }
        created
    }
}

impl ViewBinding for Runtime {
    fn property(&self, id: &str, key: &str) -> Option<Value> {
        ViewBinding::property(&self.instances, id, key)
    }

    fn set_property(&mut self, id: &str, key: &str, value: Value) -> bool {
        ViewBinding::set_property(&mut self.instances, id, key, value)
    }

    fn state_value(&self, id: &str, key: &str) -> Option<Value> {
        ViewBinding::state_value(&self.instances, id, key)
    }

    fn style(&self, id: &str, property: &str) -> Option<Value> {
        self.instances.style(id, property)
    }

    fn set_style(&mut self, id: &str, property: &str, value: Value) -> bool {
        self.instances.set_style(id, property, value)
    }

    fn add_class(&mut self, id: &str, class: &str) -> bool {
        self.instances.add_class(id, class)
    }

    fn remove_class(&mut self, id: &str, class: &str) -> bool {
        self.instances.remove_class(id, class)
    }

    fn set_hidden(&mut self, id: &str, hidden: bool) -> bool {
        self.instances.set_hidden(id, hidden)
    }

    fn is_hidden(&self, id: &str) -> Option<bool> {
        self.instances.is_hidden(id)
    }

    fn properties(&self, id: &str) -> Option<PropertyMap> {
        self.instances.properties(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Capability, DataType};

    fn runtime() -> Runtime {
        let mut rt = Runtime::default();
        rt.register_type(ComponentDefinition::new("button").with_capability(Capability::new(
            "events",
            vec![ConnectionPoint::output("click", DataType::Any)],
        )));
        rt.register_type(ComponentDefinition::new("text").with_capability(Capability::new(
            "content",
            vec![ConnectionPoint::bidirectional("text", DataType::Text)],
        )));
        rt.create_instance(&WidgetKind::Button, "b1", PropertyMap::new());
        rt.create_instance(&WidgetKind::Text, "t1", PropertyMap::new());
        rt
    }

    #[test]
    fn test_connect_rejects_unknown_point() {
        let mut rt = runtime();
        let err = rt.connect("b1", "nope", "t1", "text", None).unwrap_err();
        assert!(err.is_missing_target());
        assert!(rt.connections().is_empty());
    }

    #[test]
    fn test_emit_writes_target_state_and_records_events() {
        let mut rt = runtime();
        rt.connect("b1", "click", "t1", "text", Some(Transform::constant(json!("clicked"))))
            .unwrap();
        let deliveries = rt.emit("b1", "click", Value::Null).unwrap();

        assert_eq!(deliveries.len(), 1);
        assert_eq!(rt.instances().state_value("t1", "text"), Some(&json!("clicked")));
        assert_eq!(rt.events().of_kind(EventKind::ConnectionDataReceived).count(), 1);
        assert_eq!(rt.events().of_kind(EventKind::ConnectionDataSent).count(), 1);
    }

    #[test]
    fn test_remove_instance_sweeps_connections_and_behaviors() {
        let mut rt = runtime();
        rt.connect("b1", "click", "t1", "text", None).unwrap();
        rt.apply_behavior("t1", "visibility", &BehaviorOptions::default())
            .unwrap();

        assert!(rt.remove_instance("t1").is_some());
        assert!(rt.connections().is_empty());
        assert_eq!(rt.behaviors().attached("t1").count(), 0);
        assert!(rt.remove_instance("t1").is_none());
    }

    #[test]
    fn test_behavior_output_continues_chain() {
        let mut rt = runtime();
        rt.create_instance(&WidgetKind::Text, "t2", PropertyMap::new());
        rt.apply_behavior("t1", "counter", &BehaviorOptions::default())
            .unwrap();
        rt.connect("b1", "click", "t1", "increment", None).unwrap();
        rt.connect("t1", "countChanged", "t2", "text", Some(Transform::builtin("toString").unwrap()))
            .unwrap();

        rt.emit("b1", "click", Value::Null).unwrap();
        rt.emit("b1", "click", Value::Null).unwrap();
        assert_eq!(rt.instances().state_value("t2", "text"), Some(&json!("2")));
    }

    #[test]
    fn test_single_hop_without_reemission() {
        let mut rt = runtime();
        rt.create_instance(&WidgetKind::Text, "t2", PropertyMap::new());
        rt.connect("b1", "click", "t1", "text", None).unwrap();
        rt.connect("t1", "text", "t2", "text", None).unwrap();

        rt.emit("b1", "click", json!("x")).unwrap();
        assert_eq!(rt.instances().state_value("t1", "text"), Some(&json!("x")));
        assert!(rt.instances().state_value("t2", "text").is_none());
    }

    #[test]
    fn test_cycles_are_bounded() {
        let mut rt = runtime();
        rt.apply_behavior("t1", "counter", &BehaviorOptions::default())
            .unwrap();
        // countChanged feeds back into increment forever
        rt.connect("t1", "countChanged", "t1", "increment", None).unwrap();
        rt.send_input("t1", "increment", Value::Null);

        let count = rt.instances().property("t1", "count").and_then(Value::as_i64).unwrap();
        let max = rt.config().runtime.max_emit_depth as i64;
        assert!(count <= max + 1);
    }

    #[test]
    fn test_auto_connect_applies_proposals() {
        let mut rt = runtime();
        rt.register_type(ComponentDefinition::new("input").with_capability(Capability::new(
            "value",
            vec![ConnectionPoint::bidirectional("value", DataType::Text)],
        )));
        rt.create_instance(&WidgetKind::Input, "i1", PropertyMap::new());

        let created = rt.apply_auto_connect(&["i1", "t1"]);
        assert_eq!(created.len(), 1);
        rt.emit("i1", "value", json!("typed")).unwrap();
        assert_eq!(rt.instances().state_value("t1", "text"), Some(&json!("typed")));
    }
}
