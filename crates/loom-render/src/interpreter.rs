//! The tree interpreter
//!
//! Mounting walks a [`NodeSpec`] into the arena and queues every node for
//! type resolution. [`TreeInterpreter::resolve`] resolves the queue
//! concurrently, creates instances for ready nodes and wires whatever the
//! application declared. Rendering walks the arena; a node is re-rendered
//! only when its instance revision, its children or an explicit refresh
//! says so.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures::future::join_all;
use loom_config::LoomConfig;
use loom_core::types::layer_properties;
use loom_core::{
    BehaviorOptions, Event, EventKind, Fallback, InstanceUpdate, RenderContext, Renderable,
    Runtime, ViewBinding,
};
use loom_script::{compile_handler, Invocation};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::arena::{Child, CompiledCode, Node, NodeIndex, NodeStatus, TreeArena};
use crate::error::{InterpretError, InterpretResult};
use crate::resolver::{RegistryResolver, TypeResolver};
use crate::schema::{ChildSpec, CodeSpec, ConnectionSpec, LayoutSpec, NodeSpec};
use crate::widgets::register_builtin_widgets;

struct CacheEntry {
    stamp: u64,
    output: Renderable,
}

/// What a dispatched event did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    /// A compiled handler ran to completion
    pub handled: bool,
    /// Handler result
    pub value: Value,
    /// Nodes scheduled for refresh: `affectedComponents` plus touched nodes
    pub refreshed: Vec<String>,
    /// Output point the payload was emitted on
    pub emitted: Option<String>,
    pub deliveries: usize,
}

pub struct TreeInterpreter {
    pub(crate) runtime: Runtime,
    pub(crate) arena: TreeArena,
    resolver: Arc<dyn TypeResolver>,
    cache: HashMap<NodeIndex, CacheEntry>,
    stale: HashSet<String>,
    render_count: usize,
    pub(crate) layout: Option<LayoutSpec>,
    pub(crate) theme: Option<Value>,
    pub(crate) pending_connections: Vec<ConnectionSpec>,
    pub(crate) auto_connect_pending: bool,
}

impl Default for TreeInterpreter {
    fn default() -> Self {
        Self::new(LoomConfig::default())
    }
}

impl TreeInterpreter {
    /// Interpreter over a fresh runtime with the built-in widgets
    pub fn new(config: LoomConfig) -> Self {
        let mut runtime = Runtime::new(config);
        register_builtin_widgets(&mut runtime);
        Self::with_runtime(runtime)
    }

    /// Interpreter over an existing runtime, as-is
    pub fn with_runtime(runtime: Runtime) -> Self {
        Self {
            runtime,
            arena: TreeArena::new(),
            resolver: Arc::new(RegistryResolver),
            cache: HashMap::new(),
            stale: HashSet::new(),
            render_count: 0,
            layout: None,
            theme: None,
            pending_connections: Vec::new(),
            auto_connect_pending: false,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    pub fn arena(&self) -> &TreeArena {
        &self.arena
    }

    pub fn status(&self, id: &str) -> Option<&NodeStatus> {
        self.arena.by_id(id).map(|node| &node.status)
    }

    /// Definitions actually rendered so far (cache hits excluded)
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    // ------------------------------------------------------------------
    // Mounting
    // ------------------------------------------------------------------

    /// Insert a tree and queue its nodes for resolution
    pub fn mount(&mut self, spec: NodeSpec) -> InterpretResult<NodeIndex> {
        let position = self.arena.roots().len();
        self.check_ids(std::slice::from_ref(&spec), position, true)?;
        let index = self.insert_node(spec, None, None, position);
        self.queue_for_resolution();
        Ok(index)
    }

    /// Mount and resolve in one step
    pub async fn load(&mut self, spec: NodeSpec) -> InterpretResult<NodeIndex> {
        let index = self.mount(spec)?;
        self.resolve().await;
        Ok(index)
    }

    /// Fail on ids that repeat inside the specs, or that are already mounted
    /// when `against_mounted` is set
    pub(crate) fn check_ids(
        &self,
        specs: &[NodeSpec],
        first_position: usize,
        against_mounted: bool,
    ) -> InterpretResult<()> {
        let mut ids = Vec::new();
        for (i, spec) in specs.iter().enumerate() {
            collect_ids(spec, None, first_position + i, &mut ids);
        }
        let mut seen = HashSet::new();
        for id in ids {
            let mounted = against_mounted && self.arena.contains_id(&id);
            if mounted || !seen.insert(id.clone()) {
                warn!(node_id = %id, "Duplicate node id");
                return Err(InterpretError::DuplicateId(id));
            }
        }
        Ok(())
    }

    pub(crate) fn insert_node(
        &mut self,
        spec: NodeSpec,
        parent: Option<NodeIndex>,
        parent_id: Option<&str>,
        position: usize,
    ) -> NodeIndex {
        let id = spec
            .id
            .clone()
            .unwrap_or_else(|| auto_id(parent_id, position, &spec.type_tag));
        let kind = self.runtime.kind_of(&spec.type_tag);

        let events = compile_all(&id, &spec.events);
        let methods = compile_all(&id, &spec.methods);

        let index = self.arena.insert(Node {
            id: id.clone(),
            tag: spec.type_tag,
            kind,
            declared: spec.properties,
            styles: spec.styles,
            events,
            methods,
            region: spec.region,
            behaviors: spec.behaviors,
            status: NodeStatus::Unresolved,
            parent,
            children: Vec::new(),
        });

        for (position, child) in spec.children.into_iter().enumerate() {
            let child = match child {
                ChildSpec::Text(text) => Child::Text(text),
                ChildSpec::Node(node) => {
                    Child::Node(self.insert_node(*node, Some(index), Some(&id), position))
                }
            };
            if let Some(node) = self.arena.get_mut(index) {
                node.children.push(child);
            }
        }
        index
    }

    fn queue_for_resolution(&mut self) {
        let unresolved: Vec<NodeIndex> = self
            .arena
            .iter()
            .filter(|(_, node)| matches!(node.status, NodeStatus::Unresolved))
            .map(|(index, _)| index)
            .collect();
        for index in unresolved {
            if let Some(node) = self.arena.get_mut(index) {
                node.status = NodeStatus::Loading;
            }
        }
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolve every loading node; returns how many became ready
    pub async fn resolve(&mut self) -> usize {
        let pending: Vec<_> = self
            .arena
            .iter()
            .filter(|(_, node)| matches!(node.status, NodeStatus::Loading))
            .map(|(index, node)| (index, node.kind.clone()))
            .collect();

        let mut ready = 0;
        if !pending.is_empty() {
            let resolver = Arc::clone(&self.resolver);
            let results = {
                let registry = self.runtime.types();
                let resolver = &resolver;
                join_all(pending.iter().map(|(index, kind)| async move {
                    (*index, resolver.resolve(kind, registry).await)
                }))
                .await
            };

            for (index, result) in results {
                let Some(node) = self.arena.get(index) else {
                    continue;
                };
                let id = node.id.clone();
                let tag = node.tag.clone();
                let status = match result {
                    Ok(def) => {
                        if !self.runtime.types().contains(&def.kind) {
                            self.runtime.register_type((*def).clone());
                        }
                        ready += 1;
                        NodeStatus::Ready(def)
                    }
                    Err(e) => {
                        warn!(node_id = %id, node_type = %tag, error = %e, "Type resolution failed, rendering fallback");
                        NodeStatus::Error(e.to_string())
                    }
                };
                if let Some(node) = self.arena.get_mut(index) {
                    node.status = status;
                }
            }
        }

        self.materialize();
        self.wire_pending();
        debug!(ready, "Resolved nodes");
        ready
    }

    /// Create instances for ready nodes that have none, parents first
    fn materialize(&mut self) {
        let order: Vec<NodeIndex> = self
            .arena
            .roots()
            .to_vec()
            .into_iter()
            .flat_map(|root| self.arena.subtree(root))
            .collect();

        for index in order {
            let Some(node) = self.arena.get(index) else {
                continue;
            };
            let Some(def) = node.status.definition().cloned() else {
                continue;
            };
            let id = node.id.clone();
            let parent = node
                .parent
                .and_then(|p| self.arena.get(p))
                .map(|p| p.id.clone());
            let children: Vec<String> = self
                .arena
                .child_nodes(index)
                .into_iter()
                .filter_map(|i| self.arena.get(i).map(|n| n.id.clone()))
                .collect();

            if self.runtime.get_instance(&id).is_none() {
                let declared = node.declared.clone();
                let styles = node.styles.clone();
                let behaviors = node.behaviors.clone();

                if self.runtime.create_instance(&def.kind, &id, declared).is_none() {
                    warn!(node_id = %id, "Instance creation failed");
                    continue;
                }
                for (property, value) in styles {
                    self.runtime.set_style(&id, &property, value);
                }
                for spec in behaviors {
                    let options = if spec.options.is_null() {
                        BehaviorOptions::default()
                    } else {
                        BehaviorOptions::from_value(&spec.options)
                    };
                    if let Err(e) = self.runtime.apply_behavior(&id, &spec.behavior, &options) {
                        warn!(node_id = %id, behavior = %spec.behavior, error = %e, "Behavior not applied");
                    }
                }
            }

            self.runtime.update_instance(
                &id,
                InstanceUpdate::default()
                    .with_parent(parent)
                    .with_children(children),
            );
        }
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Render everything mounted
    pub fn render(&mut self) -> Renderable {
        let roots = self.arena.roots().to_vec();

        let Some(layout) = self.layout.clone() else {
            let mut rendered: Vec<Renderable> =
                roots.into_iter().map(|root| self.render_node(root).0).collect();
            return if rendered.len() == 1 {
                rendered.remove(0)
            } else {
                Renderable::Fragment { children: rendered }
            };
        };

        let mut regions: Vec<(String, Vec<Renderable>)> = layout
            .regions
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        let mut unassigned = Vec::new();

        for root in roots {
            let region = self.arena.get(root).and_then(|node| node.region.clone());
            let rendered = self.render_node(root).0;
            match region.and_then(|name| regions.iter_mut().find(|(r, _)| *r == name)) {
                Some((_, children)) => children.push(rendered),
                None => unassigned.push(rendered),
            }
        }

        let mut children: Vec<Renderable> = regions
            .into_iter()
            .map(|(name, children)| Renderable::Region { name, children })
            .collect();
        if !unassigned.is_empty() {
            children.push(Renderable::Region {
                name: "unassigned".to_string(),
                children: unassigned,
            });
        }
        Renderable::Fragment { children }
    }

    /// Render one node and its subtree
    pub fn render_id(&mut self, id: &str) -> Option<Renderable> {
        let index = self.arena.index_of(id)?;
        Some(self.render_node(index).0)
    }

    pub fn markup(&mut self) -> String {
        self.render().to_markup()
    }

    fn render_node(&mut self, index: NodeIndex) -> (Renderable, u64) {
        let Some(node) = self.arena.get(index) else {
            return (Renderable::Fragment { children: Vec::new() }, 0);
        };
        let id = node.id.clone();

        let def = match &node.status {
            NodeStatus::Unresolved | NodeStatus::Loading => {
                let placeholder = Renderable::Loading {
                    id,
                    attempted_type: node.tag.clone(),
                };
                return (placeholder, 0);
            }
            NodeStatus::Error(reason) => {
                let fallback = Renderable::Fallback(Fallback {
                    id,
                    attempted_type: node.tag.clone(),
                    properties: node.declared.clone(),
                    reason: reason.clone(),
                });
                return (fallback, 1);
            }
            NodeStatus::Ready(def) => Arc::clone(def),
        };
        let tag = node.tag.clone();
        let declared = node.declared.clone();
        let child_list = node.children.clone();

        let mut hasher = DefaultHasher::new();
        let mut children = Vec::with_capacity(child_list.len());
        for child in child_list {
            match child {
                Child::Text(text) => {
                    text.hash(&mut hasher);
                    children.push(Renderable::text(text));
                }
                Child::Node(child) => {
                    let (rendered, stamp) = self.render_node(child);
                    stamp.hash(&mut hasher);
                    children.push(rendered);
                }
            }
        }

        let Some(instance) = self.runtime.get_instance(&id) else {
            let fallback = Renderable::Fallback(Fallback {
                id,
                attempted_type: tag,
                properties: declared,
                reason: "instance missing".to_string(),
            });
            return (fallback, 1);
        };
        instance.revision.hash(&mut hasher);
        let stamp = hasher.finish();

        let forced = self.stale.remove(&id);
        if !forced {
            if let Some(entry) = self.cache.get(&index) {
                if entry.stamp == stamp {
                    return (entry.output.clone(), stamp);
                }
            }
        }

        let properties = layer_properties([&def.default_props, &instance.properties, &instance.state]);
        let ctx = RenderContext {
            instance,
            properties,
            styles: instance.presentation.styles.clone(),
            classes: instance.presentation.classes.iter().cloned().collect(),
            hidden: instance.presentation.hidden,
            children,
        };
        let output = def.render(ctx);
        self.render_count += 1;
        self.cache.insert(
            index,
            CacheEntry {
                stamp,
                output: output.clone(),
            },
        );
        (output, stamp)
    }

    /// Force nodes to re-render on the next pass
    pub fn refresh<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stale.extend(ids.into_iter().map(Into::into));
    }

    // ------------------------------------------------------------------
    // Events and methods
    // ------------------------------------------------------------------

    fn ready_node(&self, id: &str) -> InterpretResult<&Node> {
        let node = self
            .arena
            .by_id(id)
            .ok_or_else(|| InterpretError::UnknownNode(id.to_string()))?;
        if !node.status.is_ready() {
            debug!(node_id = %id, status = node.status.name(), "Event on a node that is not ready");
            return Err(InterpretError::NotReady {
                id: id.to_string(),
                status: node.status.name(),
            });
        }
        Ok(node)
    }

    /// Dispatch a user event (`onClick` or `click`) on a node
    pub fn dispatch_event(
        &mut self,
        node_id: &str,
        event: &str,
        payload: Value,
    ) -> InterpretResult<DispatchOutcome> {
        let node = self.ready_node(node_id)?;
        let code = event_names(event)
            .iter()
            .find_map(|name| node.events.get(name))
            .cloned();

        self.runtime.record(Event::new(
            EventKind::UserAction,
            node_id,
            json!({"event": event, "payload": payload}),
        ));

        let mut outcome = DispatchOutcome::default();
        if let Some(code) = code {
            let (handled, value, refreshed) = self.run_code(node_id, event, &code, payload.clone());
            outcome.handled = handled;
            outcome.value = value;
            outcome.refreshed = refreshed;
        }

        if self.runtime.config().interpreter.emit_event_points {
            let point = point_for_event(event);
            let declared = self
                .runtime
                .point_of(node_id, &point)
                .is_some_and(|p| p.direction.emits());
            if declared {
                match self.runtime.emit(node_id, &point, payload) {
                    Ok(deliveries) => outcome.deliveries = deliveries.len(),
                    Err(e) => warn!(node_id = %node_id, point = %point, error = %e, "Event emission failed"),
                }
                outcome.emitted = Some(point);
            }
        }

        Ok(outcome)
    }

    /// Run a named method of a node with `args` bound as the event
    pub fn invoke_method(&mut self, node_id: &str, method: &str, args: Value) -> InterpretResult<Value> {
        let node = self.ready_node(node_id)?;
        let code = node
            .methods
            .get(method)
            .cloned()
            .ok_or_else(|| InterpretError::UnknownMethod {
                node: node_id.to_string(),
                method: method.to_string(),
            })?;

        self.runtime.record(Event::new(
            EventKind::MethodInvoked,
            node_id,
            json!({"method": method, "args": args}),
        ));
        let (_, value, _) = self.run_code(node_id, method, &code, args);
        Ok(value)
    }

    /// Run compiled code; failures are logged and contained
    fn run_code(
        &mut self,
        node_id: &str,
        name: &str,
        code: &CompiledCode,
        event: Value,
    ) -> (bool, Value, Vec<String>) {
        let mut refreshed: BTreeSet<String> = code.affected.iter().cloned().collect();

        let Some(handler) = &code.handler else {
            debug!(node_id = %node_id, handler = %name, "Handler did not compile, skipping");
            return (false, Value::Null, self.schedule_refresh(refreshed));
        };

        let invocation = Invocation {
            event,
            self_id: Some(node_id),
            max_steps: self.runtime.config().script.max_steps,
        };
        let (handled, value) = match handler.run(invocation, &mut self.runtime) {
            Ok(outcome) => {
                refreshed.extend(outcome.touched);
                (true, outcome.value)
            }
            Err(e) => {
                warn!(node_id = %node_id, handler = %name, error = %e, "Handler failed");
                self.runtime.record(Event::new(
                    EventKind::HandlerFailed,
                    node_id,
                    json!({"handler": name, "error": e.to_string()}),
                ));
                (false, Value::Null)
            }
        };
        (handled, value, self.schedule_refresh(refreshed))
    }

    fn schedule_refresh(&mut self, ids: BTreeSet<String>) -> Vec<String> {
        let existing: Vec<String> = ids
            .into_iter()
            .filter(|id| self.arena.contains_id(id))
            .collect();
        self.stale.extend(existing.iter().cloned());
        existing
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove a node with its subtree, instances, connections and behaviors
    pub fn remove_node(&mut self, id: &str) -> bool {
        let Some(index) = self.arena.index_of(id) else {
            warn!(node_id = %id, "Cannot remove unknown node");
            return false;
        };
        let parent_id = self
            .arena
            .get(index)
            .and_then(|node| node.parent)
            .and_then(|p| self.arena.get(p))
            .map(|p| p.id.clone());

        for node in self.arena.remove_subtree(index) {
            self.runtime.remove_instance(&node.id);
            self.stale.remove(&node.id);
        }
        self.cache.retain(|i, _| self.arena.get(*i).is_some());

        if let Some(parent_id) = parent_id {
            if let Some(parent) = self.arena.index_of(&parent_id) {
                let children: Vec<String> = self
                    .arena
                    .child_nodes(parent)
                    .into_iter()
                    .filter_map(|i| self.arena.get(i).map(|n| n.id.clone()))
                    .collect();
                self.runtime
                    .update_instance(&parent_id, InstanceUpdate::default().with_children(children));
            }
        }
        debug!(node_id = %id, "Removed node");
        true
    }

    /// Tear everything down
    pub fn unmount(&mut self) {
        let ids: Vec<String> = self.arena.iter().map(|(_, node)| node.id.clone()).collect();
        for id in &ids {
            self.runtime.remove_instance(id);
        }
        self.arena.clear();
        self.cache.clear();
        self.stale.clear();
        self.layout = None;
        self.theme = None;
        self.pending_connections.clear();
        self.auto_connect_pending = false;
        info!(nodes = ids.len(), "Unmounted tree");
    }

    /// Drop arena and cache but keep runtime instances
    pub(crate) fn reset_tree(&mut self) {
        self.arena.clear();
        self.cache.clear();
        self.stale.clear();
    }

    pub(crate) fn finish_mount(&mut self) {
        self.queue_for_resolution();
    }
}

/// Id for a node declared without one, stable for a given tree position
pub(crate) fn auto_id(parent_id: Option<&str>, position: usize, tag: &str) -> String {
    format!("{}/{}-{}", parent_id.unwrap_or("root"), tag, position)
}

pub(crate) fn collect_ids(spec: &NodeSpec, parent_id: Option<&str>, position: usize, out: &mut Vec<String>) {
    let id = spec
        .id
        .clone()
        .unwrap_or_else(|| auto_id(parent_id, position, &spec.type_tag));
    for (position, child) in spec.children.iter().enumerate() {
        if let ChildSpec::Node(child) = child {
            collect_ids(child, Some(&id), position, out);
        }
    }
    out.push(id);
}

fn compile_all(
    node_id: &str,
    code: &std::collections::BTreeMap<String, CodeSpec>,
) -> HashMap<String, CompiledCode> {
    code.iter()
        .map(|(name, spec)| {
            let handler = match compile_handler(spec.code()) {
                Ok(handler) => Some(handler),
                Err(e) => {
                    warn!(node_id = %node_id, handler = %name, error = %e, "Handler code did not compile, using a no-op");
                    None
                }
            };
            let compiled = CompiledCode {
                source: spec.code().to_string(),
                handler,
                affected: spec.affected_components().to_vec(),
            };
            (name.clone(), compiled)
        })
        .collect()
}

/// `onClick` -> `click`, `onValueChange` -> `valueChange`; other names pass
pub fn point_for_event(event: &str) -> String {
    match event.strip_prefix("on") {
        Some(rest) if rest.chars().next().is_some_and(char::is_uppercase) => {
            let mut chars = rest.chars();
            chars
                .next()
                .map(|first| first.to_lowercase().chain(chars).collect())
                .unwrap_or_default()
        }
        _ => event.to_string(),
    }
}

/// Handler keys an event may be declared under
fn event_names(event: &str) -> [String; 2] {
    let point = point_for_event(event);
    let mut chars = point.chars();
    let handler_key = chars
        .next()
        .map(|first| format!("on{}{}", first.to_uppercase(), chars.as_str()))
        .unwrap_or_default();
    [event.to_string(), handler_key]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("onClick", "click" ; "on prefix")]
    #[test_case("onValueChange", "valueChange" ; "camel case")]
    #[test_case("click", "click" ; "bare name")]
    #[test_case("online", "online" ; "lowercase after on")]
    fn test_point_for_event(event: &str, point: &str) {
        assert_eq!(point_for_event(event), point);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_names("click"), ["click".to_string(), "onClick".to_string()]);
        assert_eq!(event_names("onClick"), ["onClick".to_string(), "onClick".to_string()]);
    }

    #[test]
    fn test_auto_ids_are_positional() {
        let spec = NodeSpec::new("container")
            .with_child(NodeSpec::new("text"))
            .with_child(NodeSpec::new("text").with_id("named"));
        let mut ids = Vec::new();
        collect_ids(&spec, None, 0, &mut ids);
        assert_eq!(
            ids,
            vec!["root/container-0/text-0", "named", "root/container-0"]
        );
    }

    #[test]
    fn test_loading_nodes_reject_events() {
        let mut interp = TreeInterpreter::default();
        interp
            .mount(NodeSpec::new("button").with_id("b1").with_event("onClick", "1"))
            .unwrap();

        assert_eq!(interp.status("b1").map(NodeStatus::name), Some("loading"));
        let err = interp.dispatch_event("b1", "onClick", Value::Null).unwrap_err();
        assert!(matches!(err, InterpretError::NotReady { status: "loading", .. }));
        assert!(interp.markup().contains("<loading id=\"b1\""));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut interp = TreeInterpreter::default();
        let spec = NodeSpec::new("container")
            .with_child(NodeSpec::new("text").with_id("x"))
            .with_child(NodeSpec::new("text").with_id("x"));
        assert!(matches!(interp.mount(spec), Err(InterpretError::DuplicateId(id)) if id == "x"));
        assert!(interp.arena().is_empty());
    }
}
