//! Application trees
//!
//! An application is a list of top-level nodes placed into layout regions,
//! plus connections declared between node ids. Declared connections wait
//! until both endpoints have resolved; auto-connect, when enabled, runs once
//! the whole application is resolved.
//!
//! Replacing a tree reconciles by id: surviving instances keep their state,
//! connections and behaviors, and only receive the declared properties
//! that changed.

use std::collections::HashMap;

use loom_core::{Endpoint, PropertyMap, Transform, ViewBinding, WidgetKind};
use loom_script::compile_transform;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::arena::{NodeIndex, NodeStatus};
use crate::error::InterpretResult;
use crate::interpreter::{auto_id, TreeInterpreter};
use crate::schema::{AppSpec, ChildSpec, ConnectionSpec, LayoutSpec, NodeSpec};

impl TreeInterpreter {
    /// Mount an application's components and queue its connections
    pub fn mount_app(&mut self, app: AppSpec) -> InterpretResult<Vec<NodeIndex>> {
        let first = self.arena.roots().len();
        self.check_ids(&app.components, first, true)?;

        let AppSpec {
            layout,
            components,
            theme,
            connections,
            ..
        } = app;
        self.set_layout(layout);
        if theme.is_some() {
            self.theme = theme;
        }
        self.pending_connections.extend(connections);
        self.auto_connect_pending |= self.runtime.config().auto_connect.enabled;

        let indices = components
            .into_iter()
            .enumerate()
            .map(|(i, spec)| self.insert_node(spec, None, None, first + i))
            .collect();
        self.finish_mount();
        info!(roots = self.arena.roots().len(), nodes = self.arena.len(), "Mounted application");
        Ok(indices)
    }

    /// Mount and resolve an application
    pub async fn load_app(&mut self, app: AppSpec) -> InterpretResult<Vec<NodeIndex>> {
        let indices = self.mount_app(app)?;
        self.resolve().await;
        Ok(indices)
    }

    pub fn layout(&self) -> Option<&LayoutSpec> {
        self.layout.as_ref()
    }

    pub fn theme(&self) -> Option<&Value> {
        self.theme.as_ref()
    }

    /// Declared connections still waiting for an endpoint to resolve
    pub fn pending_connections(&self) -> &[ConnectionSpec] {
        &self.pending_connections
    }

    fn set_layout(&mut self, layout: LayoutSpec) {
        self.layout = if layout.regions.is_empty() {
            None
        } else {
            Some(layout)
        };
    }

    /// Replace the mounted tree with `spec`, keeping instances whose id and
    /// kind survive
    pub fn replace_tree(&mut self, spec: NodeSpec) -> InterpretResult<NodeIndex> {
        let specs = [spec];
        self.check_ids(&specs, 0, false)?;
        self.reconcile(&specs);
        self.reset_tree();

        let [spec] = specs;
        let index = self.insert_node(spec, None, None, 0);
        self.finish_mount();
        Ok(index)
    }

    /// Replace the whole application, reconciling components by id
    pub fn replace_app(&mut self, app: AppSpec) -> InterpretResult<Vec<NodeIndex>> {
        self.check_ids(&app.components, 0, false)?;
        self.reconcile(&app.components);
        self.reset_tree();
        self.pending_connections.clear();
        self.layout = None;
        self.mount_app(app)
    }

    /// Drop instances that disappear or change kind and push changed
    /// declarations into the survivors
    fn reconcile(&mut self, specs: &[NodeSpec]) {
        let mut incoming = HashMap::new();
        for (position, spec) in specs.iter().enumerate() {
            self.flatten(spec, None, position, &mut incoming);
        }

        let mounted: Vec<(String, WidgetKind, PropertyMap)> = self
            .arena
            .iter()
            .map(|(_, node)| (node.id.clone(), node.kind.clone(), node.declared.clone()))
            .collect();

        let mut removed = 0;
        let mut updated = 0;
        for (id, kind, declared) in mounted {
            match incoming.get(&id) {
                Some((new_kind, new_props)) if *new_kind == kind => {
                    for (key, value) in new_props {
                        if declared.get(key) != Some(value)
                            && self.runtime.set_property(&id, key, value.clone())
                        {
                            updated += 1;
                        }
                    }
                }
                _ => {
                    if self.runtime.remove_instance(&id).is_some() {
                        removed += 1;
                    }
                }
            }
        }
        debug!(removed, updated, "Reconciled tree");
    }

    fn flatten(
        &self,
        spec: &NodeSpec,
        parent_id: Option<&str>,
        position: usize,
        out: &mut HashMap<String, (WidgetKind, PropertyMap)>,
    ) {
        let id = spec
            .id
            .clone()
            .unwrap_or_else(|| auto_id(parent_id, position, &spec.type_tag));
        for (position, child) in spec.children.iter().enumerate() {
            if let ChildSpec::Node(child) = child {
                self.flatten(child, Some(&id), position, out);
            }
        }
        out.insert(
            id,
            (self.runtime.kind_of(&spec.type_tag), spec.properties.clone()),
        );
    }

    fn awaiting(&self, id: &str) -> bool {
        matches!(
            self.status(id),
            Some(NodeStatus::Loading | NodeStatus::Unresolved)
        )
    }

    /// Create declared connections whose endpoints are ready, then run
    /// auto-connect once nothing is left to resolve
    pub(crate) fn wire_pending(&mut self) {
        let max_steps = self.runtime.config().script.max_steps;
        let pending = std::mem::take(&mut self.pending_connections);

        for spec in pending {
            if self.awaiting(&spec.source_id) || self.awaiting(&spec.target_id) {
                self.pending_connections.push(spec);
                continue;
            }
            let source = Endpoint::new(&spec.source_id, &spec.source_point);
            let target = Endpoint::new(&spec.target_id, &spec.target_point);
            if self.runtime.connections().exists(&source, &target) {
                debug!(source = %spec.source_id, target = %spec.target_id, "Connection already wired");
                continue;
            }

            let transform = spec
                .transformer_name
                .as_deref()
                .and_then(|name| transform_for(name, max_steps));
            match self.runtime.connect(
                &spec.source_id,
                &spec.source_point,
                &spec.target_id,
                &spec.target_point,
                transform,
            ) {
                Ok(id) => debug!(connection_id = %id, "Wired declared connection"),
                Err(e) => warn!(
                    source = %spec.source_id,
                    target = %spec.target_id,
                    error = %e,
                    "Declared connection dropped"
                ),
            }
        }

        let loading = self
            .arena
            .iter()
            .any(|(_, node)| matches!(node.status, NodeStatus::Loading | NodeStatus::Unresolved));
        if self.auto_connect_pending && !loading {
            self.auto_connect_pending = false;
            let ids: Vec<String> = self
                .arena
                .iter()
                .filter(|(_, node)| node.status.is_ready())
                .map(|(_, node)| node.id.clone())
                .collect();
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            self.runtime.apply_auto_connect(&ids);
        }
    }
}

/// A library transform by name, else the name compiled as handler code
fn transform_for(name: &str, max_steps: usize) -> Option<Transform> {
    if let Some(transform) = Transform::builtin(name) {
        return Some(transform);
    }
    match compile_transform(name, max_steps) {
        Ok(transform) => Some(transform),
        Err(e) => {
            warn!(transform = %name, error = %e, "Unknown transform, using identity");
            None
        }
    }
}
