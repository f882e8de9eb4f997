//! Connection graph
//!
//! Directed edges between `(component, point)` endpoints. Edges are kept in
//! registration order so one emission reaches its targets deterministically.
//! Propagation is single-hop: it writes into the target's state and stops.
//! Continuing a chain is up to whoever reacts to the delivered value.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::instance::InstanceStore;
use crate::transform::Transform;

/// One end of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub component: String,
    pub point: String,
}

impl Endpoint {
    pub fn new(component: impl Into<String>, point: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            point: point.into(),
        }
    }
}

/// Directed edge from a source point to a target point
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: String,
    pub source: Endpoint,
    pub target: Endpoint,
    pub transform: Option<Transform>,
}

impl Connection {
    /// Value the target receives for `value`
    pub fn carry(&self, value: &Value) -> Value {
        match &self.transform {
            Some(transform) => transform.apply(value),
            None => value.clone(),
        }
    }
}

/// A value written to a target during propagation
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub connection_id: String,
    pub target: Endpoint,
    pub value: Value,
}

/// Registry of connections
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: BTreeMap<u64, Connection>,
    by_id: HashMap<String, u64>,
    next_seq: u64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge and return its id
    ///
    /// Endpoints are not checked here; an edge whose component does not
    /// exist is simply inert during propagation.
    pub fn connect(
        &mut self,
        source_id: &str,
        source_point: &str,
        target_id: &str,
        target_point: &str,
        transform: Option<Transform>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let seq = self.next_seq;
        self.next_seq += 1;

        debug!(
            connection_id = %id,
            source = %format!("{source_id}.{source_point}"),
            target = %format!("{target_id}.{target_point}"),
            transform = transform.as_ref().map(Transform::name).unwrap_or("identity"),
            "Created connection"
        );

        self.connections.insert(
            seq,
            Connection {
                id: id.clone(),
                source: Endpoint::new(source_id, source_point),
                target: Endpoint::new(target_id, target_point),
                transform,
            },
        );
        self.by_id.insert(id.clone(), seq);
        id
    }

    pub fn remove_connection(&mut self, id: &str) -> bool {
        match self.by_id.remove(id) {
            Some(seq) => {
                self.connections.remove(&seq);
                debug!(connection_id = %id, "Removed connection");
                true
            }
            None => {
                warn!(connection_id = %id, "Removal of unknown connection ignored");
                false
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Connection> {
        self.by_id.get(id).and_then(|seq| self.connections.get(seq))
    }

    /// Connections leaving `component`, optionally only from `point`
    pub fn outgoing<'a>(
        &'a self,
        component: &'a str,
        point: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.values().filter(move |c| {
            c.source.component == component && point.map_or(true, |p| c.source.point == p)
        })
    }

    /// Connections arriving at `component`, optionally only at `point`
    pub fn incoming<'a>(
        &'a self,
        component: &'a str,
        point: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.values().filter(move |c| {
            c.target.component == component && point.map_or(true, |p| c.target.point == p)
        })
    }

    /// Every connection, in registration order
    pub fn all_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Is there already an edge between these exact endpoints
    pub fn exists(&self, source: &Endpoint, target: &Endpoint) -> bool {
        self.connections
            .values()
            .any(|c| &c.source == source && &c.target == target)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Remove every connection touching `component`; returns how many
    pub fn remove_connections_for(&mut self, component: &str) -> usize {
        let doomed: Vec<u64> = self
            .connections
            .iter()
            .filter(|(_, c)| c.source.component == component || c.target.component == component)
            .map(|(seq, _)| *seq)
            .collect();

        for seq in &doomed {
            if let Some(connection) = self.connections.remove(seq) {
                self.by_id.remove(&connection.id);
            }
        }
        if !doomed.is_empty() {
            debug!(component_id = %component, removed = doomed.len(), "Swept connections");
        }
        doomed.len()
    }

    /// Deliver `value` emitted on `component.point` along every outgoing edge
    ///
    /// Each target gets the transformed value in `state[target_point]`.
    /// Edges whose target instance is gone are skipped with a warning.
    pub fn propagate(
        &self,
        component: &str,
        point: &str,
        value: &Value,
        store: &mut InstanceStore,
    ) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for connection in self.outgoing(component, Some(point)) {
            if !store.contains(&connection.target.component) {
                warn!(
                    connection_id = %connection.id,
                    target = %connection.target.component,
                    "Connection target does not exist, skipping"
                );
                continue;
            }
            let carried = connection.carry(value);
            trace!(connection_id = %connection.id, value = %carried, "Propagating value");
            store.set_state_value(
                &connection.target.component,
                &connection.target.point,
                carried.clone(),
            );
            deliveries.push(Delivery {
                connection_id: connection.id.clone(),
                target: connection.target.clone(),
                value: carried,
            });
        }
        deliveries
    }

    pub fn clear(&mut self) {
        self.connections.clear();
        self.by_id.clear();
    }
}
