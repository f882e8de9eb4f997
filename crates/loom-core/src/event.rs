//! Runtime events
//!
//! Every notable runtime action is recorded as an immutable [`Event`] in a
//! bounded history. Observers subscribe with a kind filter and are called
//! synchronously, in subscription order, as events are recorded.
//!
//! Uses a `VecDeque` so the oldest event can be dropped in O(1) once the
//! history is full.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use tracing::trace;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    ComponentRegistered,
    InstanceCreated,
    InstanceUpdated,
    InstanceRemoved,
    ConnectionCreated,
    ConnectionRemoved,
    ConnectionDataSent,
    ConnectionDataReceived,
    BehaviorApplied,
    BehaviorRemoved,
    UserAction,
    MethodInvoked,
    HandlerFailed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Immutable record of one runtime action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub component_id: String,
    pub connection_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

impl Event {
    pub fn new(kind: EventKind, component_id: impl Into<String>, payload: Value) -> Self {
        Self {
            kind,
            component_id: component_id.into(),
            connection_id: None,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn with_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }
}

/// Handle returned by [`EventLog::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&Event) + Send>;

struct Subscription {
    id: SubscriptionId,
    /// `None` observes every kind
    kinds: Option<Vec<EventKind>>,
    observer: Observer,
}

/// Bounded event history with observers
pub struct EventLog {
    history: VecDeque<Event>,
    capacity: usize,
    subscriptions: Vec<Subscription>,
    next_subscription: u64,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.history.len())
            .field("capacity", &self.capacity)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl EventLog {
    /// A zero capacity is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            subscriptions: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn record(&mut self, event: Event) {
        trace!(kind = %event.kind, component_id = %event.component_id, "Event");
        for subscription in &mut self.subscriptions {
            let wanted = subscription
                .kinds
                .as_ref()
                .map_or(true, |kinds| kinds.contains(&event.kind));
            if wanted {
                (subscription.observer)(&event);
            }
        }
        if self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }

    /// Observe events of the given kinds (all kinds when empty)
    pub fn subscribe<F>(&mut self, kinds: &[EventKind], observer: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.push(Subscription {
            id,
            kinds: (!kinds.is_empty()).then(|| kinds.to_vec()),
            observer: Box::new(observer),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Oldest first
    pub fn history(&self) -> impl Iterator<Item = &Event> {
        self.history.iter()
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.history.iter().filter(move |e| e.kind == kind)
    }

    pub fn last(&self) -> Option<&Event> {
        self.history.back()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_history_drops_oldest() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.record(Event::new(EventKind::UserAction, format!("c{i}"), json!(i)));
        }
        let ids: Vec<_> = log.history().map(|e| e.component_id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c3", "c4"]);
    }

    #[test]
    fn test_subscription_filter() {
        let mut log = EventLog::new(10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        log.subscribe(&[EventKind::ConnectionDataReceived], move |e| {
            sink.lock().unwrap().push(e.component_id.clone());
        });

        log.record(Event::new(EventKind::UserAction, "b1", json!(null)));
        log.record(Event::new(EventKind::ConnectionDataReceived, "t1", json!("x")));

        assert_eq!(*seen.lock().unwrap(), vec!["t1".to_string()]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut log = EventLog::new(10);
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let id = log.subscribe(&[], move |_| *sink.lock().unwrap() += 1);

        log.record(Event::new(EventKind::UserAction, "b1", json!(null)));
        assert!(log.unsubscribe(id));
        assert!(!log.unsubscribe(id));
        log.record(Event::new(EventKind::UserAction, "b1", json!(null)));

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut log = EventLog::new(0);
        log.record(Event::new(EventKind::UserAction, "a", json!(null)));
        log.record(Event::new(EventKind::UserAction, "b", json!(null)));
        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().component_id, "b");
    }
}
