//! Instance store
//!
//! Owns every live [`ComponentInstance`]. The interpreter, connections and
//! behaviors only request mutations through the store; each mutation bumps
//! the instance `revision`, which is what drives re-rendering.
//!
//! Missing ids are never an error here: updates and removals of unknown ids
//! log a warning and return `None`/`false`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::kind::WidgetKind;
use crate::types::{deep_merge, PropertyMap};

/// Presentation state a view binding can change directly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    pub styles: PropertyMap,
    pub classes: BTreeSet<String>,
    pub hidden: bool,
}

/// Live runtime record for one widget in the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    /// Declared configuration, updated by handlers and behaviors
    pub properties: PropertyMap,
    /// Runtime values, including values delivered by connections
    pub state: PropertyMap,
    pub presentation: Presentation,
    pub parent: Option<String>,
    pub children: Vec<String>,
    /// Store clock value of the last mutation
    pub revision: u64,
}

impl ComponentInstance {
    pub fn new(id: impl Into<String>, kind: WidgetKind, properties: PropertyMap) -> Self {
        Self {
            id: id.into(),
            kind,
            properties,
            state: PropertyMap::new(),
            presentation: Presentation::default(),
            parent: None,
            children: Vec::new(),
            revision: 0,
        }
    }
}

/// Partial update for [`InstanceStore::update_instance`]
///
/// `state` is deep-merged; the other fields replace the current value.
/// `id` and `kind` are accepted only so callers can be told they are ignored.
#[derive(Debug, Clone, Default)]
pub struct InstanceUpdate {
    pub id: Option<String>,
    pub kind: Option<WidgetKind>,
    pub properties: Option<PropertyMap>,
    pub state: Option<PropertyMap>,
    pub presentation: Option<Presentation>,
    pub parent: Option<Option<String>>,
    pub children: Option<Vec<String>>,
}

impl InstanceUpdate {
    pub fn state(state: PropertyMap) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn properties(properties: PropertyMap) -> Self {
        Self {
            properties: Some(properties),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: PropertyMap) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_children(mut self, children: Vec<String>) -> Self {
        self.children = Some(children);
        self
    }
}

/// Store of live instances keyed by id
#[derive(Debug, Default)]
pub struct InstanceStore {
    instances: BTreeMap<String, ComponentInstance>,
    clock: u64,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Store an instance, overwriting (with a warning) any previous one
    pub fn register_instance(&mut self, mut instance: ComponentInstance) -> Option<ComponentInstance> {
        instance.revision = self.tick();
        let id = instance.id.clone();
        let previous = self.instances.insert(id.clone(), instance);
        if previous.is_some() {
            warn!(component_id = %id, "Instance already registered, overwriting");
        } else {
            debug!(component_id = %id, "Registered instance");
        }
        previous
    }

    pub fn get_instance(&self, id: &str) -> Option<&ComponentInstance> {
        self.instances.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn all_instances(&self) -> impl Iterator<Item = &ComponentInstance> {
        self.instances.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn revision(&self, id: &str) -> Option<u64> {
        self.instances.get(id).map(|i| i.revision)
    }

    /// Apply a partial update
    pub fn update_instance(&mut self, id: &str, update: InstanceUpdate) -> Option<&ComponentInstance> {
        if !self.instances.contains_key(id) {
            warn!(component_id = %id, "Update of unknown instance ignored");
            return None;
        }
        let revision = self.tick();
        let instance = self.instances.get_mut(id)?;

        if update.id.as_deref().is_some_and(|new_id| new_id != instance.id) {
            warn!(component_id = %id, "Instance id is immutable, ignoring change");
        }
        if update.kind.as_ref().is_some_and(|kind| *kind != instance.kind) {
            warn!(component_id = %id, "Instance type is immutable, ignoring change");
        }
        if let Some(state) = update.state {
            deep_merge(&mut instance.state, &state);
        }
        if let Some(properties) = update.properties {
            instance.properties = properties;
        }
        if let Some(presentation) = update.presentation {
            instance.presentation = presentation;
        }
        if let Some(parent) = update.parent {
            instance.parent = parent;
        }
        if let Some(children) = update.children {
            instance.children = children;
        }
        instance.revision = revision;
        Some(instance)
    }

    /// Remove an instance, returning it
    pub fn remove_instance(&mut self, id: &str) -> Option<ComponentInstance> {
        let removed = self.instances.remove(id);
        match &removed {
            Some(_) => debug!(component_id = %id, "Removed instance"),
            None => warn!(component_id = %id, "Removal of unknown instance ignored"),
        }
        removed
    }

    /// Run `f` on an instance and bump its revision
    fn mutate(&mut self, id: &str, what: &str, f: impl FnOnce(&mut ComponentInstance)) -> bool {
        if !self.instances.contains_key(id) {
            warn!(component_id = %id, operation = what, "Mutation of unknown instance ignored");
            return false;
        }
        let revision = self.tick();
        if let Some(instance) = self.instances.get_mut(id) {
            f(instance);
            instance.revision = revision;
        }
        true
    }

    pub fn property(&self, id: &str, key: &str) -> Option<&Value> {
        self.instances.get(id)?.properties.get(key)
    }

    pub fn state_value(&self, id: &str, key: &str) -> Option<&Value> {
        self.instances.get(id)?.state.get(key)
    }

    pub fn set_property(&mut self, id: &str, key: &str, value: Value) -> bool {
        self.mutate(id, "set_property", |i| {
            i.properties.insert(key.to_string(), value);
        })
    }

    /// Replace one state key
    pub fn set_state_value(&mut self, id: &str, key: &str, value: Value) -> bool {
        self.mutate(id, "set_state", |i| {
            i.state.insert(key.to_string(), value);
        })
    }

    /// Drop one state key, returning its value
    pub fn remove_state_value(&mut self, id: &str, key: &str) -> Option<Value> {
        if !self.instances.get(id)?.state.contains_key(key) {
            return None;
        }
        let revision = self.tick();
        let instance = self.instances.get_mut(id)?;
        instance.revision = revision;
        instance.state.remove(key)
    }

    pub fn set_style(&mut self, id: &str, property: &str, value: Value) -> bool {
        self.mutate(id, "set_style", |i| {
            if value.is_null() {
                i.presentation.styles.remove(property);
            } else {
                i.presentation.styles.insert(property.to_string(), value);
            }
        })
    }

    pub fn add_class(&mut self, id: &str, class: &str) -> bool {
        self.mutate(id, "add_class", |i| {
            i.presentation.classes.insert(class.to_string());
        })
    }

    pub fn remove_class(&mut self, id: &str, class: &str) -> bool {
        self.mutate(id, "remove_class", |i| {
            i.presentation.classes.remove(class);
        })
    }

    pub fn set_hidden(&mut self, id: &str, hidden: bool) -> bool {
        self.mutate(id, "set_hidden", |i| i.presentation.hidden = hidden)
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn obj(value: Value) -> PropertyMap {
        value.as_object().cloned().unwrap()
    }

    fn store_with(id: &str) -> InstanceStore {
        let mut store = InstanceStore::new();
        store.register_instance(ComponentInstance::new(id, WidgetKind::Text, PropertyMap::new()));
        store
    }

    #[test]
    fn test_state_update_merges() {
        let mut store = store_with("t1");
        store.update_instance("t1", InstanceUpdate::state(obj(json!({"a": 1, "b": 2}))));
        store.update_instance("t1", InstanceUpdate::state(obj(json!({"b": 3}))));

        let instance = store.get_instance("t1").unwrap();
        assert_eq!(instance.state, obj(json!({"a": 1, "b": 3})));
    }

    #[test]
    fn test_properties_replaced_shallowly() {
        let mut store = store_with("t1");
        store.update_instance("t1", InstanceUpdate::properties(obj(json!({"a": 1}))));
        store.update_instance("t1", InstanceUpdate::properties(obj(json!({"b": 2}))));
        assert_eq!(store.get_instance("t1").unwrap().properties, obj(json!({"b": 2})));
    }

    #[test]
    fn test_id_and_kind_are_immutable() {
        let mut store = store_with("t1");
        let update = InstanceUpdate {
            id: Some("other".into()),
            kind: Some(WidgetKind::Button),
            ..Default::default()
        };
        let instance = store.update_instance("t1", update).unwrap();
        assert_eq!(instance.id, "t1");
        assert_eq!(instance.kind, WidgetKind::Text);
        assert!(store.get_instance("other").is_none());
    }

    #[test]
    fn test_unknown_ids_are_soft_failures() {
        let mut store = InstanceStore::new();
        assert!(store.update_instance("ghost", InstanceUpdate::default()).is_none());
        assert!(store.remove_instance("ghost").is_none());
        assert!(!store.set_property("ghost", "a", json!(1)));
    }

    #[test]
    fn test_register_overwrites() {
        let mut store = store_with("t1");
        let previous = store.register_instance(ComponentInstance::new(
            "t1",
            WidgetKind::Button,
            PropertyMap::new(),
        ));
        assert!(previous.is_some());
        assert_eq!(store.get_instance("t1").unwrap().kind, WidgetKind::Button);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_revision_increases_on_mutation() {
        let mut store = store_with("t1");
        let before = store.revision("t1").unwrap();
        store.set_style("t1", "color", json!("red"));
        let after = store.revision("t1").unwrap();
        assert!(after > before);
        assert_eq!(
            store.get_instance("t1").unwrap().presentation.styles.get("color"),
            Some(&json!("red"))
        );
    }

    #[test]
    fn test_null_style_removes_entry() {
        let mut store = store_with("t1");
        store.set_style("t1", "color", json!("red"));
        store.set_style("t1", "color", Value::Null);
        assert!(store.get_instance("t1").unwrap().presentation.styles.is_empty());
    }

    proptest! {
        #[test]
        fn prop_state_update_preserves_other_keys(
            existing in prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..8),
            key in "[a-z]{1,6}",
            value in any::<i64>(),
        ) {
            let mut store = store_with("c");
            let seed: PropertyMap = existing.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            store.update_instance("c", InstanceUpdate::state(seed));

            let mut partial = PropertyMap::new();
            partial.insert(key.clone(), json!(value));
            store.update_instance("c", InstanceUpdate::state(partial));

            let state = &store.get_instance("c").unwrap().state;
            prop_assert_eq!(state.get(&key), Some(&json!(value)));
            for (k, v) in &existing {
                if *k != key {
                    prop_assert_eq!(state.get(k), Some(&json!(v)));
                }
            }
        }
    }
}
