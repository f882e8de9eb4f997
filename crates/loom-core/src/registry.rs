//! Type registry
//!
//! Maps a [`WidgetKind`] to its [`ComponentDefinition`]. Registration stays
//! open for the lifetime of the runtime: hosts add definitions while trees
//! are mounted. Re-registering a kind overwrites
//! the previous definition and logs a warning.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::definition::ComponentDefinition;
use crate::instance::InstanceStore;
use crate::kind::WidgetKind;
use crate::types::PropertyMap;

/// Where type resolution reads component definitions from
///
/// Definitions are handed out as shared `Arc`s so a mounted node can keep
/// its definition after the source changes.
pub trait DefinitionLookup: Send + Sync {
    /// Definition stored for `kind`
    fn definition(&self, kind: &WidgetKind) -> Option<Arc<ComponentDefinition>>;

    /// Known kinds, sorted by tag
    fn kinds(&self) -> Vec<WidgetKind>;

    fn knows(&self, kind: &WidgetKind) -> bool {
        self.definition(kind).is_some()
    }
}

/// Registry of widget definitions
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    definitions: HashMap<WidgetKind, Arc<ComponentDefinition>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition under its kind; returns the replaced one
    pub fn register(&mut self, definition: ComponentDefinition) -> Option<Arc<ComponentDefinition>> {
        let kind = definition.kind.clone();
        let previous = self.definitions.insert(kind.clone(), Arc::new(definition));
        if previous.is_some() {
            warn!(kind = %kind, "Component type already registered, overwriting");
        } else {
            debug!(kind = %kind, "Registered component type");
        }
        previous
    }

    pub fn get(&self, kind: &WidgetKind) -> Option<&Arc<ComponentDefinition>> {
        self.definitions.get(kind)
    }

    pub fn contains(&self, kind: &WidgetKind) -> bool {
        self.definitions.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Create and store an instance of `kind`
    ///
    /// Definition defaults sit under `props`. Returns the new instance id, or
    /// `None` (nothing stored) when the kind is not registered.
    pub fn instantiate(
        &self,
        kind: &WidgetKind,
        id: &str,
        props: PropertyMap,
        store: &mut InstanceStore,
    ) -> Option<String> {
        let Some(definition) = self.definitions.get(kind) else {
            warn!(kind = %kind, component_id = %id, "Cannot instantiate unregistered type");
            return None;
        };

        let mut merged = definition.default_props.clone();
        for (key, value) in props {
            merged.insert(key, value);
        }

        let instance = definition.instantiate(id, merged);
        let instance_id = instance.id.clone();
        store.register_instance(instance);
        Some(instance_id)
    }
}

impl DefinitionLookup for TypeRegistry {
    fn definition(&self, kind: &WidgetKind) -> Option<Arc<ComponentDefinition>> {
        self.definitions.get(kind).cloned()
    }

    fn kinds(&self) -> Vec<WidgetKind> {
        let mut kinds: Vec<_> = self.definitions.keys().cloned().collect();
        kinds.sort_by(|a, b| a.as_tag().cmp(b.as_tag()));
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_get() {
        let mut registry = TypeRegistry::new();
        assert!(registry.is_empty());
        registry.register(ComponentDefinition::new("button"));

        assert!(registry.contains(&WidgetKind::Button));
        assert_eq!(registry.get(&WidgetKind::Button).unwrap().kind, WidgetKind::Button);
        assert!(registry.get(&WidgetKind::Text).is_none());
    }

    #[test]
    fn test_lookup_through_trait_object() {
        let mut registry = TypeRegistry::new();
        registry.register(ComponentDefinition::new("text"));
        registry.register(ComponentDefinition::new("button"));
        registry.register(ComponentDefinition::new("Gauge"));

        let lookup: &dyn DefinitionLookup = &registry;
        assert!(lookup.knows(&WidgetKind::Text));
        assert!(!lookup.knows(&WidgetKind::Card));
        assert_eq!(
            lookup.kinds(),
            vec![WidgetKind::Other("Gauge".into()), WidgetKind::Button, WidgetKind::Text]
        );
        let shared = lookup.definition(&WidgetKind::Button).unwrap();
        assert!(Arc::ptr_eq(&shared, registry.get(&WidgetKind::Button).unwrap()));
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut registry = TypeRegistry::new();
        registry.register(ComponentDefinition::new("button").with_default("label", json!("one")));
        let previous =
            registry.register(ComponentDefinition::new("button").with_default("label", json!("two")));

        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
        let def = registry.get(&WidgetKind::Button).unwrap();
        assert_eq!(def.default_props.get("label"), Some(&json!("two")));
    }

    #[test]
    fn test_instantiate_merges_defaults_under_props() {
        let mut registry = TypeRegistry::new();
        registry.register(
            ComponentDefinition::new("button")
                .with_default("label", json!("Button"))
                .with_default("variant", json!("primary")),
        );
        let mut store = InstanceStore::new();
        let mut props = PropertyMap::new();
        props.insert("label".into(), json!("Go"));

        let id = registry.instantiate(&WidgetKind::Button, "b1", props, &mut store);
        assert_eq!(id.as_deref(), Some("b1"));
        let instance = store.get_instance("b1").unwrap();
        assert_eq!(instance.properties.get("label"), Some(&json!("Go")));
        assert_eq!(instance.properties.get("variant"), Some(&json!("primary")));
    }

    #[test]
    fn test_instantiate_unknown_kind_creates_nothing() {
        let registry = TypeRegistry::new();
        let mut store = InstanceStore::new();
        let kind = WidgetKind::from_tag("frobnicator");
        assert!(registry
            .instantiate(&kind, "f1", PropertyMap::new(), &mut store)
            .is_none());
        assert!(store.is_empty());
    }
}
