//! View binding
//!
//! The seam through which handlers and behaviors touch a widget's
//! properties and presentation. The default implementation funnels every
//! call into the [`InstanceStore`], so the usual revision bump makes the
//! interpreter re-render. Unknown ids are soft failures (`None`/`false`).

use serde_json::Value;

use crate::instance::InstanceStore;
use crate::types::PropertyMap;

/// Property and presentation access by element id
pub trait ViewBinding {
    /// Effective property: a connection-driven state value wins over the
    /// declared property of the same name
    fn property(&self, id: &str, key: &str) -> Option<Value>;

    /// Set a property; the latest write wins over connection-driven state
    fn set_property(&mut self, id: &str, key: &str, value: Value) -> bool;

    fn state_value(&self, id: &str, key: &str) -> Option<Value>;

    fn style(&self, id: &str, property: &str) -> Option<Value>;

    /// Set a style; `null` clears it
    fn set_style(&mut self, id: &str, property: &str, value: Value) -> bool;

    fn add_class(&mut self, id: &str, class: &str) -> bool;

    fn remove_class(&mut self, id: &str, class: &str) -> bool;

    fn set_hidden(&mut self, id: &str, hidden: bool) -> bool;

    fn is_hidden(&self, id: &str) -> Option<bool>;

    /// All effective properties of an element
    fn properties(&self, id: &str) -> Option<PropertyMap>;
}

impl ViewBinding for InstanceStore {
    fn property(&self, id: &str, key: &str) -> Option<Value> {
        InstanceStore::state_value(self, id, key)
            .or_else(|| InstanceStore::property(self, id, key))
            .cloned()
    }

    fn set_property(&mut self, id: &str, key: &str, value: Value) -> bool {
        let written = InstanceStore::set_property(self, id, key, value);
        if written {
            self.remove_state_value(id, key);
        }
        written
    }

    fn state_value(&self, id: &str, key: &str) -> Option<Value> {
        InstanceStore::state_value(self, id, key).cloned()
    }

    fn style(&self, id: &str, property: &str) -> Option<Value> {
        self.get_instance(id)?
            .presentation
            .styles
            .get(property)
            .cloned()
    }

    fn set_style(&mut self, id: &str, property: &str, value: Value) -> bool {
        InstanceStore::set_style(self, id, property, value)
    }

    fn add_class(&mut self, id: &str, class: &str) -> bool {
        InstanceStore::add_class(self, id, class)
    }

    fn remove_class(&mut self, id: &str, class: &str) -> bool {
        InstanceStore::remove_class(self, id, class)
    }

    fn set_hidden(&mut self, id: &str, hidden: bool) -> bool {
        InstanceStore::set_hidden(self, id, hidden)
    }

    fn is_hidden(&self, id: &str) -> Option<bool> {
        self.get_instance(id).map(|i| i.presentation.hidden)
    }

    fn properties(&self, id: &str) -> Option<PropertyMap> {
        let instance = self.get_instance(id)?;
        let mut merged = instance.properties.clone();
        for (key, value) in &instance.state {
            merged.insert(key.clone(), value.clone());
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::ComponentInstance;
    use crate::kind::WidgetKind;
    use serde_json::json;

    fn store() -> InstanceStore {
        let mut props = PropertyMap::new();
        props.insert("text".into(), json!("Hello"));
        let mut store = InstanceStore::new();
        store.register_instance(ComponentInstance::new("t1", WidgetKind::Text, props));
        store
    }

    #[test]
    fn test_state_shadows_property() {
        let mut store = store();
        store.set_state_value("t1", "text", json!("from connection"));
        assert_eq!(
            ViewBinding::property(&store, "t1", "text"),
            Some(json!("from connection"))
        );
    }

    #[test]
    fn test_set_property_wins_over_state() {
        let mut store = store();
        store.set_state_value("t1", "text", json!("from connection"));
        assert!(ViewBinding::set_property(&mut store, "t1", "text", json!("typed")));
        assert_eq!(ViewBinding::property(&store, "t1", "text"), Some(json!("typed")));
    }

    #[test]
    fn test_presentation_calls() {
        let mut store = store();
        let binding: &mut dyn ViewBinding = &mut store;
        assert!(binding.add_class("t1", "active"));
        assert!(binding.set_hidden("t1", true));
        assert!(binding.set_style("t1", "color", json!("blue")));
        assert_eq!(binding.is_hidden("t1"), Some(true));
        assert_eq!(binding.style("t1", "color"), Some(json!("blue")));
        assert!(!binding.add_class("ghost", "active"));
    }
}
