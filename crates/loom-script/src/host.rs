//! What handler code is allowed to reach
//!
//! Everything a handler does to the outside world goes through a
//! [`ScriptHost`]: selecting components, the [`ViewBinding`] calls behind
//! handle methods, emitting on points and `console.log`.

use loom_core::{PropertyMap, Runtime, ViewBinding};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Parsed argument of `accessor(selector)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `"self"` or `"this"`
    SelfRef,
    /// `"#id"`
    Id(String),
    /// `".class"`
    Class(String),
    /// A widget tag such as `"button"`; aliases apply
    Tag(String),
}

impl Selector {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "self" | "this" => Selector::SelfRef,
            _ => {
                if let Some(id) = raw.strip_prefix('#') {
                    Selector::Id(id.to_string())
                } else if let Some(class) = raw.strip_prefix('.') {
                    Selector::Class(class.to_string())
                } else {
                    Selector::Tag(raw.to_string())
                }
            }
        }
    }
}

pub trait ScriptHost: ViewBinding {
    /// Component ids matching a selector, in a stable order
    ///
    /// `SelfRef` is resolved by the evaluator and never reaches the host.
    fn select(&self, selector: &Selector) -> Vec<String>;

    /// Emit `value` on `point` of `component`
    fn emit(&mut self, component: &str, point: &str, value: Value);

    fn log(&mut self, message: &str) {
        info!(target: "loom_script::console", "{}", message);
    }
}

/// Host with no components; used for custom transforms
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl ViewBinding for NullHost {
    fn property(&self, _id: &str, _key: &str) -> Option<Value> {
        None
    }

    fn set_property(&mut self, _id: &str, _key: &str, _value: Value) -> bool {
        false
    }

    fn state_value(&self, _id: &str, _key: &str) -> Option<Value> {
        None
    }

    fn style(&self, _id: &str, _property: &str) -> Option<Value> {
        None
    }

    fn set_style(&mut self, _id: &str, _property: &str, _value: Value) -> bool {
        false
    }

    fn add_class(&mut self, _id: &str, _class: &str) -> bool {
        false
    }

    fn remove_class(&mut self, _id: &str, _class: &str) -> bool {
        false
    }

    fn set_hidden(&mut self, _id: &str, _hidden: bool) -> bool {
        false
    }

    fn is_hidden(&self, _id: &str) -> Option<bool> {
        None
    }

    fn properties(&self, _id: &str) -> Option<PropertyMap> {
        None
    }
}

impl ScriptHost for NullHost {
    fn select(&self, _selector: &Selector) -> Vec<String> {
        Vec::new()
    }

    fn emit(&mut self, component: &str, point: &str, _value: Value) {
        debug!(component, point, "Emit from a host-less script ignored");
    }
}

impl ScriptHost for Runtime {
    fn select(&self, selector: &Selector) -> Vec<String> {
        let instances = self.instances();
        match selector {
            Selector::SelfRef => Vec::new(),
            Selector::Id(id) => {
                if instances.contains(id) {
                    vec![id.clone()]
                } else {
                    Vec::new()
                }
            }
            Selector::Class(class) => instances
                .all_instances()
                .filter(|i| i.presentation.classes.contains(class))
                .map(|i| i.id.clone())
                .collect(),
            Selector::Tag(tag) => {
                let kind = self.kind_of(tag);
                instances
                    .all_instances()
                    .filter(|i| i.kind == kind)
                    .map(|i| i.id.clone())
                    .collect()
            }
        }
    }

    fn emit(&mut self, component: &str, point: &str, value: Value) {
        if let Err(e) = Runtime::emit(self, component, point, value) {
            warn!(component, point, error = %e, "Handler emit failed");
        }
    }
}
