//! Component definitions
//!
//! A definition is what the type registry stores for a widget kind: its
//! connection points, default properties and the two functions that create
//! an instance and render one.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::instance::ComponentInstance;
use crate::kind::WidgetKind;
use crate::renderable::{Element, Renderable};
use crate::types::{Capability, ConnectionPoint, PropertyMap};

/// Creates the instance record for a new node
pub type InstantiateFn =
    Arc<dyn Fn(&str, &WidgetKind, PropertyMap) -> ComponentInstance + Send + Sync>;

/// Renders an instance with its effective properties
pub type RenderFn = Arc<dyn Fn(RenderContext<'_>) -> Renderable + Send + Sync>;

/// Everything a render function sees for one node
pub struct RenderContext<'a> {
    pub instance: &'a ComponentInstance,
    /// Effective properties: defaults, then instance properties, then
    /// connection-driven values
    pub properties: PropertyMap,
    pub styles: PropertyMap,
    pub classes: Vec<String>,
    pub hidden: bool,
    pub children: Vec<Renderable>,
}

impl RenderContext<'_> {
    pub fn id(&self) -> &str {
        &self.instance.id
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Generic element carrying the node's properties, styles and children
    pub fn into_element(self, tag: impl Into<String>) -> Element {
        Element {
            id: self.instance.id.clone(),
            tag: tag.into(),
            attributes: self.properties,
            styles: self.styles,
            classes: self.classes,
            hidden: self.hidden,
            children: self.children,
        }
    }
}

/// Registered description of a widget kind
#[derive(Clone)]
pub struct ComponentDefinition {
    pub kind: WidgetKind,
    pub capabilities: Vec<Capability>,
    pub default_props: PropertyMap,
    instantiate: Option<InstantiateFn>,
    render: Option<RenderFn>,
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("default_props", &self.default_props)
            .field("custom_instantiate", &self.instantiate.is_some())
            .field("custom_render", &self.render.is_some())
            .finish()
    }
}

impl ComponentDefinition {
    pub fn new(kind: impl Into<WidgetKind>) -> Self {
        Self {
            kind: kind.into(),
            capabilities: Vec::new(),
            default_props: PropertyMap::new(),
            instantiate: None,
            render: None,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn with_default(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_props.insert(key.into(), value);
        self
    }

    pub fn with_instantiate<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &WidgetKind, PropertyMap) -> ComponentInstance + Send + Sync + 'static,
    {
        self.instantiate = Some(Arc::new(f));
        self
    }

    pub fn with_render<F>(mut self, f: F) -> Self
    where
        F: Fn(RenderContext<'_>) -> Renderable + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(f));
        self
    }

    /// All connection points across capabilities
    pub fn points(&self) -> impl Iterator<Item = &ConnectionPoint> {
        self.capabilities.iter().flat_map(|c| c.points.iter())
    }

    pub fn point(&self, id: &str) -> Option<&ConnectionPoint> {
        self.points().find(|p| p.id == id)
    }

    /// Create an instance; `props` already has defaults merged underneath
    ///
    /// Without a custom function the instance state is seeded from point
    /// default values, except where a property of the same name is declared.
    pub fn instantiate(&self, id: &str, props: PropertyMap) -> ComponentInstance {
        if let Some(instantiate) = &self.instantiate {
            return instantiate(id, &self.kind, props);
        }
        let mut instance = ComponentInstance::new(id, self.kind.clone(), props);
        for point in self.points() {
            if instance.properties.contains_key(&point.id) {
                continue;
            }
            if let Some(default) = &point.default_value {
                instance.state.insert(point.id.clone(), default.clone());
            }
        }
        instance
    }

    /// Render with the custom function or as a generic element
    pub fn render(&self, ctx: RenderContext<'_>) -> Renderable {
        match &self.render {
            Some(render) => render(ctx),
            None => {
                let tag = self.kind.as_tag().to_string();
                Renderable::Element(ctx.into_element(tag))
            }
        }
    }
}
