//! Built-in widget definitions
//!
//! Generic definitions for the canonical kinds. They declare the connection
//! points each widget exposes and render plain elements; a host view layer
//! maps those elements onto real widgets.

use loom_core::coerce::to_text;
use loom_core::ConnectionPoint as P;
use loom_core::{
    Capability, ComponentDefinition, DataType, Element, RenderContext, Renderable, Runtime,
    WidgetKind,
};
use serde_json::{json, Value};

/// Element whose first child is the text of the first non-null property in
/// `keys`, followed by the node's own children
fn labelled(
    keys: &'static [&'static str],
) -> impl Fn(RenderContext<'_>) -> Renderable + Send + Sync + 'static {
    move |ctx: RenderContext<'_>| {
        let label = keys
            .iter()
            .find_map(|key| ctx.property(key).filter(|v| !v.is_null()))
            .map(to_text);
        let tag = ctx.instance.kind.as_tag().to_string();
        let mut element = ctx.into_element(tag);
        if let Some(label) = label {
            element.children.insert(0, Renderable::text(label));
        }
        Renderable::Element(element)
    }
}

fn render_list(ctx: RenderContext<'_>) -> Renderable {
    let items = match ctx.property("items") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    let id = ctx.id().to_string();
    let mut element = ctx.into_element("list");
    element.attributes.remove("items");
    let rendered = items.iter().enumerate().map(|(i, item)| {
        let mut li = Element::new(format!("{}-item-{}", id, i), "item");
        li.children.push(Renderable::text(to_text(item)));
        Renderable::Element(li)
    });
    element.children.splice(0..0, rendered);
    Renderable::Element(element)
}

fn button() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Button)
        .with_capability(Capability::new(
            "events",
            vec![P::output("click", DataType::Any)],
        ))
        .with_capability(Capability::new(
            "content",
            vec![
                P::input("label", DataType::Text),
                P::input("disabled", DataType::Boolean),
            ],
        ))
        .with_default("label", json!("Button"))
        .with_render(labelled(&["label", "text"]))
}

fn text() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Text)
        .with_capability(Capability::new(
            "content",
            vec![
                P::input("text", DataType::Text),
                P::input("content", DataType::Text),
            ],
        ))
        .with_render(labelled(&["text", "content"]))
}

fn heading() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Heading)
        .with_capability(Capability::new(
            "content",
            vec![P::input("text", DataType::Text)],
        ))
        .with_default("level", json!(1))
        .with_render(labelled(&["text", "content"]))
}

fn input() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Input)
        .with_capability(Capability::new(
            "value",
            vec![
                P::bidirectional("value", DataType::Text),
                P::output("change", DataType::Text),
                P::output("submit", DataType::Text),
            ],
        ))
        .with_capability(Capability::new(
            "display",
            vec![P::input("placeholder", DataType::Text)],
        ))
        .with_default("value", json!(""))
}

fn checked(kind: WidgetKind) -> ComponentDefinition {
    ComponentDefinition::new(kind)
        .with_capability(Capability::new(
            "value",
            vec![
                P::bidirectional("checked", DataType::Boolean),
                P::output("change", DataType::Boolean),
            ],
        ))
        .with_default("checked", json!(false))
        .with_render(labelled(&["label"]))
}

fn slider() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Slider)
        .with_capability(Capability::new(
            "value",
            vec![
                P::bidirectional("value", DataType::Number),
                P::output("change", DataType::Number),
            ],
        ))
        .with_default("min", json!(0))
        .with_default("max", json!(100))
        .with_default("value", json!(50))
}

fn select() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Select)
        .with_capability(Capability::new(
            "value",
            vec![
                P::bidirectional("value", DataType::Text),
                P::input("options", DataType::Array),
                P::output("change", DataType::Text),
                P::output("selected", DataType::Text),
            ],
        ))
        .with_default("options", json!([]))
}

fn image() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Image).with_capability(Capability::new(
        "content",
        vec![P::input("src", DataType::Text), P::input("alt", DataType::Text)],
    ))
}

fn list() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::List)
        .with_capability(Capability::new(
            "data",
            vec![
                P::input("items", DataType::Array),
                P::output("selected", DataType::Any),
            ],
        ))
        .with_default("items", json!([]))
        .with_render(render_list)
}

fn card() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Card)
        .with_capability(Capability::new(
            "content",
            vec![
                P::input("title", DataType::Text),
                P::input("content", DataType::Text),
            ],
        ))
        .with_render(labelled(&["title"]))
}

fn container() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Container).with_capability(Capability::new(
        "data",
        vec![P::input("data", DataType::Any)],
    ))
}

fn form() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Form).with_capability(Capability::new(
        "data",
        vec![
            P::input("data", DataType::Object),
            P::output("submit", DataType::Object),
        ],
    ))
}

fn link() -> ComponentDefinition {
    ComponentDefinition::new(WidgetKind::Link)
        .with_capability(Capability::new(
            "events",
            vec![P::output("click", DataType::Any)],
        ))
        .with_capability(Capability::new(
            "content",
            vec![P::input("href", DataType::Text), P::input("text", DataType::Text)],
        ))
        .with_render(labelled(&["text", "href"]))
}

/// Definitions for every built-in widget
pub fn builtin_definitions() -> Vec<ComponentDefinition> {
    vec![
        button(),
        text(),
        heading(),
        input(),
        checked(WidgetKind::Checkbox),
        checked(WidgetKind::Toggle),
        slider(),
        select(),
        image(),
        list(),
        card(),
        container(),
        form(),
        link(),
    ]
}

/// Register every built-in widget with a runtime
pub fn register_builtin_widgets(runtime: &mut Runtime) {
    for definition in builtin_definitions() {
        runtime.register_type(definition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::{ComponentInstance, PropertyMap};

    fn render(def: &ComponentDefinition, props: serde_json::Value) -> Renderable {
        let props: PropertyMap = props.as_object().cloned().unwrap_or_default();
        let instance = ComponentInstance::new("n1", def.kind.clone(), props.clone());
        def.render(RenderContext {
            instance: &instance,
            properties: props,
            styles: PropertyMap::new(),
            classes: Vec::new(),
            hidden: false,
            children: Vec::new(),
        })
    }

    #[test]
    fn test_all_builtins_are_known_kinds() {
        let defs = builtin_definitions();
        assert_eq!(defs.len(), 14);
        assert!(defs.iter().all(|d| d.kind.is_known()));
    }

    #[test]
    fn test_button_renders_label() {
        let markup = render(&button(), json!({"label": "Go"})).to_markup();
        assert_eq!(markup, "<button id=\"n1\" label=\"Go\">Go</button>");
    }

    #[test]
    fn test_list_renders_items() {
        let out = render(&list(), json!({"items": ["a", "b"]}));
        assert_eq!(out.children().len(), 2);
        assert_eq!(out.text_content(), "ab");
    }

    #[test]
    fn test_text_prefers_text_over_content() {
        let out = render(&text(), json!({"content": "c", "text": "t"}));
        assert_eq!(out.text_content(), "t");
    }
}
