//! Renderable output tree
//!
//! Definitions render to this host-neutral tree; a host view layer turns it
//! into real widgets. [`Renderable::to_markup`] gives a compact HTML-like
//! form used for diagnostics and tests.

use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

use crate::types::PropertyMap;

/// A rendered widget element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: String,
    pub tag: String,
    pub attributes: PropertyMap,
    pub styles: PropertyMap,
    pub classes: Vec<String>,
    pub hidden: bool,
    pub children: Vec<Renderable>,
}

impl Element {
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            attributes: PropertyMap::new(),
            styles: PropertyMap::new(),
            classes: Vec::new(),
            hidden: false,
            children: Vec::new(),
        }
    }
}

/// Visible diagnostic shown in place of a node that could not be resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fallback {
    pub id: String,
    #[serde(rename = "attemptedType")]
    pub attempted_type: String,
    pub properties: PropertyMap,
    pub reason: String,
}

/// Node of the rendered output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "camelCase")]
pub enum Renderable {
    Element(Element),
    Text { content: String },
    Loading { id: String, attempted_type: String },
    Fallback(Fallback),
    Region { name: String, children: Vec<Renderable> },
    Fragment { children: Vec<Renderable> },
}

impl Renderable {
    pub fn text(content: impl Into<String>) -> Self {
        Renderable::Text {
            content: content.into(),
        }
    }

    /// Id of the node this renderable stands for, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Renderable::Element(element) => Some(&element.id),
            Renderable::Loading { id, .. } => Some(id),
            Renderable::Fallback(fallback) => Some(&fallback.id),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Renderable] {
        match self {
            Renderable::Element(element) => &element.children,
            Renderable::Region { children, .. } | Renderable::Fragment { children } => children,
            _ => &[],
        }
    }

    /// Depth-first search by node id
    pub fn find(&self, id: &str) -> Option<&Renderable> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    /// Concatenated text of this subtree
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Renderable::Text { content } => out.push_str(content),
            other => other.children().iter().for_each(|child| child.collect_text(out)),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Renderable::Fallback(_))
    }

    /// HTML-like markup of the subtree
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Renderable::Element(element) => {
                let _ = write!(out, "<{} id=\"{}\"", element.tag, escape(&element.id));
                for (key, value) in &element.attributes {
                    let _ = write!(out, " {}=\"{}\"", key, escape(&attribute_text(value)));
                }
                if !element.classes.is_empty() {
                    let _ = write!(out, " class=\"{}\"", escape(&element.classes.join(" ")));
                }
                if !element.styles.is_empty() {
                    let style = element
                        .styles
                        .iter()
                        .map(|(key, value)| format!("{}:{}", key, attribute_text(value)))
                        .collect::<Vec<_>>()
                        .join(";");
                    let _ = write!(out, " style=\"{}\"", escape(&style));
                }
                if element.hidden {
                    out.push_str(" hidden");
                }
                if element.children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    element.children.iter().for_each(|child| child.write_markup(out));
                    let _ = write!(out, "</{}>", element.tag);
                }
            }
            Renderable::Text { content } => out.push_str(&escape(content)),
            Renderable::Loading { id, attempted_type } => {
                let _ = write!(
                    out,
                    "<loading id=\"{}\" type=\"{}\"/>",
                    escape(id),
                    escape(attempted_type)
                );
            }
            Renderable::Fallback(fallback) => {
                let properties = Value::Object(fallback.properties.clone()).to_string();
                let _ = write!(
                    out,
                    "<fallback id=\"{id}\" type=\"{ty}\">Unable to render \"{ty}\" (id {id}): {reason}; properties: {props}</fallback>",
                    id = escape(&fallback.id),
                    ty = escape(&fallback.attempted_type),
                    reason = escape(&fallback.reason),
                    props = escape(&properties),
                );
            }
            Renderable::Region { name, children } => {
                let _ = write!(out, "<region name=\"{}\">", escape(name));
                children.iter().for_each(|child| child.write_markup(out));
                out.push_str("</region>");
            }
            Renderable::Fragment { children } => {
                children.iter().for_each(|child| child.write_markup(out));
            }
        }
    }
}

/// Attribute form of a value: strings bare, everything else as JSON
pub fn attribute_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
