//! Declarative tree and application descriptions
//!
//! These are the JSON documents a host hands to the interpreter. Field names
//! follow the document format (`affectedComponents`, `sourceId`, ...).

use std::collections::BTreeMap;

use loom_core::PropertyMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InterpretResult;

/// One widget node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub type_tag: String,

    #[serde(default)]
    pub properties: PropertyMap,

    #[serde(default)]
    pub children: Vec<ChildSpec>,

    #[serde(default)]
    pub styles: PropertyMap,

    #[serde(default)]
    pub events: BTreeMap<String, CodeSpec>,

    #[serde(default)]
    pub methods: BTreeMap<String, CodeSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default)]
    pub behaviors: Vec<BehaviorSpec>,
}

/// A child is either a nested node or literal text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildSpec {
    Text(String),
    Node(Box<NodeSpec>),
}

/// Handler code, optionally naming the nodes it changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeSpec {
    Code(String),
    Detailed {
        code: String,
        #[serde(default, rename = "affectedComponents")]
        affected_components: Vec<String>,
    },
}

impl CodeSpec {
    pub fn code(&self) -> &str {
        match self {
            CodeSpec::Code(code) | CodeSpec::Detailed { code, .. } => code,
        }
    }

    pub fn affected_components(&self) -> &[String] {
        match self {
            CodeSpec::Code(_) => &[],
            CodeSpec::Detailed {
                affected_components,
                ..
            } => affected_components,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSpec {
    pub behavior: String,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutSpec {
    #[serde(rename = "type", default)]
    pub layout_type: String,
    #[serde(default)]
    pub regions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    pub source_id: String,
    pub source_point: String,
    pub target_id: String,
    pub target_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer_name: Option<String>,
}

/// A whole application: layout regions, top-level nodes and wiring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
    #[serde(default)]
    pub layout: LayoutSpec,
    #[serde(default)]
    pub components: Vec<NodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functionality: Option<Value>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

impl NodeSpec {
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            id: None,
            type_tag: type_tag.into(),
            properties: PropertyMap::new(),
            children: Vec::new(),
            styles: PropertyMap::new(),
            events: BTreeMap::new(),
            methods: BTreeMap::new(),
            region: None,
            behaviors: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(ChildSpec::Node(Box::new(child)));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(ChildSpec::Text(text.into()));
        self
    }

    pub fn with_event(mut self, name: impl Into<String>, code: impl Into<String>) -> Self {
        self.events.insert(name.into(), CodeSpec::Code(code.into()));
        self
    }

    pub fn from_json(json: &str) -> InterpretResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl AppSpec {
    pub fn from_json(json: &str) -> InterpretResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_schema() {
        let node: NodeSpec = serde_json::from_value(json!({
            "id": "b1",
            "type": "button",
            "properties": {"label": "Go"},
            "children": ["text", {"type": "text"}],
            "events": {
                "onClick": "accessor('#t').setProperty('text', 'x')",
                "onHover": {"code": "1", "affectedComponents": ["t"]}
            },
            "behaviors": [{"behavior": "toggle", "options": {"states": ["a", "b"]}}]
        }))
        .unwrap();

        assert_eq!(node.type_tag, "button");
        assert!(matches!(node.children[0], ChildSpec::Text(_)));
        assert!(matches!(node.children[1], ChildSpec::Node(_)));
        assert_eq!(node.events["onHover"].affected_components(), ["t".to_string()]);
        assert_eq!(node.events["onClick"].affected_components().len(), 0);
        assert_eq!(node.behaviors[0].behavior, "toggle");
    }

    #[test]
    fn test_app_schema() {
        let app = AppSpec::from_json(
            r#"{
                "layout": {"type": "sidebar", "regions": ["sidebar", "main"]},
                "components": [{"id": "a", "type": "input", "region": "main"}],
                "connections": [{"sourceId": "a", "sourcePoint": "value",
                                 "targetId": "b", "targetPoint": "text",
                                 "transformerName": "toUpperCase"}]
            }"#,
        )
        .unwrap();
        assert_eq!(app.layout.regions, vec!["sidebar", "main"]);
        assert_eq!(app.connections[0].transformer_name.as_deref(), Some("toUpperCase"));
    }

    #[test]
    fn test_missing_type_is_an_error() {
        assert!(NodeSpec::from_json(r#"{"id": "x"}"#).is_err());
    }
}
