//! Connection point vocabulary and property map helpers

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Property and state maps are plain JSON objects
pub type PropertyMap = serde_json::Map<String, Value>;

/// Data carried by a connection point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Number,
    Boolean,
    Date,
    Object,
    Array,
    Any,
}

impl DataType {
    /// Whether a value of `self` can be delivered to a point of `other` as-is
    pub fn is_compatible_with(self, other: DataType) -> bool {
        self == other || self == DataType::Any || other == DataType::Any
    }

    /// Best-effort classification of a JSON value
    pub fn of_value(value: &Value) -> DataType {
        match value {
            Value::String(_) => DataType::Text,
            Value::Number(_) => DataType::Number,
            Value::Bool(_) => DataType::Boolean,
            Value::Array(_) => DataType::Array,
            Value::Object(_) => DataType::Object,
            Value::Null => DataType::Any,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Text => "text",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Object => "object",
            DataType::Array => "array",
            DataType::Any => "any",
        };
        f.write_str(name)
    }
}

/// Which way values flow through a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
    Bidirectional,
}

impl Direction {
    /// Can values leave through this point
    pub fn emits(self) -> bool {
        matches!(self, Direction::Output | Direction::Bidirectional)
    }

    /// Can values arrive through this point
    pub fn accepts(self) -> bool {
        matches!(self, Direction::Input | Direction::Bidirectional)
    }
}

/// One named, typed slot on a widget or behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPoint {
    /// Identifier used by connections (`sourcePoint`/`targetPoint`)
    pub id: String,
    /// Human-readable name
    pub name: String,
    #[serde(rename = "dataType")]
    pub data_type: DataType,
    pub direction: Direction,
    #[serde(rename = "defaultValue", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl ConnectionPoint {
    pub fn new(id: impl Into<String>, data_type: DataType, direction: Direction) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            data_type,
            direction,
            default_value: None,
        }
    }

    pub fn input(id: impl Into<String>, data_type: DataType) -> Self {
        Self::new(id, data_type, Direction::Input)
    }

    pub fn output(id: impl Into<String>, data_type: DataType) -> Self {
        Self::new(id, data_type, Direction::Output)
    }

    pub fn bidirectional(id: impl Into<String>, data_type: DataType) -> Self {
        Self::new(id, data_type, Direction::Bidirectional)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// A named group of connection points; organizational only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(rename = "connectionPoints")]
    pub points: Vec<ConnectionPoint>,
}

impl Capability {
    pub fn new(name: impl Into<String>, points: Vec<ConnectionPoint>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }
}

/// Recursively merge `overlay` into `base`
///
/// Nested objects merge key by key; any other value in `overlay` replaces the
/// one in `base`.
pub fn deep_merge(base: &mut PropertyMap, overlay: &PropertyMap) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Shallow merge of property layers, later layers win
pub fn layer_properties<'a>(layers: impl IntoIterator<Item = &'a PropertyMap>) -> PropertyMap {
    let mut merged = PropertyMap::new();
    for layer in layers {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
