//! # Loom core
//!
//! The dataflow half of Loom: widget type definitions, live instances, the
//! connection graph between their points, and reusable behaviors. All of it
//! is owned by a [`Runtime`] context; the tree interpreter in `loom-render`
//! drives one runtime per mounted tree.
//!
//! ```rust
//! use loom_core::{Capability, ComponentDefinition, ConnectionPoint, DataType, Runtime, Transform};
//! use loom_core::{PropertyMap, WidgetKind};
//! use serde_json::json;
//!
//! let mut rt = Runtime::default();
//! rt.register_type(ComponentDefinition::new("button").with_capability(Capability::new(
//!     "events",
//!     vec![ConnectionPoint::output("click", DataType::Any)],
//! )));
//! rt.register_type(ComponentDefinition::new("text").with_capability(Capability::new(
//!     "content",
//!     vec![ConnectionPoint::input("text", DataType::Text)],
//! )));
//! rt.create_instance(&WidgetKind::Button, "b1", PropertyMap::new());
//! rt.create_instance(&WidgetKind::Text, "t1", PropertyMap::new());
//!
//! rt.connect("b1", "click", "t1", "text", Some(Transform::constant(json!("clicked")))).unwrap();
//! rt.emit("b1", "click", json!(null)).unwrap();
//! assert_eq!(rt.instances().state_value("t1", "text"), Some(&json!("clicked")));
//! ```

#![warn(clippy::all)]

pub mod autoconnect;
pub mod behavior;
pub mod binding;
pub mod coerce;
pub mod connection;
pub mod definition;
pub mod error;
pub mod event;
pub mod instance;
pub mod kind;
pub mod registry;
pub mod renderable;
pub mod runtime;
pub mod transform;
pub mod types;

pub use autoconnect::{AutoConnectOptions, Proposal};
pub use behavior::{
    Behavior, BehaviorContext, BehaviorOptions, BehaviorPoints, BehaviorSystem, Compatibility, Effect,
};
pub use binding::ViewBinding;
pub use connection::{Connection, ConnectionManager, Delivery, Endpoint};
pub use definition::{ComponentDefinition, RenderContext};
pub use error::{BehaviorError, BehaviorResult, RuntimeError, RuntimeResult};
pub use event::{Event, EventKind, EventLog, SubscriptionId};
pub use instance::{ComponentInstance, InstanceStore, InstanceUpdate, Presentation};
pub use kind::{normalize_tag, AliasTable, WidgetKind};
pub use registry::{DefinitionLookup, TypeRegistry};
pub use renderable::{Element, Fallback, Renderable};
pub use runtime::Runtime;
pub use transform::Transform;
pub use types::{Capability, ConnectionPoint, DataType, Direction, PropertyMap};
