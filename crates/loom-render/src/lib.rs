//! # Loom render
//!
//! Mounts declarative widget trees onto a [`loom_core::Runtime`]. Nodes are
//! resolved to component definitions asynchronously, get instances and
//! compiled handlers, and render to a [`loom_core::Renderable`] tree that a
//! host view layer can draw. Unresolvable types render a visible fallback
//! instead of failing the tree.
//!
//! ```rust
//! use loom_render::{NodeSpec, TreeInterpreter};
//! use loom_core::ViewBinding;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut ui = TreeInterpreter::default();
//! ui.load(
//!     NodeSpec::new("container")
//!         .with_id("root")
//!         .with_child(
//!             NodeSpec::new("button")
//!                 .with_id("b1")
//!                 .with_event("onClick", "accessor('#t1').setProperty('text', 'clicked')"),
//!         )
//!         .with_child(NodeSpec::new("text").with_id("t1")),
//! )
//! .await
//! .unwrap();
//!
//! ui.dispatch_event("b1", "onClick", json!(null)).unwrap();
//! assert_eq!(ui.runtime().property("t1", "text"), Some(json!("clicked")));
//! assert!(ui.markup().contains("clicked"));
//! # }
//! ```

#![warn(clippy::all)]

pub mod app;
pub mod arena;
pub mod cli;
pub mod error;
pub mod interpreter;
pub mod resolver;
pub mod schema;
pub mod widgets;

pub use arena::{NodeIndex, NodeStatus, TreeArena};
pub use error::{InterpretError, InterpretResult, ResolveError, ResolveResult};
pub use interpreter::{point_for_event, DispatchOutcome, TreeInterpreter};
pub use resolver::{RegistryResolver, TypeResolver};
pub use schema::{AppSpec, BehaviorSpec, ChildSpec, CodeSpec, ConnectionSpec, LayoutSpec, NodeSpec};
pub use widgets::{builtin_definitions, register_builtin_widgets};
