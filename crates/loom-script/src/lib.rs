//! # Loom script
//!
//! A small sandboxed language for event handlers, component methods and
//! custom connection transforms. Code is data inside a declarative tree, so
//! it never runs as host code: a handler sees the event value, its own
//! locals and the `accessor` function, and nothing else.
//!
//! ```rust
//! use loom_script::{compile_handler, Invocation, NullHost};
//! use serde_json::json;
//!
//! let handler = compile_handler("(event) => event.count + 1").unwrap();
//! let outcome = handler
//!     .run(
//!         Invocation { event: json!({"count": 1}), self_id: None, max_steps: 100 },
//!         &mut NullHost,
//!     )
//!     .unwrap();
//! assert_eq!(outcome.value, json!(2));
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod handler;
pub mod host;
pub mod parser;
pub mod shape;

pub use error::{CompileError, CompileResult, ExecError, ExecResult, ParseError, ParseResult};
pub use eval::{Interpreter, ScriptValue};
pub use handler::{compile_handler, compile_transform, ExecOutcome, Handler, Invocation};
pub use host::{NullHost, ScriptHost, Selector};
pub use shape::{BareBlock, CodeShape, FunctionLiteral, ShapeRegistry, Wrapped};
