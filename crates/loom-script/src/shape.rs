//! Code shapes accepted for handler source.
//!
//! Handler code arrives in whatever form the tree author wrote it. Three
//! shapes are understood:
//! - a bare statement block (`accessor('#out').setProperty('text', 'hi')`),
//! - a function literal (`function (event, accessor) { ... }` or an arrow),
//! - already-wrapped code (`return (event, accessor) => { ... }`).
//!
//! Shapes are tried in priority order and a shape that fails to parse falls
//! through to the next one, so the shape is classified exactly once, at
//! compile time.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{CompileError, CompileResult, ParseResult};
use crate::handler::Handler;
use crate::parser::{parse_function, parse_program, parse_wrapped};

pub trait CodeShape: Send + Sync {
    /// Unique name for this shape
    fn name(&self) -> &'static str;

    /// Cheap check before trying to parse
    fn can_handle(&self, code: &str) -> bool;

    fn compile(&self, code: &str) -> ParseResult<Handler>;

    /// Priority (higher = tried first). Default: 50
    fn priority(&self) -> u8 {
        50
    }
}

/// Statements run directly with `event` and `accessor` in scope
pub struct BareBlock;

impl CodeShape for BareBlock {
    fn name(&self) -> &'static str {
        "block"
    }

    fn can_handle(&self, _code: &str) -> bool {
        true
    }

    fn compile(&self, code: &str) -> ParseResult<Handler> {
        let body = parse_program(code)?;
        Ok(Handler::new(self.name(), Vec::new(), body))
    }

    fn priority(&self) -> u8 {
        90
    }
}

static FUNCTION_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(function\b|\([^)]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)")
        .expect("function literal regex is valid")
});

/// `function (event, accessor) { ... }` and arrow functions
pub struct FunctionLiteral;

impl CodeShape for FunctionLiteral {
    fn name(&self) -> &'static str {
        "function"
    }

    fn can_handle(&self, code: &str) -> bool {
        FUNCTION_START.is_match(code)
    }

    fn compile(&self, code: &str) -> ParseResult<Handler> {
        let func = parse_function(code)?;
        Ok(Handler::new(self.name(), func.params, func.body))
    }
}

static RETURN_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*return\s+").expect("return regex is valid"));

/// `return <function literal>`
pub struct Wrapped;

impl CodeShape for Wrapped {
    fn name(&self) -> &'static str {
        "wrapped"
    }

    fn can_handle(&self, code: &str) -> bool {
        RETURN_START.is_match(code)
    }

    fn compile(&self, code: &str) -> ParseResult<Handler> {
        let func = parse_wrapped(code)?;
        Ok(Handler::new(self.name(), func.params, func.body))
    }

    fn priority(&self) -> u8 {
        30
    }
}

/// Shapes sorted by priority, highest first
pub struct ShapeRegistry {
    shapes: Vec<Arc<dyn CodeShape>>,
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(BareBlock));
        registry.register(Arc::new(FunctionLiteral));
        registry.register(Arc::new(Wrapped));
        registry
    }
}

impl ShapeRegistry {
    pub fn empty() -> Self {
        Self { shapes: Vec::new() }
    }

    /// Register a shape (re-sorts by priority)
    pub fn register(&mut self, shape: Arc<dyn CodeShape>) {
        self.shapes.push(shape);
        self.shapes.sort_by_key(|s| std::cmp::Reverse(s.priority()));
    }

    pub fn shape_names(&self) -> Vec<&'static str> {
        self.shapes.iter().map(|s| s.name()).collect()
    }

    /// Compile with the first shape that both claims and parses the code
    pub fn compile(&self, code: &str) -> CompileResult<Handler> {
        let mut tried = Vec::new();
        let mut errors = Vec::new();

        for shape in &self.shapes {
            if !shape.can_handle(code) {
                continue;
            }
            tried.push(shape.name());
            match shape.compile(code) {
                Ok(handler) => {
                    debug!(shape = shape.name(), "Compiled handler");
                    return Ok(handler);
                }
                Err(e) => {
                    debug!(shape = shape.name(), error = %e, "Shape rejected handler code");
                    errors.push(format!("[{}] {}", shape.name(), e));
                }
            }
        }

        Err(CompileError::NoMatchingShape {
            tried,
            errors: errors.join("\n"),
        })
    }
}

pub(crate) static SHAPES: Lazy<ShapeRegistry> = Lazy::new(ShapeRegistry::default);
