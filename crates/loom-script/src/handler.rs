//! Compiled handlers and custom transforms

use std::collections::BTreeSet;
use std::sync::Arc;

use loom_core::Transform;
use serde_json::Value;
use tracing::warn;

use crate::ast::Stmt;
use crate::error::{CompileResult, ExecResult};
use crate::eval::{Interpreter, ScriptValue};
use crate::host::{NullHost, ScriptHost};
use crate::shape::SHAPES;

/// Handler code compiled once and run many times
///
/// Every run binds `event` and `accessor`. A function-shaped handler also
/// binds its first parameter to the event and its second to the accessor,
/// whatever they are called.
#[derive(Debug, Clone)]
pub struct Handler {
    shape: &'static str,
    params: Vec<String>,
    body: Arc<Vec<Stmt>>,
}

/// Inputs to one handler run
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub event: Value,
    /// Component that `accessor('self')` selects
    pub self_id: Option<&'a str>,
    pub max_steps: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    pub value: Value,
    /// Components the handler wrote to through handles
    pub touched: BTreeSet<String>,
}

impl Handler {
    pub(crate) fn new(shape: &'static str, params: Vec<String>, body: Vec<Stmt>) -> Self {
        Self {
            shape,
            params,
            body: Arc::new(body),
        }
    }

    /// Name of the code shape this handler was compiled from
    pub fn shape(&self) -> &'static str {
        self.shape
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn run(&self, invocation: Invocation<'_>, host: &mut dyn ScriptHost) -> ExecResult<ExecOutcome> {
        let mut interp = Interpreter::new(
            host,
            invocation.self_id.map(str::to_string),
            invocation.max_steps,
        );
        interp.bind("event", ScriptValue::Json(invocation.event.clone()));
        interp.bind("accessor", ScriptValue::Accessor);

        let mut params = self.params.iter();
        if let Some(name) = params.next() {
            interp.bind(name, ScriptValue::Json(invocation.event));
        }
        if let Some(name) = params.next() {
            interp.bind(name, ScriptValue::Accessor);
        }
        for name in params {
            interp.bind(name, ScriptValue::null());
        }

        let value = interp.run(&self.body)?.into_json();
        Ok(ExecOutcome {
            value,
            touched: interp.into_touched(),
        })
    }

    /// Run as a value transform: the input is bound to `value` and to the
    /// first parameter
    pub fn run_transform(&self, value: &Value, max_steps: usize) -> ExecResult<Value> {
        let mut host = NullHost;
        let mut interp = Interpreter::new(&mut host, None, max_steps);
        interp.bind("value", ScriptValue::Json(value.clone()));
        if let Some(name) = self.params.first() {
            interp.bind(name, ScriptValue::Json(value.clone()));
        }
        Ok(interp.run(&self.body)?.into_json())
    }
}

/// Compile handler code, trying each code shape in turn
pub fn compile_handler(code: &str) -> CompileResult<Handler> {
    SHAPES.compile(code)
}

/// Compile code into a connection transform
///
/// A transform that fails at run time passes its input through unchanged.
pub fn compile_transform(code: &str, max_steps: usize) -> CompileResult<Transform> {
    let handler = compile_handler(code)?;
    let name = format!("custom:{}", code.trim());
    Ok(Transform::new(name, move |value: &Value| {
        match handler.run_transform(value, max_steps) {
            Ok(out) => out,
            Err(e) => {
                warn!(error = %e, "Custom transform failed, passing value through");
                value.clone()
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("value * 2" ; "bare expression")]
    #[test_case("return value * 2" ; "bare return")]
    #[test_case("v => v * 2" ; "arrow")]
    #[test_case("function (x) { return x * 2 }" ; "function literal")]
    fn test_custom_transform_shapes(code: &str) {
        let transform = compile_transform(code, 1000).unwrap();
        assert_eq!(transform.apply(&json!(21)), json!(42));
    }

    #[test]
    fn test_failing_transform_passes_through() {
        let transform = compile_transform("value.frobnicate()", 1000).unwrap();
        assert_eq!(transform.apply(&json!("x")), json!("x"));
    }

    #[test]
    fn test_named_params_alias_event() {
        let handler = compile_handler("(e, a) => e.value + event.value").unwrap();
        let outcome = handler
            .run(
                Invocation {
                    event: json!({"value": 2}),
                    self_id: None,
                    max_steps: 100,
                },
                &mut NullHost,
            )
            .unwrap();
        assert_eq!(outcome.value, json!(4));
        assert!(outcome.touched.is_empty());
    }
}
