//! Tree-walking evaluator for handler code
//!
//! Values are JSON plus a few host-only forms: the accessor function,
//! selections returned by it and the built-in globals. Host-only values can
//! live in variables but turn into `null` when stored inside arrays or
//! objects.

use std::collections::{BTreeSet, HashMap};

use loom_core::coerce::{self, loose_eq, strict_eq, to_number, to_text, truthy};
use rand::Rng;
use serde_json::{Map, Value};
use tracing::debug;

use crate::ast::{AssignOp, BinaryOp, DeclKind, Expr, Stmt, UnaryOp};
use crate::error::{ExecError, ExecResult};
use crate::host::{ScriptHost, Selector};

/// Budget for any value a handler builds, counted as one unit per JSON node
/// plus one per byte of string and key text
pub const MAX_VALUE_SIZE: usize = 1 << 18;

/// How far past the end of an array an index assignment may reach
pub const MAX_INDEX_GAP: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Global {
    Math,
    Console,
    String,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Json(Value),
    /// The `accessor` function
    Accessor,
    /// Components selected through the accessor
    Handle(Vec<String>),
    Global(Global),
}

impl ScriptValue {
    pub fn null() -> Self {
        ScriptValue::Json(Value::Null)
    }

    pub fn into_json(self) -> Value {
        match self {
            ScriptValue::Json(v) => v,
            _ => Value::Null,
        }
    }

    fn as_json(&self) -> Option<&Value> {
        match self {
            ScriptValue::Json(v) => Some(v),
            _ => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            ScriptValue::Json(v) => truthy(v),
            _ => true,
        }
    }

    fn describe(&self) -> String {
        match self {
            ScriptValue::Json(v) => to_text(v),
            ScriptValue::Accessor => "accessor".to_string(),
            ScriptValue::Handle(ids) => format!("[handle {}]", ids.join(",")),
            ScriptValue::Global(g) => format!("{:?}", g),
        }
    }
}

impl From<Value> for ScriptValue {
    fn from(value: Value) -> Self {
        ScriptValue::Json(value)
    }
}

#[derive(Debug, Clone)]
struct Binding {
    value: ScriptValue,
    constant: bool,
}

enum Flow {
    Normal,
    Return(ScriptValue),
}

enum PathSeg {
    Key(String),
    Index(Value),
}

/// One run of a handler against a host
pub struct Interpreter<'h> {
    host: &'h mut dyn ScriptHost,
    self_id: Option<String>,
    scopes: Vec<HashMap<String, Binding>>,
    steps: usize,
    max_steps: usize,
    completion: ScriptValue,
    touched: BTreeSet<String>,
}

impl<'h> Interpreter<'h> {
    pub fn new(host: &'h mut dyn ScriptHost, self_id: Option<String>, max_steps: usize) -> Self {
        Self {
            host,
            self_id,
            scopes: vec![HashMap::new()],
            steps: 0,
            max_steps,
            completion: ScriptValue::null(),
            touched: BTreeSet::new(),
        }
    }

    /// Bind a name in the outermost scope before running
    pub fn bind(&mut self, name: &str, value: ScriptValue) {
        if let Some(scope) = self.scopes.first_mut() {
            scope.insert(
                name.to_string(),
                Binding {
                    value,
                    constant: false,
                },
            );
        }
    }

    /// Components written through handles so far
    pub fn touched(&self) -> &BTreeSet<String> {
        &self.touched
    }

    pub fn into_touched(self) -> BTreeSet<String> {
        self.touched
    }

    /// Run a statement list
    ///
    /// The result is the `return` value, or else the value of the last
    /// expression statement.
    pub fn run(&mut self, body: &[Stmt]) -> ExecResult<ScriptValue> {
        match self.exec_block(body)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(std::mem::replace(&mut self.completion, ScriptValue::null())),
        }
    }

    fn tick(&mut self) -> ExecResult<()> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(ExecError::StepLimit {
                max: self.max_steps,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn exec_block(&mut self, body: &[Stmt]) -> ExecResult<Flow> {
        for stmt in body {
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> ExecResult<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Empty => {}
            Stmt::Expr(expr) => {
                self.completion = self.eval(expr)?;
            }
            Stmt::Decl(kind, name, init) => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => ScriptValue::null(),
                };
                self.declare(*kind, name, value)?;
            }
            Stmt::Assign(target, op, value) => {
                let rhs = self.eval(value)?;
                let value = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add => {
                        let current = self.eval(target)?;
                        ScriptValue::Json(checked(add(&current.into_json(), &rhs.into_json()))?)
                    }
                    AssignOp::Sub => {
                        let current = self.eval(target)?;
                        ScriptValue::Json(coerce::number(
                            to_number(&current.into_json()) - to_number(&rhs.into_json()),
                        ))
                    }
                };
                self.assign(target, value)?;
            }
            Stmt::If(cond, then, otherwise) => {
                if self.eval(cond)?.truthy() {
                    return self.exec_scoped(then);
                } else if let Some(otherwise) = otherwise {
                    return self.exec_scoped(otherwise);
                }
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => ScriptValue::null(),
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Block(body) => {
                self.scopes.push(HashMap::new());
                let flow = self.exec_block(body);
                self.scopes.pop();
                return flow;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_scoped(&mut self, stmt: &Stmt) -> ExecResult<Flow> {
        self.scopes.push(HashMap::new());
        let flow = self.exec(stmt);
        self.scopes.pop();
        flow
    }

    fn declare(&mut self, kind: DeclKind, name: &str, value: ScriptValue) -> ExecResult<()> {
        let constant = kind == DeclKind::Const;
        // `var` is function scoped
        let scope = match kind {
            DeclKind::Var => self.scopes.first_mut(),
            DeclKind::Let | DeclKind::Const => self.scopes.last_mut(),
        };
        let Some(scope) = scope else {
            return Ok(());
        };

        let clash = scope
            .get(name)
            .is_some_and(|existing| kind != DeclKind::Var || existing.constant);
        if clash {
            return Err(ExecError::Redeclared(name.to_string()));
        }
        scope.insert(name.to_string(), Binding { value, constant });
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }

    fn assign(&mut self, target: &Expr, value: ScriptValue) -> ExecResult<()> {
        let mut path = Vec::new();
        let root = self.place_path(target, &mut path)?;

        if path.is_empty() {
            return match self.lookup_mut(&root) {
                Some(binding) if binding.constant => Err(ExecError::AssignToConstant(root)),
                Some(binding) => {
                    binding.value = value;
                    Ok(())
                }
                None => {
                    // Undeclared names become handler-wide variables
                    self.bind(&root, value);
                    Ok(())
                }
            };
        }

        let binding = self
            .lookup_mut(&root)
            .ok_or_else(|| ExecError::UnknownVariable(root.clone()))?;
        let ScriptValue::Json(data) = &mut binding.value else {
            return Err(ExecError::InvalidTarget);
        };
        write_path(data, &path, value.into_json())?;
        check_size(data)
    }

    /// Root variable name plus the member/index path below it
    fn place_path(&mut self, target: &Expr, path: &mut Vec<PathSeg>) -> ExecResult<String> {
        match target {
            Expr::Var(name) => Ok(name.clone()),
            Expr::Member(base, name) => {
                let root = self.place_path(base, path)?;
                path.push(PathSeg::Key(name.clone()));
                Ok(root)
            }
            Expr::Index(base, index) => {
                let root = self.place_path(base, path)?;
                let index = self.eval(index)?.into_json();
                path.push(PathSeg::Index(index));
                Ok(root)
            }
            _ => Err(ExecError::InvalidTarget),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn eval(&mut self, expr: &Expr) -> ExecResult<ScriptValue> {
        self.tick()?;
        match expr {
            Expr::Literal(v) => Ok(ScriptValue::Json(v.clone())),
            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?.into_json());
                }
                checked(Value::Array(out)).map(ScriptValue::Json)
            }
            Expr::Object(entries) => {
                let mut out = Map::new();
                for (key, item) in entries {
                    out.insert(key.clone(), self.eval(item)?.into_json());
                }
                checked(Value::Object(out)).map(ScriptValue::Json)
            }
            Expr::Var(name) => self.var(name),
            Expr::Member(base, name) => {
                let base = self.eval(base)?;
                Ok(member(&base, name))
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?.into_json();
                Ok(ScriptValue::Json(index_value(&base, &index)))
            }
            Expr::Call(callee, args) => self.call(callee, args),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(ScriptValue::Json(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => coerce::number(-to_number(&value.into_json())),
                }))
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if left.truthy() {
                    self.eval(rhs)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                checked(binary(*op, &left, &right)).map(ScriptValue::Json)
            }
            Expr::Conditional(cond, then, otherwise) => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn var(&self, name: &str) -> ExecResult<ScriptValue> {
        if let Some(binding) = self.lookup(name) {
            return Ok(binding.value.clone());
        }
        match name {
            "Math" => Ok(ScriptValue::Global(Global::Math)),
            "console" => Ok(ScriptValue::Global(Global::Console)),
            "String" => Ok(ScriptValue::Global(Global::String)),
            "Number" => Ok(ScriptValue::Global(Global::Number)),
            "Boolean" => Ok(ScriptValue::Global(Global::Boolean)),
            "accessor" => Ok(ScriptValue::Accessor),
            _ => Err(ExecError::UnknownVariable(name.to_string())),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> ExecResult<Vec<ScriptValue>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> ExecResult<ScriptValue> {
        if let Expr::Member(base, method) = callee {
            let receiver = self.eval(base)?;
            let args = self.eval_args(args)?;
            return match receiver {
                ScriptValue::Json(value) => call_value_method(&value, method, args),
                ScriptValue::Handle(ids) => self.call_handle(ids, method, args),
                ScriptValue::Global(global) => self.call_global(global, method, args),
                ScriptValue::Accessor => Err(ExecError::unknown_method("accessor", method.as_str())),
            };
        }

        let function = self.eval(callee)?;
        let args = self.eval_args(args)?;
        match function {
            ScriptValue::Accessor => self.select(args.into_iter().next()),
            ScriptValue::Global(Global::String) => Ok(ScriptValue::Json(Value::String(
                first_json(args).map_or_else(String::new, |v| to_text(&v)),
            ))),
            ScriptValue::Global(Global::Number) => Ok(ScriptValue::Json(coerce::number(
                first_json(args).map_or(0.0, |v| to_number(&v)),
            ))),
            ScriptValue::Global(Global::Boolean) => Ok(ScriptValue::Json(Value::Bool(
                args.first().is_some_and(ScriptValue::truthy),
            ))),
            other => Err(ExecError::NotCallable(other.describe())),
        }
    }

    fn select(&mut self, arg: Option<ScriptValue>) -> ExecResult<ScriptValue> {
        let raw = match arg {
            Some(ScriptValue::Json(Value::String(s))) => s,
            Some(ScriptValue::Handle(ids)) => return Ok(ScriptValue::Handle(ids)),
            Some(other) => {
                return Err(ExecError::type_error(format!(
                    "accessor expects a selector string, got {}",
                    other.describe()
                )))
            }
            None => return Err(ExecError::type_error("accessor expects a selector")),
        };

        let ids = match Selector::parse(&raw) {
            Selector::SelfRef => self.self_id.iter().cloned().collect(),
            selector => self.host.select(&selector),
        };
        if ids.is_empty() {
            debug!(selector = %raw, "Selector matched no components");
        }
        Ok(ScriptValue::Handle(ids))
    }

    fn call_global(
        &mut self,
        global: Global,
        method: &str,
        args: Vec<ScriptValue>,
    ) -> ExecResult<ScriptValue> {
        match global {
            Global::Console => match method {
                "log" | "info" | "warn" | "error" | "debug" => {
                    let message = args
                        .iter()
                        .map(ScriptValue::describe)
                        .collect::<Vec<_>>()
                        .join(" ");
                    self.host.log(&message);
                    Ok(ScriptValue::null())
                }
                _ => Err(ExecError::unknown_method("console", method)),
            },
            Global::Math => {
                let nums: Vec<f64> = args
                    .into_iter()
                    .map(|a| to_number(&a.into_json()))
                    .collect();
                let first = nums.first().copied().unwrap_or(f64::NAN);
                let n = match method {
                    "floor" => first.floor(),
                    "ceil" => first.ceil(),
                    "round" => (first + 0.5).floor(),
                    "abs" => first.abs(),
                    "min" => nums.iter().copied().fold(f64::INFINITY, f64::min),
                    "max" => nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    "random" => rand::rng().random::<f64>(),
                    _ => return Err(ExecError::unknown_method("Math", method)),
                };
                Ok(ScriptValue::Json(coerce::number(n)))
            }
            Global::String | Global::Number | Global::Boolean => {
                Err(ExecError::unknown_method("global", method))
            }
        }
    }

    fn call_handle(
        &mut self,
        ids: Vec<String>,
        method: &str,
        args: Vec<ScriptValue>,
    ) -> ExecResult<ScriptValue> {
        let mut args = args.into_iter().map(ScriptValue::into_json);
        let first = ids.first().cloned();

        match method {
            "getProperty" => {
                let key = next_text(&mut args);
                Ok(ScriptValue::Json(
                    first
                        .and_then(|id| self.host.property(&id, &key))
                        .unwrap_or(Value::Null),
                ))
            }
            "getStyle" => {
                let key = next_text(&mut args);
                Ok(ScriptValue::Json(
                    first
                        .and_then(|id| self.host.style(&id, &key))
                        .unwrap_or(Value::Null),
                ))
            }
            "getState" => {
                let key = args.next();
                let value = first.and_then(|id| match key {
                    Some(key) => self.host.state_value(&id, &to_text(&key)),
                    None => self.host.properties(&id).map(Value::Object),
                });
                Ok(ScriptValue::Json(value.unwrap_or(Value::Null)))
            }
            "setProperty" | "setStyle" => {
                let key = next_text(&mut args);
                let value = args.next().unwrap_or(Value::Null);
                for id in &ids {
                    let done = if method == "setProperty" {
                        self.host.set_property(id, &key, value.clone())
                    } else {
                        self.host.set_style(id, &key, value.clone())
                    };
                    if done {
                        self.touched.insert(id.clone());
                    }
                }
                Ok(ScriptValue::Handle(ids))
            }
            "addClass" | "removeClass" => {
                let class = next_text(&mut args);
                for id in &ids {
                    let done = if method == "addClass" {
                        self.host.add_class(id, &class)
                    } else {
                        self.host.remove_class(id, &class)
                    };
                    if done {
                        self.touched.insert(id.clone());
                    }
                }
                Ok(ScriptValue::Handle(ids))
            }
            "show" | "hide" => {
                for id in &ids {
                    if self.host.set_hidden(id, method == "hide") {
                        self.touched.insert(id.clone());
                    }
                }
                Ok(ScriptValue::Handle(ids))
            }
            "emit" => {
                let point = next_text(&mut args);
                let value = args.next().unwrap_or(Value::Null);
                for id in &ids {
                    self.host.emit(id, &point, value.clone());
                    self.touched.insert(id.clone());
                }
                Ok(ScriptValue::Handle(ids))
            }
            _ => Err(ExecError::unknown_method("component handle", method)),
        }
    }
}

// ----------------------------------------------------------------------
// Value helpers
// ----------------------------------------------------------------------

/// Walk `value` until it is known to fit the size budget
fn check_size(value: &Value) -> ExecResult<()> {
    let mut budget = MAX_VALUE_SIZE;
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        let cost = 1 + match value {
            Value::String(s) => s.len(),
            Value::Array(items) => {
                pending.extend(items);
                0
            }
            Value::Object(map) => {
                pending.extend(map.values());
                map.keys().map(String::len).sum()
            }
            _ => 0,
        };
        budget = budget
            .checked_sub(cost)
            .ok_or(ExecError::TooLarge { limit: MAX_VALUE_SIZE })?;
    }
    Ok(())
}

fn checked(value: Value) -> ExecResult<Value> {
    check_size(&value)?;
    Ok(value)
}

fn next_text(args: &mut impl Iterator<Item = Value>) -> String {
    args.next().map(|v| to_text(&v)).unwrap_or_default()
}

fn first_json(args: Vec<ScriptValue>) -> Option<Value> {
    args.into_iter().next().map(ScriptValue::into_json)
}

fn add(left: &Value, right: &Value) -> Value {
    let textual = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if textual(left) || textual(right) {
        Value::String(format!("{}{}", to_text(left), to_text(right)))
    } else {
        coerce::number(to_number(left) + to_number(right))
    }
}

fn binary(op: BinaryOp, left: &ScriptValue, right: &ScriptValue) -> Value {
    let (l, r) = match (left.as_json(), right.as_json()) {
        (Some(l), Some(r)) => (l, r),
        // Host-only values only compare by identity
        _ => {
            return Value::Bool(match op {
                BinaryOp::Eq | BinaryOp::StrictEq => left == right,
                BinaryOp::Ne | BinaryOp::StrictNe => left != right,
                _ => false,
            })
        }
    };

    let arith = |f: fn(f64, f64) -> f64| coerce::number(f(to_number(l), to_number(r)));
    match op {
        BinaryOp::Add => add(l, r),
        BinaryOp::Sub => arith(|a, b| a - b),
        BinaryOp::Mul => arith(|a, b| a * b),
        BinaryOp::Div => arith(|a, b| a / b),
        BinaryOp::Rem => arith(|a, b| a % b),
        BinaryOp::Eq => Value::Bool(loose_eq(l, r)),
        BinaryOp::Ne => Value::Bool(!loose_eq(l, r)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(l, r)),
        BinaryOp::StrictNe => Value::Bool(!strict_eq(l, r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (l, r) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => to_number(l).partial_cmp(&to_number(r)),
            };
            Value::Bool(ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            }))
        }
        BinaryOp::And | BinaryOp::Or => Value::Null,
    }
}

fn member(base: &ScriptValue, name: &str) -> ScriptValue {
    let value = match base {
        ScriptValue::Json(Value::String(s)) if name == "length" => Value::from(s.chars().count()),
        ScriptValue::Json(Value::Array(items)) if name == "length" => Value::from(items.len()),
        ScriptValue::Json(Value::Object(map)) => map.get(name).cloned().unwrap_or(Value::Null),
        ScriptValue::Handle(ids) => match name {
            "id" => ids.first().cloned().map(Value::String).unwrap_or(Value::Null),
            "length" => Value::from(ids.len()),
            _ => Value::Null,
        },
        ScriptValue::Global(Global::Math) => match name {
            "PI" => coerce::number(std::f64::consts::PI),
            "E" => coerce::number(std::f64::consts::E),
            _ => Value::Null,
        },
        _ => Value::Null,
    };
    ScriptValue::Json(value)
}

fn array_index(len: usize, index: &Value) -> Option<usize> {
    let n = to_number(index);
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && (n as usize) < len {
        Some(n as usize)
    } else {
        None
    }
}

fn index_value(base: &ScriptValue, index: &Value) -> Value {
    match base.as_json() {
        Some(Value::Array(items)) => array_index(items.len(), index)
            .map(|i| items[i].clone())
            .unwrap_or(Value::Null),
        Some(Value::Object(map)) => map.get(&to_text(index)).cloned().unwrap_or(Value::Null),
        Some(Value::String(s)) => {
            let chars: Vec<char> = s.chars().collect();
            array_index(chars.len(), index)
                .map(|i| Value::String(chars[i].to_string()))
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn write_path(data: &mut Value, path: &[PathSeg], value: Value) -> ExecResult<()> {
    let Some((seg, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };

    let slot = match (data, seg) {
        (Value::Object(map), PathSeg::Key(key)) => map.entry(key.clone()).or_insert(Value::Null),
        (Value::Object(map), PathSeg::Index(index)) => {
            map.entry(to_text(index)).or_insert(Value::Null)
        }
        (Value::Array(items), PathSeg::Index(index)) => {
            let n = to_number(index);
            if !(n.is_finite() && n >= 0.0 && n.fract() == 0.0) {
                return Err(ExecError::InvalidTarget);
            }
            if n > (items.len() + MAX_INDEX_GAP) as f64 {
                return Err(ExecError::IndexOutOfRange {
                    index: n,
                    len: items.len(),
                });
            }
            let i = n as usize;
            if i >= items.len() {
                items.resize(i + 1, Value::Null);
            }
            &mut items[i]
        }
        _ => return Err(ExecError::InvalidTarget),
    };

    if !rest.is_empty() && slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    write_path(slot, rest, value)
}

/// Resolve JS-style slice bounds against a length
fn slice_bounds(len: usize, start: Option<&Value>, end: Option<&Value>) -> (usize, usize) {
    let resolve = |v: Option<&Value>, default: usize| -> usize {
        match v {
            None | Some(Value::Null) => default,
            Some(v) => {
                let n = to_number(v);
                if n.is_nan() {
                    0
                } else if n < 0.0 {
                    len.saturating_sub((-n) as usize)
                } else {
                    (n as usize).min(len)
                }
            }
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}

fn call_value_method(value: &Value, method: &str, args: Vec<ScriptValue>) -> ExecResult<ScriptValue> {
    let args: Vec<Value> = args.into_iter().map(ScriptValue::into_json).collect();
    let arg_text = |i: usize| args.get(i).map(to_text).unwrap_or_default();

    if method == "toString" {
        return Ok(ScriptValue::Json(Value::String(to_text(value))));
    }

    let result = match value {
        Value::String(s) => match method {
            "toUpperCase" => Value::String(s.to_uppercase()),
            "toLowerCase" => Value::String(s.to_lowercase()),
            "trim" => Value::String(s.trim().to_string()),
            "includes" => Value::Bool(s.contains(&arg_text(0))),
            "startsWith" => Value::Bool(s.starts_with(&arg_text(0))),
            "endsWith" => Value::Bool(s.ends_with(&arg_text(0))),
            "indexOf" => {
                let needle = arg_text(0);
                match s.find(&needle) {
                    Some(byte) => Value::from(s[..byte].chars().count()),
                    None => Value::from(-1),
                }
            }
            "split" => {
                let sep = arg_text(0);
                let parts: Vec<Value> = if sep.is_empty() {
                    s.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect()
                };
                Value::Array(parts)
            }
            "slice" | "substring" => {
                let chars: Vec<char> = s.chars().collect();
                let (start, end) = slice_bounds(chars.len(), args.first(), args.get(1));
                Value::String(chars[start..end].iter().collect())
            }
            "concat" => Value::String(
                std::iter::once(s.clone())
                    .chain(args.iter().map(to_text))
                    .collect(),
            ),
            "reverse" => Value::String(s.chars().rev().collect()),
            "replace" => Value::String(s.replacen(&arg_text(0), &arg_text(1), 1)),
            "charAt" => {
                let index = args.first().cloned().unwrap_or(Value::from(0));
                index_value(&ScriptValue::Json(value.clone()), &index)
            }
            _ => return Err(ExecError::unknown_method("string", method)),
        },
        Value::Array(items) => match method {
            "join" => {
                let sep = if args.is_empty() {
                    ",".to_string()
                } else {
                    arg_text(0)
                };
                let parts: Vec<String> = items.iter().map(to_text).collect();
                let total = parts.iter().map(String::len).sum::<usize>()
                    + sep.len().saturating_mul(parts.len().saturating_sub(1));
                if total > MAX_VALUE_SIZE {
                    return Err(ExecError::TooLarge { limit: MAX_VALUE_SIZE });
                }
                Value::String(parts.join(sep.as_str()))
            }
            "slice" => {
                let (start, end) = slice_bounds(items.len(), args.first(), args.get(1));
                Value::Array(items[start..end].to_vec())
            }
            "reverse" => Value::Array(items.iter().rev().cloned().collect()),
            "concat" => {
                let mut out = items.clone();
                for arg in args {
                    match arg {
                        Value::Array(more) => out.extend(more),
                        other => out.push(other),
                    }
                }
                Value::Array(out)
            }
            "includes" => {
                let needle = args.first().cloned().unwrap_or(Value::Null);
                Value::Bool(items.iter().any(|i| strict_eq(i, &needle)))
            }
            "indexOf" => {
                let needle = args.first().cloned().unwrap_or(Value::Null);
                items
                    .iter()
                    .position(|i| strict_eq(i, &needle))
                    .map_or(Value::from(-1), Value::from)
            }
            _ => return Err(ExecError::unknown_method("array", method)),
        },
        Value::Number(n) => match method {
            "toFixed" => {
                let digits = args.first().map_or(0.0, to_number).clamp(0.0, 20.0) as usize;
                Value::String(format!("{:.*}", digits, n.as_f64().unwrap_or(f64::NAN)))
            }
            _ => return Err(ExecError::unknown_method("number", method)),
        },
        _ => {
            return Err(ExecError::type_error(format!(
                "cannot call '{}' on {}",
                method,
                if value.is_null() { "null" } else { "this value" }
            )))
        }
    };
    checked(result).map(ScriptValue::Json)
}
