//! Connection transforms
//!
//! A [`Transform`] maps the value emitted on a source point to the value
//! written on a target point. The built-in library is looked up by name;
//! arithmetic transforms take their operand after a colon (`add:5`) and
//! `randomNumber` takes an optional range (`randomNumber:1:6`).

use rand::Rng;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::coerce::{number, to_number, to_text, truthy};

type TransformFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Named value transform
#[derive(Clone)]
pub struct Transform {
    name: String,
    func: TransformFn,
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform").field("name", &self.name).finish()
    }
}

/// Names understood by [`Transform::builtin`]
pub const BUILTIN_TRANSFORMS: &[&str] = &[
    "identity",
    "toString",
    "toNumber",
    "toUpperCase",
    "toLowerCase",
    "capitalize",
    "reverse",
    "negate",
    "add",
    "subtract",
    "multiply",
    "divide",
    "clear",
    "randomPosition",
    "randomNumber",
];

/// Range of `randomPosition` coordinates, in pixels
const POSITION_RANGE: std::ops::RangeInclusive<i64> = 0..=300;

impl Transform {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn identity() -> Self {
        Self::new("identity", Value::clone)
    }

    /// Always produces `value`
    pub fn constant(value: Value) -> Self {
        Self::new("constant", move |_| value.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, value: &Value) -> Value {
        (self.func)(value)
    }

    /// Is `name` (without arguments) part of the built-in library
    pub fn is_builtin_name(name: &str) -> bool {
        let base = name.split(':').next().unwrap_or(name).trim();
        BUILTIN_TRANSFORMS.contains(&base)
    }

    /// Look up a library transform by name
    ///
    /// Returns `None` for unknown names and for known names with malformed
    /// arguments; the caller decides whether to treat the text as code.
    pub fn builtin(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let mut parts = spec.split(':').map(str::trim);
        let base = parts.next()?;
        let args: Vec<&str> = parts.collect();

        let transform = match (base, args.as_slice()) {
            ("identity", []) => Self::identity(),
            ("toString", []) => Self::new(spec, |v| Value::String(to_text(v))),
            ("toNumber", []) => Self::new(spec, |v| number(to_number(v))),
            ("toUpperCase", []) => Self::new(spec, |v| Value::String(to_text(v).to_uppercase())),
            ("toLowerCase", []) => Self::new(spec, |v| Value::String(to_text(v).to_lowercase())),
            ("capitalize", []) => Self::new(spec, |v| Value::String(capitalize(&to_text(v)))),
            ("reverse", []) => Self::new(spec, reverse),
            ("negate", []) => Self::new(spec, negate),
            ("add", [n]) => arithmetic(spec, n, |a, b| a + b)?,
            ("subtract", [n]) => arithmetic(spec, n, |a, b| a - b)?,
            ("multiply", [n]) => arithmetic(spec, n, |a, b| a * b)?,
            ("divide", [n]) => {
                let divisor: f64 = parse_operand(spec, n)?;
                if divisor == 0.0 {
                    warn!(transform = %spec, "Division by zero, value passes through unchanged");
                    Self::new(spec, Value::clone)
                } else {
                    Self::new(spec, move |v| number(to_number(v) / divisor))
                }
            }
            ("clear", []) => Self::new(spec, |_| Value::String(String::new())),
            ("randomPosition", []) => Self::new(spec, |_| random_position()),
            ("randomNumber", []) => random_number(spec, 0, 100),
            ("randomNumber", [min, max]) => {
                let min: i64 = min.parse().ok()?;
                let max: i64 = max.parse().ok()?;
                if min > max {
                    warn!(transform = %spec, "Empty random range");
                    return None;
                }
                random_number(spec, min, max)
            }
            _ => return None,
        };
        Some(transform)
    }
}

fn parse_operand(spec: &str, raw: &str) -> Option<f64> {
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            warn!(transform = %spec, operand = %raw, "Transform operand is not a number");
            None
        }
    }
}

fn arithmetic(spec: &str, raw: &str, op: fn(f64, f64) -> f64) -> Option<Transform> {
    let operand = parse_operand(spec, raw)?;
    Some(Transform::new(spec, move |v| number(op(to_number(v), operand))))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn reverse(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().rev().cloned().collect()),
        other => Value::String(to_text(other).chars().rev().collect()),
    }
}

fn negate(value: &Value) -> Value {
    match value {
        Value::Number(_) => number(-to_number(value)),
        other => Value::Bool(!truthy(other)),
    }
}

fn random_position() -> Value {
    let mut rng = rand::rng();
    json!({
        "left": rng.random_range(POSITION_RANGE),
        "top": rng.random_range(POSITION_RANGE),
    })
}

fn random_number(spec: &str, min: i64, max: i64) -> Transform {
    Transform::new(spec, move |_| json!(rand::rng().random_range(min..=max)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn run(name: &str, value: Value) -> Value {
        Transform::builtin(name).unwrap().apply(&value)
    }

    #[test_case("toString", json!(42), json!("42") ; "number to string")]
    #[test_case("toNumber", json!("3.5"), json!(3.5) ; "string to number")]
    #[test_case("toUpperCase", json!("abc"), json!("ABC") ; "upper")]
    #[test_case("toLowerCase", json!("AbC"), json!("abc") ; "lower")]
    #[test_case("capitalize", json!("hello world"), json!("Hello world") ; "capitalize")]
    #[test_case("reverse", json!("abc"), json!("cba") ; "reverse text")]
    #[test_case("reverse", json!([1, 2]), json!([2, 1]) ; "reverse array")]
    #[test_case("negate", json!(true), json!(false) ; "negate bool")]
    #[test_case("negate", json!(4), json!(-4) ; "negate number")]
    #[test_case("add:5", json!(1), json!(6) ; "add")]
    #[test_case("subtract:2", json!("10"), json!(8) ; "subtract coerces text")]
    #[test_case("multiply:2.5", json!(2), json!(5) ; "multiply")]
    #[test_case("divide:4", json!(2), json!(0.5) ; "divide")]
    #[test_case("divide:0", json!(7), json!(7) ; "divide by zero passes through")]
    #[test_case("clear", json!("text"), json!("") ; "clear")]
    fn test_builtin(name: &str, input: Value, expected: Value) {
        assert_eq!(run(name, input), expected);
    }

    #[test_case("frobnicate" ; "unknown name")]
    #[test_case("add" ; "missing operand")]
    #[test_case("add:x" ; "bad operand")]
    #[test_case("randomNumber:9:1" ; "empty range")]
    fn test_unresolvable(name: &str) {
        assert!(Transform::builtin(name).is_none());
    }

    #[test]
    fn test_random_number_in_range() {
        let t = Transform::builtin("randomNumber:1:6").unwrap();
        for _ in 0..50 {
            let n = t.apply(&Value::Null).as_i64().unwrap();
            assert!((1..=6).contains(&n));
        }
    }

    #[test]
    fn test_random_position_shape() {
        let pos = run("randomPosition", Value::Null);
        assert!(pos["left"].is_i64());
        assert!(pos["top"].is_i64());
    }

    #[test]
    fn test_is_builtin_name() {
        assert!(Transform::is_builtin_name("add:3"));
        assert!(!Transform::is_builtin_name("value * 2"));
    }

    proptest! {
        #[test]
        fn prop_identity_is_identity(s in ".*", n in any::<i32>(), b in any::<bool>()) {
            let id = Transform::identity();
            for value in [json!(s), json!(n), json!(b), Value::Null] {
                prop_assert_eq!(id.apply(&value), value);
            }
        }

        #[test]
        fn prop_add_then_subtract(n in -1_000_000i64..1_000_000, k in -1000i64..1000) {
            let add = Transform::builtin(&format!("add:{k}")).unwrap();
            let sub = Transform::builtin(&format!("subtract:{k}")).unwrap();
            prop_assert_eq!(sub.apply(&add.apply(&json!(n))), json!(n));
        }
    }
}
