//! Primitive literal values bound by `let`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A classical value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    /// Always finite; NaN and infinity are rejected when parsing.
    Float(f64),
    Bool(bool),
    Text(String),
}

// Float equality is bitwise so that Value can implement Eq. Parsing never
// produces NaN, so the only visible difference from `==` is +0.0 != -0.0.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    /// Interpret a literal token.
    ///
    /// Double-quoted tokens are text with the quotes stripped. `true` and
    /// `false` are booleans, then integers, then finite floats. Anything
    /// else is a bare symbol and becomes text as written.
    pub fn parse_literal(token: &str) -> Value {
        if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
            return Value::Text(token[1..token.len() - 1].to_string());
        }
        match token {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(n) = token.parse::<i64>() {
            return Value::Int(n);
        }
        match token.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Text(token.to_string()),
        }
    }

    /// Name of the primitive type, as reported by the checker.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Text(_) => "Text",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}
