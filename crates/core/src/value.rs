//! Dynamically-typed result values and their canonical display form.

use serde::{Deserialize, Serialize};

/// A computed formula result.
///
/// Values are tagged variants rather than type-erased handles so they can be
/// passed directly through the evaluator calling convention and formatted
/// without runtime reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent result; also what a failed dependency releases to its readers.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// String, rendered verbatim.
    Str(String),
    /// Anything else, rendered generically as JSON.
    Other(serde_json::Value),
}

impl Value {
    /// The runtime kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Uint(_) => ValueKind::Uint,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::Str(_) => ValueKind::Str,
            Value::Other(_) => ValueKind::Other,
        }
    }

    /// Whether this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl std::fmt::Display for Value {
    /// Canonical display string: booleans as `true`/`false`, integers in
    /// base 10, floats in their shortest round-trippable decimal form,
    /// strings verbatim, everything else as compact JSON.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}", u),
            Value::Float32(x) => write!(f, "{}", x),
            Value::Float64(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float64(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// The runtime type of a [`Value`], for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    /// No value.
    Null,
    /// Boolean.
    Bool,
    /// Signed integer.
    Int,
    /// Unsigned integer.
    Uint,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// String.
    Str,
    /// Opaque value.
    Other,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Uint => "uint",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
            ValueKind::Str => "string",
            ValueKind::Other => "other",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bool() {
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }

    #[test]
    fn format_integers() {
        assert_eq!(Value::Int(4).to_string(), "4");
        assert_eq!(Value::Int(-17).to_string(), "-17");
        assert_eq!(Value::Uint(18_446_744_073_709_551_615).to_string(), "18446744073709551615");
    }

    #[test]
    fn format_floats_shortest_roundtrip() {
        assert_eq!(Value::Float64(2.5).to_string(), "2.5");
        assert_eq!(Value::Float64(10.0).to_string(), "10");
        assert_eq!(Value::Float64(0.1).to_string(), "0.1");
        assert_eq!(Value::Float32(1.5).to_string(), "1.5");
    }

    #[test]
    fn format_string_verbatim() {
        assert_eq!(Value::Str("hello world".into()).to_string(), "hello world");
        assert_eq!(Value::Str(String::new()).to_string(), "");
    }

    #[test]
    fn format_null_and_other() {
        assert_eq!(Value::Null.to_string(), "null");
        let other = Value::Other(serde_json::json!({"a": [1, 2]}));
        assert_eq!(other.to_string(), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::Int(1).kind().to_string(), "int");
        assert_eq!(Value::Float64(1.0).kind(), ValueKind::Float64);
        assert!(Value::Null.is_null());
        assert!(!Value::Int(0).is_null());
    }
}
