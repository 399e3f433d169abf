//! Runtime value representation.
//!
//! Evaluation produces the following data types:
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - float (IEEE-754 double, distinct from integer)
//! - string (utf-8)
//! - array (list of values)
//! - object (order-preserving map with string keys)
//!
//! Operator semantics live in the evaluator; this module only holds the
//! representation, rendering, and the conversion boundary to native
//! (`serde_json`) values.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Object(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::String(value) => {
                write!(f, "\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Convert a value into the native `serde_json` form.
///
/// Total over the obvious mappings; non-finite floats have no JSON number
/// form and become null.
pub fn to_native(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(value) => serde_json::Value::Bool(*value),
        Value::Int(value) => serde_json::Value::Number((*value).into()),
        Value::Float(value) => serde_json::Number::from_f64(*value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(value) => serde_json::Value::String(value.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_native).collect()),
        Value::Object(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), to_native(value)))
                .collect(),
        ),
    }
}

/// Convert a native `serde_json` value into a runtime value. Numbers that
/// fit i64 become integers, everything else becomes a float.
pub fn from_native(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(value) => Value::Bool(value),
        serde_json::Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Value::Int(int)
            } else {
                Value::Float(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(value) => Value::String(value),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(from_native).collect())
        }
        serde_json::Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key, from_native(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_native_values_both_ways() {
        let native = json!({
            "name": "web",
            "count": 3,
            "ratio": 0.5,
            "tags": ["a", "b"],
            "nested": {"enabled": true, "extra": null},
        });

        let value = from_native(native.clone());
        assert_eq!(
            value,
            Value::from_iter([
                ("name", Value::from("web")),
                ("count", Value::Int(3)),
                ("ratio", Value::Float(0.5)),
                ("tags", Value::from(vec!["a", "b"])),
                (
                    "nested",
                    Value::from_iter([("enabled", Value::Bool(true)), ("extra", Value::Null)])
                ),
            ])
        );
        assert_eq!(to_native(&value), native);
    }

    #[test]
    fn object_preserves_insertion_order() {
        let value = from_native(json!({"b": 1, "a": 2}));
        let keys: Vec<&String> = value.as_object().expect("object").keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn integers_and_floats_stay_distinct() {
        assert_eq!(from_native(json!(1)), Value::Int(1));
        assert_eq!(from_native(json!(1.0)), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn displays_values_hcl_style() {
        let value = Value::from_iter([
            ("a", Value::Int(1)),
            ("b", Value::from(vec![Value::from("x"), Value::Null])),
        ]);
        assert_eq!(value.to_string(), r#"{a = 1, b = ["x", null]}"#);
    }

    #[test]
    fn serializes_to_json() {
        let value = Value::from_iter([("a", Value::Int(1)), ("b", Value::from("x"))]);
        assert_eq!(
            serde_json::to_string(&value).expect("serialize failed"),
            r#"{"a":1,"b":"x"}"#
        );
    }
}
