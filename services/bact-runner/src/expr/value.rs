//! Dynamic value model for expression evaluation.
//!
//! Expressions operate on JavaScript-like values: `null` and `undefined` are
//! distinct, numbers are either integers or floats, and objects map string
//! keys to nested values. Host data (contexts, `fromJSON` results) is
//! projected into this model before evaluation.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A string-keyed object of dynamic values.
pub type JsObject = BTreeMap<String, JsValue>;

/// A dynamic value as seen by the expression language.
///
/// Exactly one variant is ever active. Integer and float are distinct
/// variants but compare equal when numerically equal.
#[derive(Debug, Clone)]
pub enum JsValue {
    Null,
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<JsValue>),
    Object(JsObject),
}

/// The variant tag of a [`JsValue`], used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsType {
    Object,
    Array,
    String,
    Number,
    Int,
    Boolean,
    Null,
    Undefined,
}

impl fmt::Display for JsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JsType::Object => "object",
            JsType::Array => "array",
            JsType::String => "string",
            JsType::Number => "number",
            JsType::Int => "int",
            JsType::Boolean => "boolean",
            JsType::Null => "null",
            JsType::Undefined => "undefined",
        };
        f.write_str(s)
    }
}

/// One segment of an access path: a string key, an integer index, or the
/// `*` splat.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Key(String),
    Index(i64),
    Splat,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{k:?}"),
            PathSegment::Index(i) => write!(f, "{i}"),
            PathSegment::Splat => f.write_str("*"),
        }
    }
}

/// Error raised when an access path hits a value that cannot be indexed.
#[derive(Debug, Clone, Error)]
#[error("TypeError: Cannot read properties of {kind} (reading {segment})")]
pub struct AccessError {
    pub kind: JsType,
    pub segment: PathSegment,
}

/// Error raised when a host value cannot be projected into a [`JsValue`].
#[derive(Debug, Error)]
#[error("cannot convert value into an expression value: {0}")]
pub struct ConvertError(#[from] serde_json::Error);

impl PartialEq for JsValue {
    /// Structural equality, except that an integer equals a float with the
    /// same numeric value.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsValue::Null, JsValue::Null) | (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Bool(l), JsValue::Bool(r)) => l == r,
            (JsValue::String(l), JsValue::String(r)) => l == r,
            (JsValue::Array(l), JsValue::Array(r)) => l == r,
            (JsValue::Object(l), JsValue::Object(r)) => l == r,
            (l, r) => match (l.as_number(), r.as_number()) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            },
        }
    }
}

impl JsValue {
    /// The variant tag of this value.
    pub fn kind(&self) -> JsType {
        match self {
            JsValue::Object(_) => JsType::Object,
            JsValue::Array(_) => JsType::Array,
            JsValue::String(_) => JsType::String,
            JsValue::Float(_) => JsType::Number,
            JsValue::Int(_) => JsType::Int,
            JsValue::Bool(_) => JsType::Boolean,
            JsValue::Null => JsType::Null,
            JsValue::Undefined => JsType::Undefined,
        }
    }

    /// JavaScript-style truthiness: `true`, non-empty strings, non-zero
    /// numbers, and any array or object are truthy.
    pub fn truthy(&self) -> bool {
        match self {
            JsValue::Bool(b) => *b,
            JsValue::Object(_) | JsValue::Array(_) => true,
            JsValue::Float(f) => *f != 0.0,
            JsValue::Int(i) => *i != 0,
            JsValue::String(s) => !s.is_empty(),
            JsValue::Null | JsValue::Undefined => false,
        }
    }

    /// Whether this value is already numeric.
    pub fn is_number(&self) -> bool {
        matches!(self, JsValue::Int(_) | JsValue::Float(_))
    }

    /// The numeric value of an int or float variant.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Int(i) => Some(*i as f64),
            JsValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Walk an access path.
    ///
    /// Missing object keys and out-of-range array indices resolve to
    /// `undefined`; indexing into scalars is a type error.
    pub fn access(&self, path: &[PathSegment]) -> Result<JsValue, AccessError> {
        let Some((head, rest)) = path.split_first() else {
            return Ok(self.clone());
        };

        match self {
            JsValue::Object(obj) => match head {
                PathSegment::Splat => {
                    let mut out = Vec::with_capacity(obj.len());
                    for item in obj.values() {
                        out.push(item.access(rest)?);
                    }
                    Ok(JsValue::Array(out))
                }
                PathSegment::Key(key) => match obj.get(key) {
                    Some(v) => v.access(rest),
                    None => Ok(JsValue::Undefined),
                },
                PathSegment::Index(idx) => match obj.get(&idx.to_string()) {
                    Some(v) => v.access(rest),
                    None => Ok(JsValue::Undefined),
                },
            },
            JsValue::Array(arr) => match head {
                PathSegment::Splat => {
                    let mut out = Vec::with_capacity(arr.len());
                    for item in arr {
                        out.push(item.access(rest)?);
                    }
                    Ok(JsValue::Array(out))
                }
                PathSegment::Index(idx) => {
                    if *idx < 0 || *idx as usize >= arr.len() {
                        return Ok(JsValue::Undefined);
                    }
                    arr[*idx as usize].access(rest)
                }
                PathSegment::Key(_) => Err(AccessError {
                    kind: JsType::Array,
                    segment: head.clone(),
                }),
            },
            JsValue::String(s) => {
                let PathSegment::Index(idx) = head else {
                    return Err(AccessError {
                        kind: JsType::String,
                        segment: head.clone(),
                    });
                };
                let chars: Vec<char> = s.chars().collect();
                if *idx < 0 || *idx as usize >= chars.len() {
                    return Err(AccessError {
                        kind: JsType::String,
                        segment: head.clone(),
                    });
                }
                JsValue::String(chars[*idx as usize].to_string()).access(rest)
            }
            other => Err(AccessError {
                kind: other.kind(),
                segment: head.clone(),
            }),
        }
    }

    /// Project any serializable host value into a [`JsValue`].
    ///
    /// Serde rename attributes on context structs are what make
    /// `github.repository_owner_id` resolve the right field.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<JsValue, ConvertError> {
        let json = serde_json::to_value(value)?;
        Ok(JsValue::from_json(&json))
    }

    /// Convert a parsed JSON document into a [`JsValue`].
    pub fn from_json(value: &serde_json::Value) -> JsValue {
        match value {
            serde_json::Value::Null => JsValue::Null,
            serde_json::Value::Bool(b) => JsValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    JsValue::Int(i)
                } else {
                    JsValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => JsValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                JsValue::Array(items.iter().map(JsValue::from_json).collect())
            }
            serde_json::Value::Object(map) => JsValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), JsValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Compact JSON form of this value.
    ///
    /// `undefined` marshals to the bare token `undefined`. That is not valid
    /// JSON, but it matches what GitHub emits and callers depend on it.
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out, None, 0);
        out
    }

    /// Pretty-printed JSON with two-space indentation, as produced by the
    /// `toJSON` builtin.
    pub fn to_json_pretty(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out, Some("  "), 0);
        out
    }

    fn write_json(&self, out: &mut String, indent: Option<&str>, level: usize) {
        let pad = |out: &mut String, level: usize| {
            if let Some(unit) = indent {
                out.push('\n');
                for _ in 0..level {
                    out.push_str(unit);
                }
            }
        };

        match self {
            JsValue::Null => out.push_str("null"),
            JsValue::Undefined => out.push_str("undefined"),
            JsValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            JsValue::Int(i) => out.push_str(&i.to_string()),
            JsValue::Float(f) => out.push_str(&format_float(*f)),
            JsValue::String(s) => out.push_str(&escape_json_string(s)),
            JsValue::Array(items) => {
                if items.is_empty() {
                    out.push_str("[]");
                    return;
                }
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    pad(out, level + 1);
                    item.write_json(out, indent, level + 1);
                }
                pad(out, level);
                out.push(']');
            }
            JsValue::Object(map) => {
                if map.is_empty() {
                    out.push_str("{}");
                    return;
                }
                out.push('{');
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    pad(out, level + 1);
                    out.push_str(&escape_json_string(key));
                    out.push(':');
                    if indent.is_some() {
                        out.push(' ');
                    }
                    item.write_json(out, indent, level + 1);
                }
                pad(out, level);
                out.push('}');
            }
        }
    }
}

/// Shortest round-trip decimal form of a float. Non-finite values fall back
/// to `null` like JSON serializers do.
fn format_float(f: f64) -> String {
    if !f.is_finite() {
        return "null".to_string();
    }
    f.to_string()
}

fn escape_json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, JsValue)]) -> JsValue {
        JsValue::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_truthiness() {
        assert!(JsValue::Bool(true).truthy());
        assert!(!JsValue::Bool(false).truthy());
        assert!(!JsValue::Null.truthy());
        assert!(!JsValue::Undefined.truthy());
        assert!(JsValue::Int(1).truthy());
        assert!(!JsValue::Int(0).truthy());
        assert!(JsValue::Float(0.5).truthy());
        assert!(!JsValue::Float(0.0).truthy());
        assert!(JsValue::String("x".into()).truthy());
        assert!(!JsValue::String(String::new()).truthy());
        assert!(JsValue::Array(vec![]).truthy());
        assert!(JsValue::Object(JsObject::new()).truthy());
    }

    #[test]
    fn test_access_missing_key_is_undefined() {
        let v = obj(&[("a", JsValue::Int(1))]);
        let got = v.access(&[PathSegment::Key("missing".into())]).unwrap();
        assert_eq!(got, JsValue::Undefined);
    }

    #[test]
    fn test_access_array_out_of_range_is_undefined() {
        let v = JsValue::Array(vec![JsValue::Int(1)]);
        assert_eq!(v.access(&[PathSegment::Index(5)]).unwrap(), JsValue::Undefined);
        assert_eq!(v.access(&[PathSegment::Index(-1)]).unwrap(), JsValue::Undefined);
    }

    #[test]
    fn test_access_object_by_integer_uses_decimal_key() {
        let v = obj(&[("2", JsValue::String("two".into()))]);
        let got = v.access(&[PathSegment::Index(2)]).unwrap();
        assert_eq!(got, JsValue::String("two".into()));
    }

    #[test]
    fn test_access_splat_over_array() {
        let v = JsValue::Array(vec![
            obj(&[("name", JsValue::String("a".into()))]),
            obj(&[("name", JsValue::String("b".into()))]),
        ]);
        let got = v
            .access(&[PathSegment::Splat, PathSegment::Key("name".into())])
            .unwrap();
        assert_eq!(
            got,
            JsValue::Array(vec![
                JsValue::String("a".into()),
                JsValue::String("b".into())
            ])
        );
    }

    #[test]
    fn test_access_string_by_index() {
        let v = JsValue::String("hey".into());
        assert_eq!(
            v.access(&[PathSegment::Index(1)]).unwrap(),
            JsValue::String("e".into())
        );
        let err = v.access(&[PathSegment::Index(10)]).unwrap_err();
        assert!(err.to_string().contains("Cannot read properties of string"));
    }

    #[test]
    fn test_access_scalar_errors() {
        let err = JsValue::Int(3)
            .access(&[PathSegment::Key("x".into())])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot read properties of int (reading \"x\")"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let v = obj(&[
            ("n", JsValue::Int(42)),
            ("f", JsValue::Float(0.5)),
            ("s", JsValue::String("hi\n".into())),
            ("a", JsValue::Array(vec![JsValue::Bool(true), JsValue::Null])),
        ]);
        let json = v.to_json();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, JsValue::from_json(&parsed));
    }

    #[test]
    fn test_undefined_marshals_to_bare_token() {
        assert_eq!(JsValue::Undefined.to_json(), "undefined");
    }

    #[test]
    fn test_int_and_float_equal_when_numerically_equal() {
        assert_eq!(JsValue::Int(42), JsValue::Float(42.0));
        assert_ne!(JsValue::Int(42), JsValue::Float(42.5));
        assert_ne!(JsValue::Null, JsValue::Undefined);
    }

    #[test]
    fn test_pretty_json_indentation() {
        let v = obj(&[("a", JsValue::Int(1))]);
        assert_eq!(v.to_json_pretty(), "{\n  \"a\": 1\n}");
    }
}
