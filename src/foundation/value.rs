//! Dynamic value model
//!
//! Validators operate on untrusted, dynamically shaped input (form posts,
//! RPC payloads), so the engine works over a small dynamic [`Value`] enum
//! rather than typed Rust structs. `Missing` is a first-class state: a
//! declared field that was absent from the input validates against
//! `Value::Missing`, which lets required-field errors surface uniformly.

use std::fmt;

use indexmap::IndexMap;

// ============================================================================
// VALUE
// ============================================================================

/// A dynamically typed input value.
///
/// Maps preserve insertion order, which is semantic: schema results are
/// returned in field declaration order.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::foundation::Value;
///
/// let v = Value::from("hello");
/// assert_eq!(v.as_str(), Some("hello"));
/// assert_eq!(v.kind(), "string");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Sentinel for an absent field. Distinct from `Null`.
    #[default]
    Missing,
    /// An explicit null.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

/// Presence classification of a value, dispatched once before any
/// value-specific logic runs.
///
/// Every validator branches on this triple: `Missing` and `Blank` have
/// dedicated handlers (`on_missing` / `on_blank`) that absence-state leaf
/// validators override independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The field was absent from the input.
    Missing,
    /// The field was present but empty: `Null`, `""`, `[]` or `{}`.
    Blank,
    /// The field holds a usable value.
    Present,
}

impl Value {
    /// Classifies this value as missing, blank or present.
    #[must_use]
    pub fn presence(&self) -> Presence {
        match self {
            Value::Missing => Presence::Missing,
            Value::Null => Presence::Blank,
            Value::Str(s) if s.is_empty() => Presence::Blank,
            Value::List(l) if l.is_empty() => Presence::Blank,
            Value::Map(m) if m.is_empty() => Presence::Blank,
            _ => Presence::Present,
        }
    }

    /// Returns true for the `Missing` sentinel.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Returns true if the value is blank (present but empty).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.presence() == Presence::Blank
    }

    /// A short name for the value's kind, used in `{value.type}` message
    /// params.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Missing => "missing",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Normalizes blank-like values to `Null`.
    ///
    /// Assigning `""`, `[]` or `{}` to a context stores `Null` instead, so
    /// blank detection does not depend on the input's concrete shape.
    #[must_use]
    pub fn normalized(self) -> Value {
        match &self {
            Value::Str(s) if s.is_empty() => Value::Null,
            Value::List(l) if l.is_empty() => Value::Null,
            Value::Map(m) if m.is_empty() => Value::Null,
            _ => self,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Element/character count for sized values.
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Looks up a map entry or list index. `Missing` for absent keys.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Map(m) => m.get(key).cloned().unwrap_or(Value::Missing),
            Value::List(l) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| l.get(i).cloned())
                .unwrap_or(Value::Missing),
            _ => Value::Missing,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(_) | Value::Map(_) => {
                write!(f, "{}", serde_json::Value::from(self.clone()))
            }
        }
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

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

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl serde::Serialize for Value {
    /// `Missing` and `Null` both serialize as null; the distinction is an
    /// evaluation-time concern, not a wire one.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Missing | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(l) => l.serialize(serializer),
            Value::Map(m) => m.serialize(serializer),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Missing | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Value::from(f),
            Value::Str(s) => serde_json::Value::String(s),
            Value::List(l) => {
                serde_json::Value::Array(l.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Map(m) => serde_json::Value::Object(
                m.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_dispatch() {
        assert_eq!(Value::Missing.presence(), Presence::Missing);
        assert_eq!(Value::Null.presence(), Presence::Blank);
        assert_eq!(Value::from("").presence(), Presence::Blank);
        assert_eq!(Value::List(vec![]).presence(), Presence::Blank);
        assert_eq!(Value::from("x").presence(), Presence::Present);
        assert_eq!(Value::from(0).presence(), Presence::Present);
        assert_eq!(Value::Bool(false).presence(), Presence::Present);
    }

    #[test]
    fn test_normalized_blanks() {
        assert_eq!(Value::from("").normalized(), Value::Null);
        assert_eq!(Value::List(vec![]).normalized(), Value::Null);
        assert_eq!(Value::Map(IndexMap::new()).normalized(), Value::Null);
        assert_eq!(Value::from("x").normalized(), Value::from("x"));
    }

    #[test]
    fn test_json_roundtrip() {
        let json: serde_json::Value = serde_json::json!({
            "name": "bob",
            "age": 42,
            "tags": ["a", "b"],
        });
        let value = Value::from(json.clone());
        assert_eq!(value.get("name"), Value::from("bob"));
        assert_eq!(value.get("age"), Value::from(42));
        assert_eq!(serde_json::Value::from(value), json);
    }

    #[test]
    fn test_get_on_lists_and_maps() {
        let v = Value::List(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(v.get("1"), Value::from("b"));
        assert_eq!(v.get("9"), Value::Missing);
        assert_eq!(v.get("x"), Value::Missing);
    }

    #[test]
    fn test_serialize() {
        let value = Value::Map(
            [
                ("a".to_string(), Value::from(1)),
                ("b".to_string(), Value::Missing),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"a":1,"b":null}"#
        );
    }

    #[test]
    fn test_length_counts_chars() {
        assert_eq!(Value::from("héllo").length(), Some(5));
        assert_eq!(Value::from(42).length(), None);
    }
}
