use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

/// A value attached to a log record.
///
/// The set of shapes is closed; anything else enters through
/// [`AttributeValue::display`] or [`AttributeValue::debug`] and is stored as
/// its string form.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
    List(Vec<AttributeValue>),
    /// Ordered key/value pairs.
    Map(Vec<(String, AttributeValue)>),
}

impl AttributeValue {
    /// Stringify fallback for values without a dedicated shape.
    pub fn display(value: impl fmt::Display) -> Self {
        AttributeValue::Str(value.to_string())
    }

    pub fn debug(value: impl fmt::Debug) -> Self {
        AttributeValue::Str(format!("{:?}", value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_str(&self) -> bool {
        matches!(self, AttributeValue::Str(_))
    }

    /// Short name of the shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Int(_) => "int",
            AttributeValue::Float(_) => "float",
            AttributeValue::Str(_) => "str",
            AttributeValue::Timestamp(_) => "timestamp",
            AttributeValue::List(_) => "list",
            AttributeValue::Map(_) => "map",
        }
    }

    /// Compact JSON rendering.
    pub fn to_json_string(&self) -> String {
        // Every shape maps onto JSON and map keys are strings.
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn serialize_float<S: Serializer>(f: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if f.is_finite() {
        serializer.serialize_f64(f)
    } else {
        serializer.serialize_str(&f.to_string())
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttributeValue::Null => serializer.serialize_unit(),
            AttributeValue::Bool(b) => serializer.serialize_bool(*b),
            AttributeValue::Int(i) => serializer.serialize_i64(*i),
            AttributeValue::Float(f) => serialize_float(*f, serializer),
            AttributeValue::Str(s) => serializer.serialize_str(s),
            AttributeValue::Timestamp(ts) => serialize_timestamp(ts, serializer),
            AttributeValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            AttributeValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Str(s) => f.write_str(s),
            AttributeValue::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            other => f.write_str(&other.to_json_string()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Str(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Str(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v.into())
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        AttributeValue::Int(v.into())
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => AttributeValue::Int(i),
            Err(_) => AttributeValue::Str(v.to_string()),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttributeValue::Timestamp(v)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(v: Vec<T>) -> Self {
        AttributeValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => n
                    .as_f64()
                    .map(AttributeValue::Float)
                    .unwrap_or_else(|| AttributeValue::Str(n.to_string())),
            },
            Value::String(s) => AttributeValue::Str(s),
            Value::Array(items) => AttributeValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                AttributeValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}
