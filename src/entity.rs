//! Records stored in a collection and the rows returned by search/query

use crate::vector::Vector;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A scalar value held in a non-vector field.
///
/// In human-readable formats (JSON) a value is written as the bare scalar,
/// so rows look like `{"subject": "history"}`. Compact formats (bincode)
/// carry an explicit variant tag since they cannot infer the type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Serialize, Deserialize)]
enum Tagged {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Plain {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Compare two values the way a filter expression does: numbers
    /// compare numerically across Int/Float, strings and bools compare
    /// within their own type, anything else is incomparable.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(a.cmp(b)),
            (FieldValue::Str(a), FieldValue::Str(b)) => Some(a.cmp(b)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Str(s) => write!(f, "'{}'", s),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            match self {
                FieldValue::Bool(b) => serializer.serialize_bool(*b),
                FieldValue::Int(i) => serializer.serialize_i64(*i),
                FieldValue::Float(f) => serializer.serialize_f64(*f),
                FieldValue::Str(s) => serializer.serialize_str(s),
            }
        } else {
            let tagged = match self.clone() {
                FieldValue::Bool(b) => Tagged::Bool(b),
                FieldValue::Int(i) => Tagged::Int(i),
                FieldValue::Float(f) => Tagged::Float(f),
                FieldValue::Str(s) => Tagged::Str(s),
            };
            tagged.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            Ok(match Plain::deserialize(deserializer)? {
                Plain::Bool(b) => FieldValue::Bool(b),
                Plain::Int(i) => FieldValue::Int(i),
                Plain::Float(f) => FieldValue::Float(f),
                Plain::Str(s) => FieldValue::Str(s),
            })
        } else {
            Ok(match Tagged::deserialize(deserializer)? {
                Tagged::Bool(b) => FieldValue::Bool(b),
                Tagged::Int(i) => FieldValue::Int(i),
                Tagged::Float(f) => FieldValue::Float(f),
                Tagged::Str(s) => FieldValue::Str(s),
            })
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// A record to insert: primary key (absent when the collection assigns
/// ids), vector, and scalar fields such as `text` and `subject`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub id: Option<i64>,
    pub vector: Vector,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    pub fn new(id: i64, vector: impl Into<Vector>) -> Self {
        Self {
            id: Some(id),
            vector: vector.into(),
            fields: BTreeMap::new(),
        }
    }

    /// An entity whose primary key will be assigned by the collection.
    pub fn without_id(vector: impl Into<Vector>) -> Self {
        Self {
            id: None,
            vector: vector.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// A stored record projected onto the requested output fields.
/// `id` is always present; `vector` only when it was asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vector>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Row {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_str)
    }
}

/// One search result: a row and its similarity to the query vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub score: f32,
    pub entity: Row,
}

impl Hit {
    pub fn id(&self) -> i64 {
        self.entity.id
    }
}
