//! Store value model
//!
//! This module defines the values a document store holds:
//! - Value: a tagged union of scalar, identifier, temporal and nested values
//! - Document: an ordered string-keyed map of values
//!
//! Values convert losslessly from common Rust types and from
//! `serde_json::Value`, and project back into JSON-safe form through
//! [`Value::to_json_safe`].

use crate::oid::ObjectId;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A store document: field name to value
pub type Document = BTreeMap<String, Value>;

/// A value held in a document
///
/// # Examples
///
/// ```
/// use framedb_core::{Value, ObjectId};
///
/// let n = Value::from(42i64);
/// let s = Value::from("hello");
/// let id = Value::from(ObjectId::new());
///
/// assert!(n.is_number());
/// assert_eq!(s.as_str(), Some("hello"));
/// assert!(id.as_object_id().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Store identifier
    Id(ObjectId),
    /// Calendar date without time
    Date(NaiveDate),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
    /// Ordered list
    Array(Vec<Value>),
    /// Nested document
    Document(Document),
}

impl Value {
    /// Name of the variant, used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Id(_) => "object id",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is an int or float
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Borrow as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as integer (integral floats included)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => float_to_i64(*f),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as identifier
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Borrow as array
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as nested document
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Mutably borrow as nested document
    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Coerce a string holding an identifier into [`Value::Id`]
    ///
    /// Strings that do not parse, and every other variant, are returned
    /// unchanged.
    pub fn into_object_id_if_parseable(self) -> Value {
        match self {
            Value::String(s) => match ObjectId::parse_str(&s) {
                Ok(id) => Value::Id(id),
                Err(_) => Value::String(s),
            },
            other => other,
        }
    }

    /// Convert to a JSON-safe value
    ///
    /// Dates and timestamps become strings, identifiers become their hex
    /// string, arrays and documents convert element-wise, everything else
    /// passes through.
    pub fn to_json_safe(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Id(id) => serde_json::Value::String(id.to_string()),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => serde_json::Value::String(format_datetime(dt)),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json_safe).collect())
            }
            Value::Document(doc) => serde_json::Value::Object(
                doc.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_safe()))
                    .collect(),
            ),
        }
    }

    /// Normalize pure dates to midnight timestamps, recursing into arrays
    pub fn normalize_dates(self) -> Value {
        match self {
            Value::Date(d) => Value::DateTime(date_to_midnight(d)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::normalize_dates).collect())
            }
            other => other,
        }
    }

    /// Equality that treats ints and floats as the same number and compares
    /// dates against timestamps at midnight
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Date(a), Value::DateTime(b)) | (Value::DateTime(b), Value::Date(a)) => {
                date_to_midnight(*a) == *b
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Document(a), Value::Document(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loose_eq(vb))
            }
            _ => self == other,
        }
    }

    /// Total order across all values
    ///
    /// Values of different kinds order by kind (null, numbers, strings,
    /// documents, arrays, identifiers, booleans, temporal); values of the
    /// same kind order naturally.
    pub fn compare(&self, other: &Value) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Id(a), Value::Id(b)) => a.cmp(b),
            (a, b) if a.is_number() => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (a, b) if a.type_rank() == 7 => a.as_timestamp().cmp(&b.as_timestamp()),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Document(a), Value::Document(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => Ordering::Equal,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::String(_) => 2,
            Value::Document(_) => 3,
            Value::Array(_) => 4,
            Value::Id(_) => 5,
            Value::Bool(_) => 6,
            Value::Date(_) | Value::DateTime(_) => 7,
        }
    }

    fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(date_to_midnight(*d)),
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

/// Exact `i64` value of an integral float; `None` for fractional,
/// non-finite or out-of-range floats
pub fn float_to_i64(f: f64) -> Option<i64> {
    // 2^63, the first float past i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then(|| f as i64)
}

/// Midnight UTC on the given date
pub fn date_to_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// `YYYY-MM-DD HH:MM:SS`, with fractional seconds only when non-zero
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json_safe())
    }
}

// From implementations for common types

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::Id(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
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
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Document(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Convert a JSON object into a document
///
/// Returns `None` when the JSON value is not an object.
pub fn document_from_json(json: serde_json::Value) -> Option<Document> {
    match Value::from(json) {
        Value::Document(doc) => Some(doc),
        _ => None,
    }
}

/// Resolve a dotted path (`address.city`) inside a document
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = doc.get(first)?;
    for part in parts {
        current = current.as_document()?.get(part)?;
    }
    Some(current)
}
