//! Attribute descriptors
//!
//! An [`Attribute`] declares one field of a model: its semantic kind, how its
//! default is produced, whether null is accepted and any extra validators.
//! [`Attribute::clean`] turns a raw value into the normalized value the
//! record keeps, or explains why it cannot.
//!
//! # Example
//!
//! ```
//! use framedb_frames::Attribute;
//! use framedb_core::Value;
//!
//! let name = Attribute::string("name").max_length(5);
//! assert_eq!(name.clean(&Value::from("Ada")), Ok(Value::from("Ada")));
//! assert!(name.clean(&Value::from("Augusta")).is_err());
//! assert!(name.clean(&Value::Null).is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use framedb_core::{date_to_midnight, float_to_i64, Value};

use crate::schema::{ModelRef, Schema};
use crate::subframe::SubFrame;

/// Message for a null value on a non-nullable attribute
pub const NULL_MESSAGE: &str = "This field cannot be null.";

/// Custom validation rule run after kind coercion
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Target model of a reference attribute
#[derive(Clone, Copy)]
pub enum RefTarget {
    /// Matched by schema identity
    Model(ModelRef),
    /// Matched by model name, for references declared before the target
    Named(&'static str),
}

impl RefTarget {
    /// True when `schema` is the referenced model
    pub fn matches(&self, schema: &Schema) -> bool {
        match self {
            RefTarget::Model(model) => std::ptr::eq(model(), schema),
            RefTarget::Named(name) => schema.name() == *name,
        }
    }
}

impl fmt::Debug for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefTarget::Model(model) => write!(f, "Model({})", model().name()),
            RefTarget::Named(name) => write!(f, "Named({})", name),
        }
    }
}

/// Semantic kind of an attribute
#[derive(Clone)]
pub enum AttrKind {
    /// Anything, unchanged
    Any,
    /// Store identifier
    Id,
    /// Text, optionally bounded in characters
    String {
        /// Maximum length in characters
        max_length: Option<usize>,
    },
    /// 64-bit integer
    Integer,
    /// 64-bit float
    Float,
    /// Boolean
    Boolean,
    /// Calendar date
    Date,
    /// UTC timestamp
    DateTime,
    /// Free-form nested document
    Document,
    /// Nested document validated by an embedded model
    Embedded(ModelRef),
    /// Homogeneous list
    Array(Box<AttrKind>),
    /// Identifier of a document of another model
    Reference(RefTarget),
}

impl fmt::Debug for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrKind::Any => write!(f, "Any"),
            AttrKind::Id => write!(f, "Id"),
            AttrKind::String { max_length } => write!(f, "String({:?})", max_length),
            AttrKind::Integer => write!(f, "Integer"),
            AttrKind::Float => write!(f, "Float"),
            AttrKind::Boolean => write!(f, "Boolean"),
            AttrKind::Date => write!(f, "Date"),
            AttrKind::DateTime => write!(f, "DateTime"),
            AttrKind::Document => write!(f, "Document"),
            AttrKind::Embedded(model) => write!(f, "Embedded({})", model().name()),
            AttrKind::Array(inner) => write!(f, "Array({:?})", inner),
            AttrKind::Reference(target) => write!(f, "Reference({:?})", target),
        }
    }
}

impl AttrKind {
    /// Normalize `value` (never null) to this kind
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        match self {
            AttrKind::Any => Ok(value.clone()),
            AttrKind::Id | AttrKind::Reference(_) => coerce_id(value),
            AttrKind::String { max_length } => coerce_string(value, *max_length),
            AttrKind::Integer => coerce_integer(value),
            AttrKind::Float => coerce_float(value),
            AttrKind::Boolean => coerce_bool(value),
            AttrKind::Date => coerce_date(value),
            AttrKind::DateTime => coerce_datetime(value),
            AttrKind::Document => match value {
                Value::Document(_) => Ok(value.clone()),
                _ => Err("Value must be a document.".to_string()),
            },
            AttrKind::Embedded(model) => match value {
                Value::Document(doc) => {
                    let mut sub = SubFrame::from_document(model(), doc.clone());
                    sub.is_valid().map_err(|e| match e.validation_errors() {
                        Some(errors) => errors.to_string(),
                        None => e.to_string(),
                    })?;
                    Ok(Value::Document(sub.values_document()))
                }
                _ => Err("Value must be an embedded document.".to_string()),
            },
            AttrKind::Array(inner) => match value {
                Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        if item.is_null() {
                            return Err(format!("Item {}: {}", i, NULL_MESSAGE));
                        }
                        inner.coerce(item).map_err(|msg| format!("Item {}: {}", i, msg))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                _ => Err("Value must be a list.".to_string()),
            },
        }
    }

    /// Reference target, looking through one array level
    pub(crate) fn reference_target(&self) -> Option<(RefTarget, bool)> {
        match self {
            AttrKind::Reference(target) => Some((*target, false)),
            AttrKind::Array(inner) => match inner.as_ref() {
                AttrKind::Reference(target) => Some((*target, true)),
                _ => None,
            },
            _ => None,
        }
    }
}

fn coerce_id(value: &Value) -> Result<Value, String> {
    match value {
        Value::Id(_) | Value::Int(_) => Ok(value.clone()),
        Value::String(_) => Ok(value.clone().into_object_id_if_parseable()),
        other => Err(format!("{} is not a valid identifier.", other)),
    }
}

fn coerce_string(value: &Value, max_length: Option<usize>) -> Result<Value, String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Id(id) => id.to_string(),
        _ => return Err("Enter a valid string.".to_string()),
    };
    if let Some(max) = max_length {
        let len = text.chars().count();
        if len > max {
            return Err(format!(
                "Ensure this value has at most {} characters (it has {}).",
                max, len
            ));
        }
    }
    Ok(Value::String(text))
}

fn coerce_integer(value: &Value) -> Result<Value, String> {
    match value {
        Value::Int(_) => Ok(value.clone()),
        Value::Float(f) if f.fract() == 0.0 => float_to_i64(*f)
            .map(Value::Int)
            .ok_or_else(|| format!("{} value is out of range for an integer.", value)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("'{}' value must be an integer.", s)),
        other => Err(format!("{} value must be an integer.", other)),
    }
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Float(_) => Ok(value.clone()),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("'{}' value must be a float.", s)),
        other => Err(format!("{} value must be a float.", other)),
    }
}

fn coerce_bool(value: &Value) -> Result<Value, String> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::String(s) => match s.as_str() {
            "true" | "True" | "1" => Some(true),
            "false" | "False" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(Value::Bool)
        .ok_or_else(|| format!("{} value must be either true or false.", value))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn coerce_date(value: &Value) -> Result<Value, String> {
    match value {
        Value::Date(_) => Ok(value.clone()),
        Value::DateTime(dt) => Ok(Value::Date(dt.date_naive())),
        Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
            .map(Value::Date)
            .ok_or_else(|| {
                format!(
                    "'{}' value has an invalid date format. It must be in YYYY-MM-DD format.",
                    s
                )
            }),
        other => Err(format!("{} value must be a date.", other)),
    }
}

fn coerce_datetime(value: &Value) -> Result<Value, String> {
    match value {
        Value::DateTime(_) => Ok(value.clone()),
        Value::Date(d) => Ok(Value::DateTime(date_to_midnight(*d))),
        Value::String(s) => parse_datetime(s)
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .map(date_to_midnight)
            })
            .map(Value::DateTime)
            .ok_or_else(|| {
                format!(
                    "'{}' value has an invalid format. It must be in YYYY-MM-DD HH:MM[:ss[.uuuuuu]] format.",
                    s
                )
            }),
        other => Err(format!("{} value must be a timestamp.", other)),
    }
}

/// How an attribute's initial value is produced
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DefaultPolicy {
    /// Starts out null
    #[default]
    None,
    /// The current time, captured when the instance is constructed
    ConstructTimeNow,
    /// A fixed value
    Static(Value),
}

/// One declared field of a model
#[derive(Clone)]
pub struct Attribute {
    name: String,
    kind: AttrKind,
    default: DefaultPolicy,
    nullable: bool,
    validators: Vec<Validator>,
}

impl Attribute {
    /// Attribute of the given kind; not nullable, no default
    pub fn new(name: impl Into<String>, kind: AttrKind) -> Self {
        Attribute {
            name: name.into(),
            kind,
            default: DefaultPolicy::None,
            nullable: false,
            validators: Vec::new(),
        }
    }

    /// Unchecked value
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::Any)
    }

    /// Store identifier
    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::Id)
    }

    /// Unbounded text
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::String { max_length: None })
    }

    /// Integer
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::Integer)
    }

    /// Float
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::Float)
    }

    /// Boolean
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::Boolean)
    }

    /// Calendar date
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::Date)
    }

    /// Timestamp
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::DateTime)
    }

    /// Free-form document
    pub fn document(name: impl Into<String>) -> Self {
        Self::new(name, AttrKind::Document)
    }

    /// Document validated by an embedded model
    pub fn embedded(name: impl Into<String>, model: ModelRef) -> Self {
        Self::new(name, AttrKind::Embedded(model))
    }

    /// List of `item`
    pub fn array(name: impl Into<String>, item: AttrKind) -> Self {
        Self::new(name, AttrKind::Array(Box::new(item)))
    }

    /// Reference to a document of another model
    pub fn reference(name: impl Into<String>, target: RefTarget) -> Self {
        Self::new(name, AttrKind::Reference(target))
    }

    /// Accept null
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Bound a string attribute; ignored for other kinds
    pub fn max_length(mut self, max: usize) -> Self {
        if let AttrKind::String { max_length } = &mut self.kind {
            *max_length = Some(max);
        }
        self
    }

    /// Start out with a fixed value
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultPolicy::Static(value.into());
        self
    }

    /// Start out with the construction time
    pub fn default_now(mut self) -> Self {
        self.default = DefaultPolicy::ConstructTimeNow;
        self
    }

    /// Only accept one of `choices`
    pub fn choices(self, choices: Vec<Value>) -> Self {
        self.validator(move |value| {
            if choices.iter().any(|c| c.loose_eq(value)) {
                Ok(())
            } else {
                Err(format!("Value {} is not a valid choice.", value))
            }
        })
    }

    /// Add a validation rule, run on the coerced value
    pub fn validator<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(rule));
        self
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute kind
    pub fn kind(&self) -> &AttrKind {
        &self.kind
    }

    /// Default policy
    pub fn default_policy(&self) -> &DefaultPolicy {
        &self.default
    }

    /// True when null is accepted
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Value a new instance starts with
    pub fn initial_value(&self) -> Value {
        match &self.default {
            DefaultPolicy::None => Value::Null,
            DefaultPolicy::Static(value) => value.clone(),
            DefaultPolicy::ConstructTimeNow => match self.kind {
                AttrKind::Date => Value::Date(Utc::now().date_naive()),
                _ => Value::DateTime(Utc::now()),
            },
        }
    }

    /// Validate and normalize a value
    pub fn clean(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(NULL_MESSAGE.to_string())
            };
        }
        let cleaned = self.kind.coerce(value)?;
        for rule in &self.validators {
            rule(&cleaned)?;
        }
        Ok(cleaned)
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("nullable", &self.nullable)
            .field("validators", &self.validators.len())
            .finish()
    }
}
