//! Shared model state
//!
//! [`Record`] is the state every model instance carries, persisted or
//! embedded: current attribute values, the dirty set, the errors of the last
//! validation pass and the projection settings. [`Frame`](crate::Frame) and
//! [`SubFrame`](crate::SubFrame) wrap a record and dereference to it.
//!
//! # Dirty tracking
//!
//! Writing a declared attribute through [`Record::set`] adds its name to the
//! dirty set; writing any other name stores the value aside without
//! tracking. The dirty set selects what validation checks and what
//! [`Record::document`] renders: the dirty attributes when any are dirty,
//! every declared attribute otherwise.
//!
//! Values written back by validation do not mark attributes dirty.

use std::collections::{BTreeMap, BTreeSet};

use framedb_core::{Document, FieldError, ValidationErrors, Value};

use crate::attribute::{AttrKind, Attribute};
use crate::error::{FrameError, FrameResult};
use crate::schema::Schema;

/// Attribute values, dirty set and projection settings of one instance
#[derive(Debug, Clone)]
pub struct Record {
    schema: &'static Schema,
    values: BTreeMap<String, Value>,
    extra: BTreeMap<String, Value>,
    dirty: BTreeSet<String>,
    errors: ValidationErrors,
    additional: Vec<String>,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl Record {
    /// Fresh record with every attribute at its default and nothing dirty
    pub fn new(schema: &'static Schema) -> Self {
        let values = schema
            .attributes()
            .iter()
            .map(|a| (a.name().to_string(), a.initial_value()))
            .collect();
        Record {
            schema,
            values,
            extra: BTreeMap::new(),
            dirty: BTreeSet::new(),
            errors: ValidationErrors::new(),
            additional: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Record seeded from a mapping; assigned attributes are dirty
    pub fn from_document(schema: &'static Schema, doc: Document) -> Self {
        let mut record = Self::new(schema);
        record.set_items(doc);
        record
    }

    /// Schema of the instance
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Current value of an attribute or undeclared field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).or_else(|| self.extra.get(name))
    }

    /// Current value, null when unset
    pub fn value(&self, name: &str) -> &Value {
        self.get(name).unwrap_or(&Value::Null)
    }

    /// Assign a value; declared attributes become dirty
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if self.schema.has_attribute(name) {
            self.values.insert(name.to_string(), value);
            self.dirty.insert(name.to_string());
        } else {
            self.extra.insert(name.to_string(), value);
        }
    }

    /// Assign several values; names of child relations are ignored
    pub fn set_items<I, K>(&mut self, items: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (name, value) in items {
            let name = name.as_ref();
            if self.schema.has_relation(name) {
                continue;
            }
            self.set(name, value);
        }
    }

    /// Overwrite a declared attribute without marking it dirty
    pub(crate) fn put_clean(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// True when the attribute was written since the last reset
    pub fn is_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    /// Dirty attribute names
    pub fn dirty(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Forget every write
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    pub(crate) fn clear_dirty_field(&mut self, name: &str) {
        self.dirty.remove(name);
    }

    /// Errors of the most recent validation pass
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Attributes the next validation or render covers
    fn working_set(&self) -> impl Iterator<Item = &'static Attribute> + '_ {
        let all = self.dirty.is_empty();
        self.schema
            .attributes()
            .iter()
            .filter(move |a| all || self.dirty.contains(a.name()))
    }

    /// Clean attributes, writing normalized values back
    ///
    /// With `full`, every declared attribute is checked; otherwise the
    /// working set. Every attribute is checked before failing, and values
    /// cleaned before a failure stay cleaned.
    pub fn validate(&mut self, full: bool) -> FrameResult<()> {
        self.errors = ValidationErrors::new();
        let targets: Vec<&'static Attribute> = if full {
            self.schema.attributes().iter().collect()
        } else {
            self.working_set().collect()
        };
        for attribute in targets {
            match attribute.clean(self.value(attribute.name())) {
                Ok(cleaned) => self.put_clean(attribute.name(), cleaned),
                Err(message) => self.errors.push(FieldError::new(attribute.name(), message)),
            }
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(FrameError::Validation(self.errors.clone()))
        }
    }

    /// Store-ready document of the working set
    pub fn document(&self) -> Document {
        self.render(self.working_set())
    }

    /// Store-ready document of every declared attribute
    pub fn full_document(&self) -> Document {
        self.render(self.schema.attributes().iter())
    }

    /// Store-ready document of the dirty attributes only
    pub(crate) fn dirty_document(&self) -> Document {
        self.render(
            self.schema
                .attributes()
                .iter()
                .filter(|a| self.dirty.contains(a.name())),
        )
    }

    fn render<'a>(&self, attributes: impl Iterator<Item = &'a Attribute>) -> Document {
        attributes
            .map(|a| (a.name().to_string(), render_value(a.kind(), self.value(a.name()))))
            .collect()
    }

    /// Current values of every declared attribute, unrendered
    pub fn values_document(&self) -> Document {
        self.values.clone()
    }

    /// Restrict projection to these attributes
    pub fn set_include<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = names.into_iter().map(Into::into).collect();
    }

    /// Leave these attributes out of projection (ignored while an include
    /// list is set)
    pub fn set_exclude<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
    }

    /// Undeclared fields projected after the declared ones
    pub fn additional(&self) -> &[String] {
        &self.additional
    }

    /// Replace the additional field list
    pub fn set_additional(&mut self, names: Vec<String>) {
        self.additional = names;
    }

    /// JSON-safe projection
    ///
    /// Declared names are filtered by the include list (kept in declaration
    /// order) or else the exclude list, then additional names are appended.
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for attribute in self.schema.attributes() {
            let name = attribute.name();
            let wanted = if self.include.is_empty() {
                !self.exclude.iter().any(|n| n == name)
            } else {
                self.include.iter().any(|n| n == name)
            };
            if wanted {
                out.insert(name.to_string(), project_value(attribute.kind(), self.value(name)));
            }
        }
        for name in &self.additional {
            out.insert(name.clone(), self.value(name).to_json_safe());
        }
        serde_json::Value::Object(out)
    }
}

/// Store form of a value: embedded documents render through their schema,
/// arrays element-wise, pure dates become midnight timestamps
pub(crate) fn render_value(kind: &AttrKind, value: &Value) -> Value {
    match (kind, value) {
        (AttrKind::Embedded(model), Value::Document(doc)) => {
            let schema = model();
            Value::Document(
                schema
                    .attributes()
                    .iter()
                    .filter_map(|a| {
                        doc.get(a.name())
                            .map(|v| (a.name().to_string(), render_value(a.kind(), v)))
                    })
                    .collect(),
            )
        }
        (AttrKind::Array(inner), Value::Array(items)) => {
            Value::Array(items.iter().map(|item| render_value(inner, item)).collect())
        }
        _ => value.clone().normalize_dates(),
    }
}

/// JSON form of a value: embedded documents project through their schema
fn project_value(kind: &AttrKind, value: &Value) -> serde_json::Value {
    match (kind, value) {
        (AttrKind::Embedded(model), Value::Document(doc)) => {
            let out = model()
                .attributes()
                .iter()
                .map(|a| {
                    let v = doc.get(a.name()).unwrap_or(&Value::Null);
                    (a.name().to_string(), project_value(a.kind(), v))
                })
                .collect();
            serde_json::Value::Object(out)
        }
        (AttrKind::Array(inner), Value::Array(items)) => {
            serde_json::Value::Array(items.iter().map(|item| project_value(inner, item)).collect())
        }
        _ => value.to_json_safe(),
    }
}
