//! Embedded model instances
//!
//! A [`SubFrame`] is an instance of an embedded schema. It has no identity
//! of its own: the store holds it as a nested document inside a
//! [`Frame`](crate::Frame), directly or inside an array attribute.

use std::ops::{Deref, DerefMut};

use framedb_core::{Document, Value};

use crate::error::FrameResult;
use crate::record::Record;
use crate::schema::Schema;

/// Instance of an embedded model
#[derive(Debug, Clone)]
pub struct SubFrame {
    record: Record,
}

impl SubFrame {
    /// Fresh instance with defaults
    pub fn new(schema: &'static Schema) -> Self {
        SubFrame {
            record: Record::new(schema),
        }
    }

    /// Instance seeded from a mapping
    pub fn from_document(schema: &'static Schema, doc: Document) -> Self {
        SubFrame {
            record: Record::from_document(schema, doc),
        }
    }

    /// Builder form of [`Record::set`]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.record.set(name, value);
        self
    }

    /// Validate every declared attribute
    pub fn is_valid(&mut self) -> FrameResult<()> {
        self.record.validate(true)
    }

    /// Store-ready document of every declared attribute
    pub fn to_document(&self) -> Document {
        self.record.full_document()
    }
}

impl Deref for SubFrame {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl DerefMut for SubFrame {
    fn deref_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}

impl From<&SubFrame> for Value {
    fn from(sub: &SubFrame) -> Self {
        Value::Document(sub.to_document())
    }
}

impl From<SubFrame> for Value {
    fn from(sub: SubFrame) -> Self {
        Value::from(&sub)
    }
}
