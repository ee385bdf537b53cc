//! Model schemas
//!
//! A [`Schema`] is the statically declared attribute table of one model,
//! built once at startup and referenced for the life of the process.
//! Schemas reach each other through [`ModelRef`] function pointers, so
//! models may reference one another (cycles included) without any runtime
//! registry:
//!
//! ```
//! use framedb_frames::{Attribute, ChildRelation, OnDelete, RefTarget, Schema};
//! use once_cell::sync::Lazy;
//!
//! static ORDER: Lazy<Schema> = Lazy::new(|| {
//!     Schema::document("Order")
//!         .attribute(Attribute::string("customer"))
//!         .child(ChildRelation::new("line_items", line_item, OnDelete::Restrict))
//!         .build()
//!         .expect("order schema")
//! });
//! static LINE_ITEM: Lazy<Schema> = Lazy::new(|| {
//!     Schema::document("LineItem")
//!         .attribute(Attribute::reference("order_id", RefTarget::Model(order)))
//!         .build()
//!         .expect("line item schema")
//! });
//!
//! fn order() -> &'static Schema { &ORDER }
//! fn line_item() -> &'static Schema { &LINE_ITEM }
//!
//! assert_eq!(order().attribute_names().next(), Some("_id"));
//! assert!(order().has_relations());
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::error::{FrameError, FrameResult};
use crate::frame::{Frame, ID_FIELD};
use crate::hooks::{HookEvent, HookId, HookRegistry};

/// Lazily resolved reference to a schema
pub type ModelRef = fn() -> &'static Schema;

/// Whether instances are persisted on their own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// Persisted, identifier-bearing, one collection per model
    Document,
    /// Lives only nested inside a document
    Embedded,
}

/// Referential action run when a parent is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    /// Delete children (single-valued) or drop the parent from their arrays
    Cascade,
    /// Refuse the delete while children exist
    Restrict,
    /// Null out the children's reference
    SetNull,
    /// Reset the children's reference to its declared default
    SetDefault,
}

impl fmt::Display for OnDelete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET_NULL",
            OnDelete::SetDefault => "SET_DEFAULT",
        };
        f.write_str(name)
    }
}

/// Child collection of a document model
///
/// The child model must declare a reference (or array of references) to the
/// parent; that attribute is discovered when the action runs.
#[derive(Clone)]
pub struct ChildRelation {
    name: String,
    child: ModelRef,
    on_delete: OnDelete,
}

impl ChildRelation {
    /// Declare a child relation
    pub fn new(name: impl Into<String>, child: ModelRef, on_delete: OnDelete) -> Self {
        ChildRelation {
            name: name.into(),
            child,
            on_delete,
        }
    }

    /// Relation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child schema
    pub fn child(&self) -> &'static Schema {
        (self.child)()
    }

    /// Action on parent delete
    pub fn on_delete(&self) -> OnDelete {
        self.on_delete
    }
}

impl fmt::Debug for ChildRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildRelation")
            .field("name", &self.name)
            .field("child", &self.child().name())
            .field("on_delete", &self.on_delete)
            .finish()
    }
}

/// Declared shape of a model
pub struct Schema {
    name: String,
    collection: String,
    kind: SchemaKind,
    attributes: Vec<Attribute>,
    relations: Vec<ChildRelation>,
    hooks: HookRegistry,
}

impl Schema {
    /// Start declaring a document model
    pub fn document(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name.into(), SchemaKind::Document)
    }

    /// Start declaring an embedded model
    pub fn embedded(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name.into(), SchemaKind::Embedded)
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection holding the model's documents
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Model kind
    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// True for embedded models
    pub fn is_embedded(&self) -> bool {
        self.kind == SchemaKind::Embedded
    }

    /// Declared attributes, in declaration order
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// True when `name` is a declared attribute
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Declared attribute names, in declaration order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(Attribute::name)
    }

    /// Child relations, in declaration order
    pub fn relations(&self) -> &[ChildRelation] {
        &self.relations
    }

    /// True when `name` names a child relation
    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.iter().any(|r| r.name() == name)
    }

    /// True when deleting an instance runs referential actions
    pub fn has_relations(&self) -> bool {
        !self.relations.is_empty()
    }

    /// Register a post-operation hook
    pub fn listen<F>(&self, event: HookEvent, hook: F) -> HookId
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        self.hooks.register(event, Arc::new(hook))
    }

    /// Remove a hook; false if it was not registered
    pub fn stop_listening(&self, id: HookId) -> bool {
        self.hooks.remove(id)
    }

    /// Number of registered hooks
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) fn emit(&self, event: HookEvent, frame: &Frame) {
        self.hooks.emit(event, frame);
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("kind", &self.kind)
            .field("attributes", &self.attributes)
            .field("relations", &self.relations)
            .finish()
    }
}

/// Builder for [`Schema`]
pub struct SchemaBuilder {
    name: String,
    collection: Option<String>,
    kind: SchemaKind,
    attributes: Vec<Attribute>,
    relations: Vec<ChildRelation>,
}

impl SchemaBuilder {
    fn new(name: String, kind: SchemaKind) -> Self {
        SchemaBuilder {
            name,
            collection: None,
            kind,
            attributes: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Store documents in `name` instead of the model name
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Declare an attribute
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declare a child relation
    pub fn child(mut self, relation: ChildRelation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Check the declaration and produce the schema
    ///
    /// Document models get a nullable `_id` identifier attribute first
    /// unless they declare one.
    pub fn build(self) -> FrameResult<Schema> {
        let invalid = |reason: String| FrameError::Schema { reason };

        {
            let mut seen = HashSet::new();
            for attribute in &self.attributes {
                if !seen.insert(attribute.name()) {
                    return Err(invalid(format!(
                        "{}: attribute {} declared twice",
                        self.name,
                        attribute.name()
                    )));
                }
            }
            for relation in &self.relations {
                if !seen.insert(relation.name()) {
                    return Err(invalid(format!(
                        "{}: relation {} clashes with another declaration",
                        self.name,
                        relation.name()
                    )));
                }
            }
        }

        let mut attributes = self.attributes;
        match self.kind {
            SchemaKind::Embedded => {
                if !self.relations.is_empty() {
                    return Err(invalid(format!(
                        "{}: embedded models cannot declare child relations",
                        self.name
                    )));
                }
                if attributes.iter().any(|a| a.name() == ID_FIELD) {
                    return Err(invalid(format!(
                        "{}: embedded models carry no identifier",
                        self.name
                    )));
                }
            }
            SchemaKind::Document => {
                if !attributes.iter().any(|a| a.name() == ID_FIELD) {
                    attributes.insert(0, Attribute::id(ID_FIELD).nullable());
                }
            }
        }

        Ok(Schema {
            collection: self.collection.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            kind: self.kind,
            attributes,
            relations: self.relations,
            hooks: HookRegistry::default(),
        })
    }
}
