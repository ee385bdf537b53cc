//! Document model instances
//!
//! A [`Frame`] is an instance of a document schema: a [`Record`] plus
//! identity and persistence. An instance is *new* while its `_id` is null
//! and *existing* once it has one; that status alone routes
//! [`save`](Frame::save) to insert or update and decides what validation
//! covers.
//!
//! Persistence calls take the [`Database`] explicitly. They report outcomes
//! as booleans and counts; only validation and store failures are errors.
//!
//! # Delete protocol
//!
//! [`Frame::delete`] runs the schema's child relations in declaration order
//! before removing the document. A refusing relation (RESTRICT with
//! children present) stops the chain and the document stays. When the
//! database offers transactions, the whole chain runs inside one session and
//! a refusal or error aborts it, undoing earlier referential actions of that
//! delete only.

use std::ops::{Deref, DerefMut};

use framedb_core::{document_from_json, Document, Value};
use framedb_store::{Collection, Database, Filter, FindOptions, SessionId, UpdateSpec};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::attribute::AttrKind;
use crate::error::{FrameError, FrameResult};
use crate::hooks::HookEvent;
use crate::integrity;
use crate::record::{render_value, Record};
use crate::schema::Schema;

/// Name of the identifier attribute
pub const ID_FIELD: &str = "_id";

/// Instance of a document model
#[derive(Debug, Clone)]
pub struct Frame {
    record: Record,
}

impl Frame {
    /// New instance with defaults and nothing dirty
    pub fn new(schema: &'static Schema) -> Self {
        Frame {
            record: Record::new(schema),
        }
    }

    /// Instance seeded from a mapping; assigned attributes are dirty
    pub fn from_document(schema: &'static Schema, doc: Document) -> Self {
        Frame {
            record: Record::from_document(schema, doc),
        }
    }

    /// Instance seeded from a JSON object
    pub fn from_json(schema: &'static Schema, json: serde_json::Value) -> FrameResult<Self> {
        let doc = document_from_json(json).ok_or_else(|| FrameError::Conversion {
            reason: format!("{} expects a JSON object", schema.name()),
        })?;
        Ok(Self::from_document(schema, doc))
    }

    /// Instance as read from the store: nothing dirty
    pub(crate) fn loaded(schema: &'static Schema, doc: Document) -> Self {
        let mut frame = Self::from_document(schema, doc);
        frame.clear_dirty();
        frame
    }

    /// Builder form of [`Record::set`]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.record.set(name, value);
        self
    }

    /// Identifier, when assigned
    pub fn id(&self) -> Option<&Value> {
        self.record.get(ID_FIELD).filter(|id| !id.is_null())
    }

    /// True until the instance has an identifier
    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Validate: every attribute when new, the working set otherwise
    pub fn is_valid(&mut self) -> FrameResult<()> {
        let full = self.is_new();
        self.record.validate(full)
    }

    fn collection<'a>(&self, db: &'a Database) -> Collection<'a> {
        db.collection(self.schema().collection())
    }

    /// Identifier in the store's native form
    fn store_id(&self) -> Option<Value> {
        self.id().map(|id| id.clone().into_object_id_if_parseable())
    }

    /// Insert when new, update otherwise
    pub async fn save(&mut self, db: &Database) -> FrameResult<bool> {
        if self.is_new() {
            self.insert(db).await
        } else {
            Ok(self.update(db).await? > 0)
        }
    }

    /// Validate every attribute and create the document
    ///
    /// On success the store-assigned identifier is written back and the
    /// dirty set is cleared. A store response without an identifier
    /// reports `false`.
    pub async fn insert(&mut self, db: &Database) -> FrameResult<bool> {
        self.clear_dirty();
        self.is_valid()?;

        let mut document = self.document();
        if self.is_new() {
            document.remove(ID_FIELD);
        }
        let result = self.collection(db).insert_one(document).await?;
        match result.inserted_id.filter(|id| !id.is_null()) {
            Some(id) => {
                self.record.put_clean(ID_FIELD, id);
                self.clear_dirty();
                debug!(model = %self.schema().name(), id = %self.value(ID_FIELD), "Inserted");
                self.schema().emit(HookEvent::Inserted, self);
                Ok(true)
            }
            None => {
                warn!(model = %self.schema().name(), "Store reported no identifier for insert");
                Ok(false)
            }
        }
    }

    /// Write the dirty attributes
    ///
    /// Returns matched + modified. Nothing dirty, or no identifier, returns
    /// 0 without a store round trip. The dirty set is kept.
    pub async fn update(&mut self, db: &Database) -> FrameResult<u64> {
        let Some(id) = self.store_id() else {
            return Ok(0);
        };
        if self.record.dirty().all(|name| name == ID_FIELD) {
            debug!(model = %self.schema().name(), "Nothing to update");
            return Ok(0);
        }
        self.is_valid()?;

        let mut document = self.record.dirty_document();
        document.remove(ID_FIELD);
        self.record.put_clean(ID_FIELD, id.clone());

        let result = self
            .collection(db)
            .update_one(&Filter::eq(ID_FIELD, id), &UpdateSpec::set(document))
            .await?;
        let score = result.score();
        if score > 0 {
            self.schema().emit(HookEvent::Updated, self);
        }
        Ok(score)
    }

    /// Update when the document exists, insert (keeping the identifier)
    /// when it does not or when there is no identifier
    pub async fn upsert(&mut self, db: &Database) -> FrameResult<bool> {
        let Some(id) = self.store_id() else {
            return self.insert(db).await;
        };
        let existing = self
            .collection(db)
            .count_documents(&Filter::eq(ID_FIELD, id))
            .await?;
        if existing == 0 {
            self.insert(db).await
        } else {
            Ok(self.update(db).await? > 0)
        }
    }

    /// Clear fields in memory and remove them from the stored document
    pub async fn unset(&mut self, db: &Database, fields: &[&str]) -> FrameResult<u64> {
        let Some(id) = self.store_id() else {
            return Ok(0);
        };
        if fields.is_empty() {
            return Ok(0);
        }
        let mut update = UpdateSpec::new();
        for field in fields {
            if self.schema().has_attribute(field) {
                self.record.put_clean(field, Value::Null);
                self.record.clear_dirty_field(field);
            } else {
                self.record.set(field, Value::Null);
            }
            update = update.unset_field(*field);
        }
        let result = self
            .collection(db)
            .update_one(&Filter::eq(ID_FIELD, id), &update)
            .await?;
        Ok(result.score())
    }

    /// Remove `value` from an array field in the store
    pub async fn pull(&self, db: &Database, field: &str, value: impl Into<Value>) -> FrameResult<u64> {
        self.array_update(db, UpdateSpec::new().pull(field, value)).await
    }

    /// Append `value` to an array field in the store
    ///
    /// Embedded instances convert with `Value::from(&sub_frame)`.
    pub async fn push(&self, db: &Database, field: &str, value: impl Into<Value>) -> FrameResult<u64> {
        let value = value.into();
        let rendered = match self.schema().attribute(field).map(|a| a.kind()) {
            Some(AttrKind::Array(item)) => render_value(item, &value),
            _ => value.normalize_dates(),
        };
        self.array_update(db, UpdateSpec::new().push(field, rendered)).await
    }

    async fn array_update(&self, db: &Database, update: UpdateSpec) -> FrameResult<u64> {
        let Some(id) = self.store_id() else {
            return Ok(0);
        };
        let result = self
            .collection(db)
            .update_one(&Filter::eq(ID_FIELD, id), &update)
            .await?;
        Ok(result.score())
    }

    /// Fresh copy of the stored document
    pub async fn reload(&self, db: &Database) -> FrameResult<Option<Frame>> {
        let Some(id) = self.store_id() else {
            return Ok(None);
        };
        let found = self
            .collection(db)
            .find_one(&Filter::eq(ID_FIELD, id), &FindOptions::new())
            .await?;
        Ok(found.map(|doc| Frame::loaded(self.schema(), doc)))
    }

    /// Run referential actions, then delete the document
    ///
    /// Returns `false` when a relation refuses or nothing was deleted.
    pub async fn delete(&self, db: &Database) -> FrameResult<bool> {
        if self.store_id().is_none() {
            return Ok(false);
        }
        let Some(tx) = db.transactions()? else {
            return self.delete_in_chain(db, None).await;
        };
        let session = tx.begin().await?;
        match self.delete_in_chain(db, Some(session)).await {
            Ok(true) => {
                tx.commit(session).await?;
                Ok(true)
            }
            Ok(false) => {
                warn!(model = %self.schema().name(), id = %self.value(ID_FIELD), "Delete refused, aborting transaction");
                tx.abort(session).await?;
                Ok(false)
            }
            Err(e) => {
                warn!(model = %self.schema().name(), error = %e, "Delete failed, aborting transaction");
                if let Err(abort) = tx.abort(session).await {
                    warn!(error = %abort, "Transaction abort failed");
                }
                Err(e)
            }
        }
    }

    /// Delete within `session` without opening a transaction; children
    /// removed during a cascade go through here
    pub(crate) fn delete_in_chain<'a>(
        &'a self,
        db: &'a Database,
        session: Option<SessionId>,
    ) -> BoxFuture<'a, FrameResult<bool>> {
        async move {
            let Some(id) = self.store_id() else {
                return Ok(false);
            };
            let schema = self.schema();
            for relation in schema.relations() {
                if !integrity::run_action(self, relation, db, session).await? {
                    warn!(
                        model = %schema.name(),
                        relation = %relation.name(),
                        action = %relation.on_delete(),
                        "Delete refused by relation"
                    );
                    return Ok(false);
                }
            }
            let result = db
                .collection_in(schema.collection(), session)
                .delete_one(&Filter::eq(ID_FIELD, id))
                .await?;
            if result.deleted_count >= 1 {
                info!(model = %schema.name(), id = %self.value(ID_FIELD), "Deleted");
                schema.emit(HookEvent::Deleted, self);
                Ok(true)
            } else {
                Ok(false)
            }
        }
        .boxed()
    }
}

impl Deref for Frame {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl DerefMut for Frame {
    fn deref_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}

/// Same schema and the same non-null identifier
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema(), other.schema())
            && match (self.id(), other.id()) {
                (Some(a), Some(b)) => a.loose_eq(b),
                _ => false,
            }
    }
}
