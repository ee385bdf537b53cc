//! Model-level operations
//!
//! [`FrameStore`] is the class-level face of a document model: queries,
//! aggregation, counts and bulk writes for one schema's collection.
//!
//! # Design
//!
//! FrameStore is a stateless facade: it holds the shared database handle and
//! a schema reference, nothing else. Clone is cheap. Several stores over the
//! same database see the same data.
//!
//! # Example
//!
//! ```ignore
//! let db = Database::connect(Arc::new(MemoryStore::new()), StoreConfig::new()).await?;
//! let orders = FrameStore::new(db.clone(), order())?;
//!
//! let mut o = orders.create().with("customer", "ada");
//! o.save(orders.db()).await?;
//!
//! let open = orders.many(&Filter::eq("status", "open"), &FindOptions::new()).await?;
//! ```

use std::sync::Arc;

use framedb_core::{BatchItemErrors, Document, Value};
use framedb_store::{
    Collection, CollectionOptions, Database, Filter, FindOptions, OptionsGuard, Stage, UpdateSpec,
};
use tracing::debug;

use crate::error::{FrameError, FrameResult};
use crate::frame::{Frame, ID_FIELD};
use crate::schema::Schema;

/// Name of the column added by [`FrameStore::counts`]
pub const COUNT_FIELD: &str = "count";

/// One entry of a batch insert
#[derive(Debug, Clone)]
pub enum BatchItem {
    /// Constructed instance, rendered as it stands
    Frame(Frame),
    /// Raw mapping, validated before insertion
    Raw(Document),
}

impl From<Frame> for BatchItem {
    fn from(frame: Frame) -> Self {
        BatchItem::Frame(frame)
    }
}

impl From<Document> for BatchItem {
    fn from(doc: Document) -> Self {
        BatchItem::Raw(doc)
    }
}

/// Queries and bulk operations for one document model
#[derive(Clone)]
pub struct FrameStore {
    db: Arc<Database>,
    schema: &'static Schema,
}

impl FrameStore {
    /// Create a facade for a document schema
    ///
    /// # Errors
    ///
    /// [`FrameError::Schema`] for embedded schemas, which have no collection
    /// of their own.
    pub fn new(db: Arc<Database>, schema: &'static Schema) -> FrameResult<Self> {
        if schema.is_embedded() {
            return Err(FrameError::Schema {
                reason: format!("{} is embedded and has no collection", schema.name()),
            });
        }
        Ok(FrameStore { db, schema })
    }

    /// Shared database handle, for instance operations
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Schema served by this store
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    fn collection(&self) -> Collection<'_> {
        self.db.collection(self.schema.collection())
    }

    /// Fresh instance with defaults
    pub fn create(&self) -> Frame {
        Frame::new(self.schema)
    }

    /// Override this collection's driver options until the guard drops
    pub fn with_options(&self, options: CollectionOptions) -> OptionsGuard<'_> {
        self.db.with_options(self.schema.collection(), options)
    }

    // ========== Queries ==========

    /// First matching instance
    pub async fn one(&self, filter: &Filter, options: &FindOptions) -> FrameResult<Option<Frame>> {
        Ok(self
            .one_raw(filter, options)
            .await?
            .map(|doc| Frame::loaded(self.schema, doc)))
    }

    /// First match, projected to JSON
    pub async fn one_json(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> FrameResult<Option<serde_json::Value>> {
        Ok(self.one(filter, options).await?.map(|f| f.to_json()))
    }

    /// First match, as stored
    pub async fn one_raw(&self, filter: &Filter, options: &FindOptions) -> FrameResult<Option<Document>> {
        Ok(self.collection().find_one(filter, options).await?)
    }

    /// Every matching instance
    pub async fn many(&self, filter: &Filter, options: &FindOptions) -> FrameResult<Vec<Frame>> {
        Ok(self
            .many_raw(filter, options)
            .await?
            .into_iter()
            .map(|doc| Frame::loaded(self.schema, doc))
            .collect())
    }

    /// Every match, projected to JSON
    pub async fn many_json(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> FrameResult<Vec<serde_json::Value>> {
        Ok(self
            .many(filter, options)
            .await?
            .iter()
            .map(|f| f.to_json())
            .collect())
    }

    /// Every match, as stored
    pub async fn many_raw(&self, filter: &Filter, options: &FindOptions) -> FrameResult<Vec<Document>> {
        Ok(self.collection().find_all(filter, options).await?)
    }

    /// Identifiers of matching documents
    pub async fn ids(&self, filter: &Filter) -> FrameResult<Vec<Value>> {
        let options = FindOptions::new().projection([ID_FIELD]);
        Ok(self
            .many_raw(filter, &options)
            .await?
            .into_iter()
            .filter_map(|mut doc| doc.remove(ID_FIELD))
            .collect())
    }

    /// Number of matching documents; an empty filter uses the fast estimate
    pub async fn count(&self, filter: &Filter) -> FrameResult<u64> {
        let collection = self.collection();
        if filter.is_empty() {
            Ok(collection.estimated_document_count().await?)
        } else {
            Ok(collection.count_documents(filter).await?)
        }
    }

    // ========== Aggregation ==========

    /// Projected names that are not declared attributes
    fn additional_fields(&self, pipeline: &[Stage]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for key in pipeline.iter().flat_map(Stage::project_keys) {
            if !self.schema.has_attribute(key) && !names.iter().any(|n| n == key) {
                names.push(key.to_string());
            }
        }
        names
    }

    /// Run a pipeline and wrap each row in an instance
    ///
    /// Undeclared projected columns become additional fields, so
    /// [`to_json`](crate::Record::to_json) emits them.
    pub async fn aggregate(&self, pipeline: &[Stage]) -> FrameResult<Vec<Frame>> {
        let additional = self.additional_fields(pipeline);
        let rows = self.aggregate_raw(pipeline).await?;
        Ok(rows
            .into_iter()
            .map(|doc| {
                let mut frame = Frame::loaded(self.schema, doc);
                frame.set_additional(additional.clone());
                frame
            })
            .collect())
    }

    /// Pipeline rows, projected to JSON
    pub async fn aggregate_json(&self, pipeline: &[Stage]) -> FrameResult<Vec<serde_json::Value>> {
        Ok(self
            .aggregate(pipeline)
            .await?
            .iter()
            .map(|f| f.to_json())
            .collect())
    }

    /// Pipeline rows, as produced by the store
    pub async fn aggregate_raw(&self, pipeline: &[Stage]) -> FrameResult<Vec<Document>> {
        Ok(self.collection().aggregate_all(pipeline).await?)
    }

    /// Number of rows the pipeline produces; `None` when it produces none
    pub async fn counts(&self, pipeline: &[Stage]) -> FrameResult<Option<u64>> {
        let mut stages = pipeline.to_vec();
        stages.push(Stage::Count(COUNT_FIELD.to_string()));
        let rows = self.aggregate_raw(&stages).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(COUNT_FIELD))
            .and_then(Value::as_i64)
            .map(|n| n as u64))
    }

    // ========== Bulk writes ==========

    /// Insert instances and raw mappings in one store call
    ///
    /// Instances are rendered as they stand, every declared attribute
    /// included. Raw mappings are validated first; if any fails, every failure is reported by input index and
    /// nothing is inserted. Returns the inserted identifiers.
    pub async fn insert_many<I>(&self, items: Vec<I>, ordered: bool) -> FrameResult<Vec<Value>>
    where
        I: Into<BatchItem>,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut documents = Vec::with_capacity(items.len());
        let mut failures = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let frame = match item.into() {
                BatchItem::Frame(frame) => frame,
                BatchItem::Raw(doc) => {
                    let mut frame = Frame::from_document(self.schema, doc);
                    if let Err(e) = frame.is_valid() {
                        if let Some(errors) = e.validation_errors() {
                            failures.push(BatchItemErrors {
                                index,
                                errors: errors.clone(),
                            });
                            continue;
                        }
                        return Err(e);
                    }
                    frame
                }
            };
            let mut document = frame.full_document();
            if frame.is_new() {
                document.remove(ID_FIELD);
            }
            documents.push(document);
        }
        if !failures.is_empty() {
            debug!(model = %self.schema.name(), failed = failures.len(), "Batch rejected");
            return Err(FrameError::BatchValidation(failures));
        }
        let result = self.collection().insert_many(documents, ordered).await?;
        Ok(result.inserted_ids)
    }

    /// Apply an update to the first match; returns matched + modified
    pub async fn raw_update_one(&self, filter: &Filter, update: &UpdateSpec) -> FrameResult<u64> {
        Ok(self.collection().update_one(filter, update).await?.score())
    }

    /// Apply an update to every match; returns matched + modified
    pub async fn raw_update_many(&self, filter: &Filter, update: &UpdateSpec) -> FrameResult<u64> {
        Ok(self.collection().update_many(filter, update).await?.score())
    }

    /// Delete the first match, skipping referential actions
    pub async fn raw_delete_one(&self, filter: &Filter) -> FrameResult<bool> {
        Ok(self.collection().delete_one(filter).await?.deleted_count >= 1)
    }

    /// Delete every match, skipping referential actions; returns the count
    pub async fn raw_delete_many(&self, filter: &Filter) -> FrameResult<u64> {
        Ok(self.collection().delete_many(filter).await?.deleted_count)
    }

    /// Delete every document whose `key` equals `id`
    ///
    /// String identifiers are parsed to the store's native form when they
    /// parse.
    pub async fn delete_many(&self, key: &str, id: impl Into<Value>) -> FrameResult<u64> {
        let id = id.into().into_object_id_if_parseable();
        self.raw_delete_many(&Filter::eq(key, id)).await
    }

    /// Set `fields` to null on every match; returns matched + modified
    pub async fn nullify(&self, filter: &Filter, fields: &[&str]) -> FrameResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let update = fields
            .iter()
            .fold(UpdateSpec::new(), |spec, field| spec.set_field(*field, Value::Null));
        self.raw_update_many(filter, &update).await
    }
}

impl std::fmt::Debug for FrameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStore")
            .field("schema", &self.schema.name())
            .field("db", &self.db)
            .finish()
    }
}
