//! Store driver contract
//!
//! A [`StoreDriver`] is the async backend the mapping layer talks to. It
//! stores schemaless documents in named collections and exposes the usual
//! document-store primitives. Drivers are shared behind an `Arc` and must be
//! `Send + Sync`.
//!
//! Every call receives a [`Namespace`] naming the database and collection
//! together with the [`CollectionOptions`] in effect for that call, and the
//! transaction session the call belongs to, if any.

use async_trait::async_trait;
use framedb_core::{Document, Value};
use futures::stream::BoxStream;

use crate::config::CollectionOptions;
use crate::error::StoreResult;
use crate::query::{Filter, FindOptions, Stage, UpdateSpec};

/// Async sequence of documents produced by `find` and `aggregate`
pub type Cursor = BoxStream<'static, StoreResult<Document>>;

/// Target of a driver call
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Options in effect for this call
    pub options: CollectionOptions,
    /// Transaction the call runs in; `None` outside a transaction
    pub session: Option<SessionId>,
}

impl Namespace {
    /// `database.collection`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

/// Result of `insert_one`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertOneResult {
    /// Identifier of the stored document, if the store reported one
    pub inserted_id: Option<Value>,
}

/// Result of `insert_many`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertManyResult {
    /// Identifiers in input order
    pub inserted_ids: Vec<Value>,
}

/// Result of `update_one` / `update_many`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    /// Documents matched by the filter
    pub matched_count: u64,
    /// Documents whose content changed
    pub modified_count: u64,
}

impl UpdateResult {
    /// `matched + modified`, the mapping layer's success measure
    pub fn score(&self) -> u64 {
        self.matched_count + self.modified_count
    }
}

/// Result of `delete_one` / `delete_many`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteResult {
    /// Documents removed
    pub deleted_count: u64,
}

/// Document store backend
#[async_trait]
pub trait StoreDriver: Send + Sync {
    /// First document matching the filter
    async fn find_one(
        &self,
        ns: &Namespace,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Option<Document>>;

    /// All documents matching the filter
    async fn find(&self, ns: &Namespace, filter: &Filter, options: &FindOptions)
        -> StoreResult<Cursor>;

    /// Store one document; the store assigns `_id` when absent
    async fn insert_one(&self, ns: &Namespace, doc: Document) -> StoreResult<InsertOneResult>;

    /// Store several documents in one call
    ///
    /// With `ordered`, the first failure stops the batch; otherwise the
    /// remaining documents are still attempted and the first error is
    /// reported afterwards.
    async fn insert_many(
        &self,
        ns: &Namespace,
        docs: Vec<Document>,
        ordered: bool,
    ) -> StoreResult<InsertManyResult>;

    /// Apply an update to the first matching document
    async fn update_one(
        &self,
        ns: &Namespace,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> StoreResult<UpdateResult>;

    /// Apply an update to every matching document
    async fn update_many(
        &self,
        ns: &Namespace,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> StoreResult<UpdateResult>;

    /// Remove the first matching document
    async fn delete_one(&self, ns: &Namespace, filter: &Filter) -> StoreResult<DeleteResult>;

    /// Remove every matching document
    async fn delete_many(&self, ns: &Namespace, filter: &Filter) -> StoreResult<DeleteResult>;

    /// Run an aggregation pipeline
    async fn aggregate(&self, ns: &Namespace, pipeline: &[Stage]) -> StoreResult<Cursor>;

    /// Exact count of matching documents
    async fn count_documents(&self, ns: &Namespace, filter: &Filter) -> StoreResult<u64>;

    /// Fast, possibly approximate, collection size
    async fn estimated_document_count(&self, ns: &Namespace) -> StoreResult<u64>;

    /// Check that the backend is reachable
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Release backend resources
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Multi-document transaction support, if the backend has it
    fn transactions(&self) -> Option<&dyn Transactional> {
        None
    }
}

/// Handle naming one open transaction
///
/// Issued by [`Transactional::begin`]. Calls whose [`Namespace`] carries the
/// handle run inside that transaction; calls without it must not observe or
/// disturb it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a driver-assigned session number
    pub fn new(id: u64) -> Self {
        SessionId(id)
    }

    /// Driver-assigned session number
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Multi-document transaction capability
///
/// Transactions are session scoped: `begin` hands out a [`SessionId`],
/// operations tagged with it belong to the transaction, and `commit` /
/// `abort` end exactly that transaction. Aborting must never undo work done
/// outside the session.
#[async_trait]
pub trait Transactional: Send + Sync {
    /// Open a transaction, waiting for a conflicting one to finish
    async fn begin(&self) -> StoreResult<SessionId>;

    /// Make the transaction's effects permanent
    async fn commit(&self, session: SessionId) -> StoreResult<()>;

    /// Discard the transaction's effects
    async fn abort(&self, session: SessionId) -> StoreResult<()>;
}
