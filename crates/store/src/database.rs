//! Database handle
//!
//! [`Database`] is the process-wide store handle: it owns the driver, the
//! configuration and the per-collection option overrides. It has an explicit
//! lifecycle: [`Database::connect`] pings the driver and returns a shared
//! handle, [`Database::close`] shuts the driver down, after which every
//! operation fails with [`StoreError::Closed`].
//!
//! # Design
//!
//! Model code never talks to the driver directly. It asks the database for a
//! [`Collection`], a short-lived gateway that resolves the options in effect,
//! checks the handle is open and logs each round trip.
//!
//! Option overrides are scoped: [`Database::with_options`] returns an
//! [`OptionsGuard`] that withdraws its override when dropped, so the
//! override ends on every exit path (normal return, `?`, panic). Each
//! collection keeps a stack of live overrides and the newest one wins;
//! guards held by concurrent tasks may drop in any order.
//!
//! Transactions are session scoped. [`Database::collection_in`] tags every
//! call of the gateway with a [`SessionId`] so the driver can attribute it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use framedb_core::Document;
use futures::TryStreamExt;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::{CollectionOptions, StoreConfig};
use crate::driver::{
    Cursor, DeleteResult, InsertManyResult, InsertOneResult, Namespace, SessionId, StoreDriver,
    Transactional, UpdateResult,
};
use crate::error::{StoreError, StoreResult};
use crate::query::{Filter, FindOptions, Stage, UpdateSpec};

/// Shared store handle
pub struct Database {
    driver: Arc<dyn StoreDriver>,
    config: StoreConfig,
    overrides: RwLock<HashMap<String, Vec<(u64, CollectionOptions)>>>,
    next_guard: AtomicU64,
    closed: AtomicBool,
}

impl Database {
    /// Connect to a store through `driver`
    ///
    /// Fails if the driver's `ping` fails.
    pub async fn connect(driver: Arc<dyn StoreDriver>, config: StoreConfig) -> StoreResult<Arc<Self>> {
        driver.ping().await?;
        debug!(database = %config.database, "Connected to store");
        Ok(Arc::new(Self {
            driver,
            config,
            overrides: RwLock::new(HashMap::new()),
            next_guard: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }))
    }

    /// Close the handle and the driver
    ///
    /// Closing twice is a no-op.
    pub async fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(database = %self.config.database, "Closing store");
        self.driver.close().await
    }

    /// True once [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.config.database
    }

    /// Options currently in effect for a collection
    pub fn collection_options(&self, collection: &str) -> CollectionOptions {
        self.overrides
            .read()
            .get(collection)
            .and_then(|stack| stack.last())
            .map_or(self.config.collection_options, |(_, options)| *options)
    }

    /// Override a collection's options until the returned guard is dropped
    ///
    /// The newest live override wins. Dropping a guard withdraws only its
    /// own override, whatever order guards are dropped in; with none left
    /// the configured defaults apply again.
    pub fn with_options(&self, collection: &str, options: CollectionOptions) -> OptionsGuard<'_> {
        let id = self.next_guard.fetch_add(1, Ordering::Relaxed);
        self.overrides
            .write()
            .entry(collection.to_string())
            .or_default()
            .push((id, options));
        OptionsGuard {
            db: self,
            collection: collection.to_string(),
            id,
            options,
        }
    }

    /// Gateway to a collection
    pub fn collection(&self, name: &str) -> Collection<'_> {
        self.collection_in(name, None)
    }

    /// Gateway to a collection whose calls run in `session`
    pub fn collection_in(&self, name: &str, session: Option<SessionId>) -> Collection<'_> {
        Collection {
            db: self,
            ns: Namespace {
                database: self.config.database.clone(),
                collection: name.to_string(),
                options: self.collection_options(name),
                session,
            },
        }
    }

    /// Transaction capability for wrapping deletes
    ///
    /// `None` when the driver has no transactions or transactional deletes
    /// are disabled in the configuration.
    pub fn transactions(&self) -> StoreResult<Option<&dyn Transactional>> {
        self.ensure_open()?;
        if !self.config.transactional_deletes {
            return Ok(None);
        }
        Ok(self.driver.transactions())
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Withdraws a collection option override when dropped
#[must_use = "the override ends when the guard is dropped"]
pub struct OptionsGuard<'a> {
    db: &'a Database,
    collection: String,
    id: u64,
    options: CollectionOptions,
}

impl OptionsGuard<'_> {
    /// Options installed by this guard
    pub fn options(&self) -> CollectionOptions {
        self.options
    }
}

impl Drop for OptionsGuard<'_> {
    fn drop(&mut self) {
        let mut overrides = self.db.overrides.write();
        if let Some(stack) = overrides.get_mut(&self.collection) {
            stack.retain(|(id, _)| *id != self.id);
            if stack.is_empty() {
                overrides.remove(&self.collection);
            }
        }
    }
}

/// Gateway to one collection
///
/// Each method checks the handle is open, forwards to the driver with the
/// options resolved when the gateway was created, and logs the outcome.
pub struct Collection<'a> {
    db: &'a Database,
    ns: Namespace,
}

impl Collection<'_> {
    /// Collection name
    pub fn name(&self) -> &str {
        &self.ns.collection
    }

    /// Namespace passed to the driver
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// First matching document
    pub async fn find_one(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Option<Document>> {
        self.db.ensure_open()?;
        let found = self.db.driver.find_one(&self.ns, filter, options).await?;
        debug!(collection = %self.ns.collection, found = found.is_some(), "find_one");
        Ok(found)
    }

    /// Cursor over matching documents
    pub async fn find(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Cursor> {
        self.db.ensure_open()?;
        debug!(collection = %self.ns.collection, "find");
        self.db.driver.find(&self.ns, filter, options).await
    }

    /// Matching documents, collected
    pub async fn find_all(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Vec<Document>> {
        self.find(filter, options).await?.try_collect().await
    }

    /// Insert one document
    pub async fn insert_one(&self, doc: Document) -> StoreResult<InsertOneResult> {
        self.db.ensure_open()?;
        let result = self.db.driver.insert_one(&self.ns, doc).await?;
        debug!(
            collection = %self.ns.collection,
            assigned = result.inserted_id.is_some(),
            "insert_one"
        );
        Ok(result)
    }

    /// Insert several documents
    pub async fn insert_many(&self, docs: Vec<Document>, ordered: bool) -> StoreResult<InsertManyResult> {
        self.db.ensure_open()?;
        let count = docs.len();
        let result = self.db.driver.insert_many(&self.ns, docs, ordered).await?;
        debug!(collection = %self.ns.collection, count, "insert_many");
        Ok(result)
    }

    /// Update the first matching document
    pub async fn update_one(&self, filter: &Filter, update: &UpdateSpec) -> StoreResult<UpdateResult> {
        self.db.ensure_open()?;
        let result = self.db.driver.update_one(&self.ns, filter, update).await?;
        debug!(
            collection = %self.ns.collection,
            matched = result.matched_count,
            modified = result.modified_count,
            "update_one"
        );
        Ok(result)
    }

    /// Update every matching document
    pub async fn update_many(&self, filter: &Filter, update: &UpdateSpec) -> StoreResult<UpdateResult> {
        self.db.ensure_open()?;
        let result = self.db.driver.update_many(&self.ns, filter, update).await?;
        debug!(
            collection = %self.ns.collection,
            matched = result.matched_count,
            modified = result.modified_count,
            "update_many"
        );
        Ok(result)
    }

    /// Delete the first matching document
    pub async fn delete_one(&self, filter: &Filter) -> StoreResult<DeleteResult> {
        self.db.ensure_open()?;
        let result = self.db.driver.delete_one(&self.ns, filter).await?;
        debug!(collection = %self.ns.collection, deleted = result.deleted_count, "delete_one");
        Ok(result)
    }

    /// Delete every matching document
    pub async fn delete_many(&self, filter: &Filter) -> StoreResult<DeleteResult> {
        self.db.ensure_open()?;
        let result = self.db.driver.delete_many(&self.ns, filter).await?;
        debug!(collection = %self.ns.collection, deleted = result.deleted_count, "delete_many");
        Ok(result)
    }

    /// Cursor over pipeline output
    pub async fn aggregate(&self, pipeline: &[Stage]) -> StoreResult<Cursor> {
        self.db.ensure_open()?;
        debug!(collection = %self.ns.collection, stages = pipeline.len(), "aggregate");
        self.db.driver.aggregate(&self.ns, pipeline).await
    }

    /// Pipeline output, collected
    pub async fn aggregate_all(&self, pipeline: &[Stage]) -> StoreResult<Vec<Document>> {
        self.aggregate(pipeline).await?.try_collect().await
    }

    /// Exact count of matching documents
    pub async fn count_documents(&self, filter: &Filter) -> StoreResult<u64> {
        self.db.ensure_open()?;
        self.db.driver.count_documents(&self.ns, filter).await
    }

    /// Fast collection size
    pub async fn estimated_document_count(&self) -> StoreResult<u64> {
        self.db.ensure_open()?;
        self.db.driver.estimated_document_count(&self.ns).await
    }
}
