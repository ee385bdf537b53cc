//! In-memory store driver
//!
//! [`MemoryStore`] implements the whole [`StoreDriver`] contract in-process.
//! It backs the test suites and suits embedders that want the mapping layer
//! without an external server.
//!
//! # Design
//!
//! - One `Vec<Document>` per `database.collection`, in insertion order
//! - A single `parking_lot::Mutex` guards all state; it is never held across
//!   an `.await` (every driver method does its work synchronously)
//! - Transactions are snapshot based and serialized: `begin` takes the
//!   writer gate and copies every collection, `abort` restores the copy,
//!   `commit` drops it. Calls outside the session wait on the gate until the
//!   transaction ends, so an abort never erases their work and a second
//!   `begin` waits instead of failing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use framedb_core::{get_path, Document, ObjectId, Value};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard, OwnedMutexGuard};

use crate::driver::{
    Cursor, DeleteResult, InsertManyResult, InsertOneResult, Namespace, SessionId, StoreDriver,
    Transactional, UpdateResult,
};
use crate::error::{StoreError, StoreResult};
use crate::matcher::{is_operator_document, matches};
use crate::query::{Filter, FindOptions, Projection, SortOrder, Stage, UpdateSpec};

type Collections = HashMap<String, Vec<Document>>;

struct OpenTransaction {
    session: SessionId,
    snapshot: Collections,
    _writer: OwnedMutexGuard<()>,
}

#[derive(Default)]
struct MemoryState {
    collections: Collections,
    transaction: Option<OpenTransaction>,
    closed: bool,
}

/// In-process document store
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    gate: Arc<AsyncMutex<()>>,
    next_session: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.state.lock().transaction.is_some()
    }

    fn session_is_open(&self, session: SessionId) -> bool {
        self.state
            .lock()
            .transaction
            .as_ref()
            .is_some_and(|open| open.session == session)
    }

    /// Wait until a call may run
    ///
    /// Calls of the open session run at once; every other call holds the
    /// writer gate for its duration.
    async fn admit(&self, ns: &Namespace) -> StoreResult<Option<AsyncMutexGuard<'_, ()>>> {
        match ns.session {
            Some(session) if self.session_is_open(session) => Ok(None),
            Some(session) => Err(StoreError::transaction(format!(
                "session {} is not open",
                session.as_u64()
            ))),
            None => Ok(Some(self.gate.lock().await)),
        }
    }

    fn with_collection<R>(
        &self,
        ns: &Namespace,
        f: impl FnOnce(&mut Vec<Document>) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Connection {
                reason: "memory store is closed".to_string(),
            });
        }
        let docs = state.collections.entry(ns.full_name()).or_default();
        f(docs)
    }

    fn read_collection(&self, ns: &Namespace) -> StoreResult<Vec<Document>> {
        self.with_collection(ns, |docs| Ok(docs.clone()))
    }

    fn filtered(&self, ns: &Namespace, filter: &Filter, options: &FindOptions) -> StoreResult<Vec<Document>> {
        let mut docs = Vec::new();
        for doc in self.read_collection(ns)? {
            if matches(&doc, filter)? {
                docs.push(doc);
            }
        }
        sort_documents(&mut docs, &options.sort);
        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        Ok(docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &options.projection {
                Some(fields) => project_fields(&doc, fields),
                None => doc,
            })
            .collect())
    }

    fn update(&self, ns: &Namespace, filter: &Filter, update: &UpdateSpec, many: bool) -> StoreResult<UpdateResult> {
        self.with_collection(ns, |docs| {
            let mut result = UpdateResult::default();
            for doc in docs.iter_mut() {
                if !matches(doc, filter)? {
                    continue;
                }
                result.matched_count += 1;
                let updated = apply_update(doc, update)?;
                if updated != *doc {
                    *doc = updated;
                    result.modified_count += 1;
                }
                if !many {
                    break;
                }
            }
            Ok(result)
        })
    }

    fn delete(&self, ns: &Namespace, filter: &Filter, many: bool) -> StoreResult<DeleteResult> {
        self.with_collection(ns, |docs| {
            let mut doomed = Vec::new();
            for (index, doc) in docs.iter().enumerate() {
                if matches(doc, filter)? {
                    doomed.push(index);
                    if !many {
                        break;
                    }
                }
            }
            for index in doomed.iter().rev() {
                docs.remove(*index);
            }
            Ok(DeleteResult {
                deleted_count: doomed.len() as u64,
            })
        })
    }
}

fn insert_into(docs: &mut Vec<Document>, mut doc: Document) -> StoreResult<Value> {
    let id = match doc.get("_id") {
        None | Some(Value::Null) => Value::Id(ObjectId::new()),
        Some(id) => id.clone(),
    };
    if docs
        .iter()
        .any(|existing| existing.get("_id").is_some_and(|e| e.loose_eq(&id)))
    {
        return Err(StoreError::DuplicateKey { id: id.to_string() });
    }
    doc.insert("_id".to_string(), id.clone());
    docs.push(doc);
    Ok(id)
}

/// Apply an update to a copy of `doc`
fn apply_update(doc: &Document, update: &UpdateSpec) -> StoreResult<Document> {
    let mut out = doc.clone();
    for (path, value) in &update.set {
        if path == "_id" && out.get("_id").is_some_and(|id| !id.loose_eq(value)) {
            return Err(StoreError::invalid_update("_id is immutable"));
        }
        set_path(&mut out, path, value.clone())?;
    }
    for path in &update.unset {
        remove_path(&mut out, path);
    }
    for (path, condition) in &update.pull {
        match get_path_mut(&mut out, path) {
            Some(Value::Array(items)) => items.retain(|item| !pull_matches(item, condition)),
            None | Some(Value::Null) => {}
            Some(_) => {
                return Err(StoreError::invalid_update(format!(
                    "cannot pull from non-array field {}",
                    path
                )))
            }
        }
    }
    for (path, value) in &update.push {
        match get_path_mut(&mut out, path) {
            Some(Value::Array(items)) => items.push(value.clone()),
            None | Some(Value::Null) => set_path(&mut out, path, Value::Array(vec![value.clone()]))?,
            Some(_) => {
                return Err(StoreError::invalid_update(format!(
                    "cannot push to non-array field {}",
                    path
                )))
            }
        }
    }
    Ok(out)
}

fn pull_matches(item: &Value, condition: &Value) -> bool {
    if let Value::Document(ops) = condition {
        if is_operator_document(ops) {
            return ops
                .get("$in")
                .and_then(Value::as_array)
                .is_some_and(|options| options.iter().any(|o| item.loose_eq(o)));
        }
    }
    item.loose_eq(condition)
}

fn set_path(doc: &mut Document, path: &str, value: Value) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Document(Document::new()));
            if child.is_null() {
                *child = Value::Document(Document::new());
            }
            match child.as_document_mut() {
                Some(inner) => set_path(inner, rest, value),
                None => Err(StoreError::invalid_update(format!(
                    "cannot set {} inside non-document field {}",
                    rest, head
                ))),
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(inner) = doc.get_mut(head).and_then(Value::as_document_mut) {
                remove_path(inner, rest);
            }
        }
    }
}

fn get_path_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Value> {
    match path.split_once('.') {
        None => doc.get_mut(path),
        Some((head, rest)) => get_path_mut(doc.get_mut(head)?.as_document_mut()?, rest),
    }
}

fn project_fields(doc: &Document, fields: &[String]) -> Document {
    let mut out = Document::new();
    if let Some(id) = doc.get("_id") {
        out.insert("_id".to_string(), id.clone());
    }
    for field in fields {
        if let Some(value) = get_path(doc, field) {
            // an earlier prefix field already holds the value
            let _ = set_path(&mut out, field, value.clone());
        }
    }
    out
}

fn sort_documents(docs: &mut [Document], keys: &[(String, SortOrder)]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (field, order) in keys {
            let left = get_path(a, field).unwrap_or(&Value::Null);
            let right = get_path(b, field).unwrap_or(&Value::Null);
            let ord = match order {
                SortOrder::Ascending => left.compare(right),
                SortOrder::Descending => right.compare(left),
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn field_ref(path: &str) -> &str {
    path.strip_prefix('$').unwrap_or(path)
}

fn run_pipeline(mut docs: Vec<Document>, pipeline: &[Stage]) -> StoreResult<Vec<Document>> {
    for stage in pipeline {
        docs = match stage {
            Stage::Match(filter) => {
                let mut kept = Vec::new();
                for doc in docs {
                    if matches(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            Stage::Project(columns) => docs
                .iter()
                .map(|doc| {
                    let mut out = Document::new();
                    let drop_id = columns
                        .iter()
                        .any(|(name, p)| name == "_id" && *p == Projection::Exclude);
                    if !drop_id {
                        if let Some(id) = doc.get("_id") {
                            out.insert("_id".to_string(), id.clone());
                        }
                    }
                    for (name, projection) in columns {
                        let value = match projection {
                            Projection::Include => get_path(doc, name).cloned(),
                            Projection::Field(path) => get_path(doc, field_ref(path)).cloned(),
                            Projection::Literal(value) => Some(value.clone()),
                            Projection::Exclude => None,
                        };
                        if let Some(value) = value {
                            out.insert(name.clone(), value);
                        }
                    }
                    out
                })
                .collect(),
            Stage::Sort(keys) => {
                sort_documents(&mut docs, keys);
                docs
            }
            Stage::Skip(n) => docs.into_iter().skip(*n as usize).collect(),
            Stage::Limit(n) => docs.into_iter().take(*n as usize).collect(),
            Stage::Unwind(path) => {
                let field = field_ref(path);
                let mut out = Vec::new();
                for doc in docs {
                    match get_path(&doc, field).cloned() {
                        Some(Value::Array(items)) => {
                            for item in items {
                                let mut copy = doc.clone();
                                set_path(&mut copy, field, item)?;
                                out.push(copy);
                            }
                        }
                        None | Some(Value::Null) => {}
                        Some(_) => out.push(doc),
                    }
                }
                out
            }
            Stage::Count(name) => {
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Document::new();
                    out.insert(name.clone(), Value::Int(docs.len() as i64));
                    vec![out]
                }
            }
        };
    }
    Ok(docs)
}

fn cursor(docs: Vec<Document>) -> Cursor {
    stream::iter(docs.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl StoreDriver for MemoryStore {
    async fn find_one(&self, ns: &Namespace, filter: &Filter, options: &FindOptions) -> StoreResult<Option<Document>> {
        let _admitted = self.admit(ns).await?;
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };
        Ok(self.filtered(ns, filter, &options)?.into_iter().next())
    }

    async fn find(&self, ns: &Namespace, filter: &Filter, options: &FindOptions) -> StoreResult<Cursor> {
        let _admitted = self.admit(ns).await?;
        Ok(cursor(self.filtered(ns, filter, options)?))
    }

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> StoreResult<InsertOneResult> {
        let _admitted = self.admit(ns).await?;
        let id = self.with_collection(ns, |docs| insert_into(docs, doc))?;
        Ok(InsertOneResult {
            inserted_id: Some(id),
        })
    }

    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>, ordered: bool) -> StoreResult<InsertManyResult> {
        let _admitted = self.admit(ns).await?;
        self.with_collection(ns, |stored| {
            let mut inserted_ids = Vec::with_capacity(docs.len());
            let mut first_error = None;
            for doc in docs {
                match insert_into(stored, doc) {
                    Ok(id) => inserted_ids.push(id),
                    Err(e) if ordered => return Err(e),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            match first_error {
                Some(e) => Err(e),
                None => Ok(InsertManyResult { inserted_ids }),
            }
        })
    }

    async fn update_one(&self, ns: &Namespace, filter: &Filter, update: &UpdateSpec) -> StoreResult<UpdateResult> {
        let _admitted = self.admit(ns).await?;
        self.update(ns, filter, update, false)
    }

    async fn update_many(&self, ns: &Namespace, filter: &Filter, update: &UpdateSpec) -> StoreResult<UpdateResult> {
        let _admitted = self.admit(ns).await?;
        self.update(ns, filter, update, true)
    }

    async fn delete_one(&self, ns: &Namespace, filter: &Filter) -> StoreResult<DeleteResult> {
        let _admitted = self.admit(ns).await?;
        self.delete(ns, filter, false)
    }

    async fn delete_many(&self, ns: &Namespace, filter: &Filter) -> StoreResult<DeleteResult> {
        let _admitted = self.admit(ns).await?;
        self.delete(ns, filter, true)
    }

    async fn aggregate(&self, ns: &Namespace, pipeline: &[Stage]) -> StoreResult<Cursor> {
        let _admitted = self.admit(ns).await?;
        let docs = self.read_collection(ns)?;
        Ok(cursor(run_pipeline(docs, pipeline)?))
    }

    async fn count_documents(&self, ns: &Namespace, filter: &Filter) -> StoreResult<u64> {
        let _admitted = self.admit(ns).await?;
        let mut count = 0;
        for doc in self.read_collection(ns)? {
            if matches(&doc, filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn estimated_document_count(&self, ns: &Namespace) -> StoreResult<u64> {
        let _admitted = self.admit(ns).await?;
        self.with_collection(ns, |docs| Ok(docs.len() as u64))
    }

    async fn close(&self) -> StoreResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }

    fn transactions(&self) -> Option<&dyn Transactional> {
        Some(self)
    }
}

impl MemoryStore {
    fn end_transaction(&self, session: SessionId, keep: bool) -> StoreResult<()> {
        let mut state = self.state.lock();
        match state.transaction.take() {
            Some(open) if open.session == session => {
                if !keep {
                    state.collections = open.snapshot;
                }
                Ok(())
            }
            other => {
                state.transaction = other;
                Err(StoreError::transaction(format!(
                    "session {} is not open",
                    session.as_u64()
                )))
            }
        }
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    async fn begin(&self) -> StoreResult<SessionId> {
        let writer = Arc::clone(&self.gate).lock_owned().await;
        let session = SessionId::new(self.next_session.fetch_add(1, Ordering::Relaxed) + 1);
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Connection {
                reason: "memory store is closed".to_string(),
            });
        }
        let snapshot = state.collections.clone();
        state.transaction = Some(OpenTransaction {
            session,
            snapshot,
            _writer: writer,
        });
        Ok(session)
    }

    async fn commit(&self, session: SessionId) -> StoreResult<()> {
        self.end_transaction(session, true)
    }

    async fn abort(&self, session: SessionId) -> StoreResult<()> {
        self.end_transaction(session, false)
    }
}
