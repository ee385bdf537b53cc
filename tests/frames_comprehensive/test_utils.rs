//! Shared fixtures for the comprehensive suite
//!
//! The order domain below exercises every referential action:
//!
//! ```text
//! Customer ──CASCADE──▶ Order ──RESTRICT────▶ LineItem.order_id
//!                             ├─CASCADE─────▶ Coupon.orders[]     (multi-valued)
//!                             ├─CASCADE─────▶ Invoice.order       (by name)
//!                             ├─SET_NULL────▶ Review.order
//!                             └─SET_DEFAULT─▶ Shipment.order      (default 0)
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use framedb::{
    AttrKind, Attribute, ChildRelation, Cursor, Database, DeleteResult, Document, Filter,
    FindOptions, InsertManyResult, InsertOneResult, MemoryStore, Namespace, OnDelete, RefTarget,
    Schema, Stage, StoreConfig, StoreDriver, StoreError, StoreResult, Transactional, UpdateResult,
    UpdateSpec, Value,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

// ============================================================================
// Schemas
// ============================================================================

pub static ADDRESS: Lazy<Schema> = Lazy::new(|| {
    Schema::embedded("Address")
        .attribute(Attribute::string("street"))
        .attribute(Attribute::string("city"))
        .attribute(Attribute::string("zip").max_length(10).nullable())
        .build()
        .expect("address schema")
});

pub static CUSTOMER: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Customer")
        .collection("customers")
        .attribute(Attribute::string("name").max_length(40))
        .attribute(Attribute::string("email").nullable())
        .child(ChildRelation::new("orders", order, OnDelete::Cascade))
        .build()
        .expect("customer schema")
});

pub static ORDER: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Order")
        .collection("orders")
        .attribute(Attribute::integer("number"))
        .attribute(Attribute::reference("buyer", RefTarget::Model(customer)).nullable())
        .attribute(Attribute::float("total").default_value(0.0))
        .attribute(
            Attribute::string("status")
                .choices(vec!["open".into(), "paid".into(), "shipped".into()])
                .default_value("open"),
        )
        .attribute(Attribute::date("placed").nullable())
        .attribute(Attribute::embedded("shipping", address).nullable())
        .attribute(Attribute::array("tags", AttrKind::String { max_length: None }).default_value(Value::Array(vec![])))
        .child(ChildRelation::new("line_items", line_item, OnDelete::Restrict))
        .child(ChildRelation::new("coupons", coupon, OnDelete::Cascade))
        .child(ChildRelation::new("invoices", invoice, OnDelete::Cascade))
        .child(ChildRelation::new("reviews", review, OnDelete::SetNull))
        .child(ChildRelation::new("shipments", shipment, OnDelete::SetDefault))
        .build()
        .expect("order schema")
});

pub static LINE_ITEM: Lazy<Schema> = Lazy::new(|| {
    Schema::document("LineItem")
        .collection("line_items")
        .attribute(Attribute::reference("order_id", RefTarget::Model(order)))
        .attribute(Attribute::string("sku"))
        .attribute(Attribute::integer("qty").default_value(1))
        .build()
        .expect("line item schema")
});

pub static COUPON: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Coupon")
        .collection("coupons")
        .attribute(Attribute::string("code"))
        .attribute(
            Attribute::array("orders", AttrKind::Reference(RefTarget::Model(order)))
                .default_value(Value::Array(vec![])),
        )
        .build()
        .expect("coupon schema")
});

pub static INVOICE: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Invoice")
        .collection("invoices")
        .attribute(Attribute::reference("order", RefTarget::Named("Order")))
        .attribute(Attribute::float("amount"))
        .build()
        .expect("invoice schema")
});

pub static REVIEW: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Review")
        .collection("reviews")
        .attribute(Attribute::reference("order", RefTarget::Model(order)).nullable())
        .attribute(Attribute::integer("stars"))
        .build()
        .expect("review schema")
});

pub static SHIPMENT: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Shipment")
        .collection("shipments")
        .attribute(Attribute::reference("order", RefTarget::Model(order)).default_value(0))
        .attribute(Attribute::string("carrier"))
        .build()
        .expect("shipment schema")
});

pub fn address() -> &'static Schema {
    &ADDRESS
}
pub fn customer() -> &'static Schema {
    &CUSTOMER
}
pub fn order() -> &'static Schema {
    &ORDER
}
pub fn line_item() -> &'static Schema {
    &LINE_ITEM
}
pub fn coupon() -> &'static Schema {
    &COUPON
}
pub fn invoice() -> &'static Schema {
    &INVOICE
}
pub fn review() -> &'static Schema {
    &REVIEW
}
pub fn shipment() -> &'static Schema {
    &SHIPMENT
}

// ============================================================================
// Library domain: the remaining action/shape combinations
// ============================================================================
//
// Archive ──RESTRICT────▶ Pin.archives[]
// Library ──SET_NULL────▶ Label.libraries[]
//         ├─SET_DEFAULT─▶ Badge.libraries[]     (default [])
//         ├─SET_NULL────▶ Shelf.library ──CASCADE──▶ Book.shelf
//         └─SET_DEFAULT─▶ Room.library  ──SET_NULL─▶ Desk.room

pub static ARCHIVE: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Archive")
        .collection("archives")
        .attribute(Attribute::string("name"))
        .child(ChildRelation::new("pins", pin, OnDelete::Restrict))
        .build()
        .expect("archive schema")
});

pub static PIN: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Pin")
        .collection("pins")
        .attribute(Attribute::string("note"))
        .attribute(
            Attribute::array("archives", AttrKind::Reference(RefTarget::Model(archive)))
                .default_value(Value::Array(vec![])),
        )
        .build()
        .expect("pin schema")
});

pub static LIBRARY: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Library")
        .collection("libraries")
        .attribute(Attribute::string("name"))
        .child(ChildRelation::new("labels", label, OnDelete::SetNull))
        .child(ChildRelation::new("badges", badge, OnDelete::SetDefault))
        .child(ChildRelation::new("shelves", shelf, OnDelete::SetNull))
        .child(ChildRelation::new("rooms", room, OnDelete::SetDefault))
        .build()
        .expect("library schema")
});

pub static LABEL: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Label")
        .collection("labels")
        .attribute(Attribute::string("text"))
        .attribute(
            Attribute::array("libraries", AttrKind::Reference(RefTarget::Model(library)))
                .nullable(),
        )
        .build()
        .expect("label schema")
});

pub static BADGE: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Badge")
        .collection("badges")
        .attribute(Attribute::string("title"))
        .attribute(
            Attribute::array("libraries", AttrKind::Reference(RefTarget::Model(library)))
                .default_value(Value::Array(vec![])),
        )
        .build()
        .expect("badge schema")
});

pub static SHELF: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Shelf")
        .collection("shelves")
        .attribute(Attribute::reference("library", RefTarget::Model(library)).nullable())
        .attribute(Attribute::string("code"))
        .child(ChildRelation::new("books", book, OnDelete::Cascade))
        .build()
        .expect("shelf schema")
});

pub static BOOK: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Book")
        .collection("books")
        .attribute(Attribute::reference("shelf", RefTarget::Model(shelf)))
        .attribute(Attribute::string("title"))
        .build()
        .expect("book schema")
});

pub static ROOM: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Room")
        .collection("rooms")
        .attribute(Attribute::reference("library", RefTarget::Model(library)).default_value(0))
        .attribute(Attribute::string("label"))
        .child(ChildRelation::new("desks", desk, OnDelete::SetNull))
        .build()
        .expect("room schema")
});

pub static DESK: Lazy<Schema> = Lazy::new(|| {
    Schema::document("Desk")
        .collection("desks")
        .attribute(Attribute::reference("room", RefTarget::Model(room)).nullable())
        .attribute(Attribute::integer("seats"))
        .build()
        .expect("desk schema")
});

pub fn archive() -> &'static Schema {
    &ARCHIVE
}
pub fn pin() -> &'static Schema {
    &PIN
}
pub fn library() -> &'static Schema {
    &LIBRARY
}
pub fn label() -> &'static Schema {
    &LABEL
}
pub fn badge() -> &'static Schema {
    &BADGE
}
pub fn shelf() -> &'static Schema {
    &SHELF
}
pub fn book() -> &'static Schema {
    &BOOK
}
pub fn room() -> &'static Schema {
    &ROOM
}
pub fn desk() -> &'static Schema {
    &DESK
}

// ============================================================================
// Store helpers
// ============================================================================

/// Route log output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Fresh database over an empty in-memory store
pub async fn db() -> Arc<Database> {
    init_tracing();
    Database::connect(Arc::new(MemoryStore::new()), StoreConfig::new())
        .await
        .expect("connect")
}

/// Fresh database with the given configuration
pub async fn db_with(config: StoreConfig) -> Arc<Database> {
    init_tracing();
    Database::connect(Arc::new(MemoryStore::new()), config)
        .await
        .expect("connect")
}

pub async fn count(db: &Database, collection: &str) -> u64 {
    db.collection(collection)
        .count_documents(&Filter::all())
        .await
        .expect("count")
}

pub async fn all(db: &Database, collection: &str) -> Vec<Document> {
    db.collection(collection)
        .find_all(&Filter::all(), &FindOptions::new())
        .await
        .expect("find")
}

// ============================================================================
// Recording driver
// ============================================================================

/// Driver wrapper that records every call and can be told to fail
///
/// Keeps the namespace of each call so tests can observe option overrides.
/// A yielding store hands control back to the runtime before every call, so
/// operations joined on one task interleave at each round trip.
pub struct RecordingStore {
    inner: MemoryStore,
    pub calls: Mutex<Vec<(String, Namespace)>>,
    fail_on: Mutex<Option<String>>,
    yielding: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        RecordingStore {
            inner: MemoryStore::new(),
            calls: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            yielding: false,
        }
    }

    pub fn yielding() -> Self {
        RecordingStore {
            yielding: true,
            ..Self::new()
        }
    }

    pub fn count_of(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|(name, _)| name == op).count()
    }

    pub fn last_namespace(&self) -> Option<Namespace> {
        self.calls.lock().last().map(|(_, ns)| ns.clone())
    }

    /// Fail the next call of `op` with a driver error
    pub fn fail_on(&self, op: &str) {
        *self.fail_on.lock() = Some(op.to_string());
    }

    async fn record(&self, op: &str, ns: &Namespace) -> StoreResult<()> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        self.calls.lock().push((op.to_string(), ns.clone()));
        let mut fail_on = self.fail_on.lock();
        if fail_on.as_deref() == Some(op) {
            *fail_on = None;
            return Err(StoreError::Driver {
                reason: format!("injected failure in {}", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StoreDriver for RecordingStore {
    async fn find_one(&self, ns: &Namespace, filter: &Filter, options: &FindOptions) -> StoreResult<Option<Document>> {
        self.record("find_one", ns).await?;
        self.inner.find_one(ns, filter, options).await
    }

    async fn find(&self, ns: &Namespace, filter: &Filter, options: &FindOptions) -> StoreResult<Cursor> {
        self.record("find", ns).await?;
        self.inner.find(ns, filter, options).await
    }

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> StoreResult<InsertOneResult> {
        self.record("insert_one", ns).await?;
        self.inner.insert_one(ns, doc).await
    }

    async fn insert_many(&self, ns: &Namespace, docs: Vec<Document>, ordered: bool) -> StoreResult<InsertManyResult> {
        self.record("insert_many", ns).await?;
        self.inner.insert_many(ns, docs, ordered).await
    }

    async fn update_one(&self, ns: &Namespace, filter: &Filter, update: &UpdateSpec) -> StoreResult<UpdateResult> {
        self.record("update_one", ns).await?;
        self.inner.update_one(ns, filter, update).await
    }

    async fn update_many(&self, ns: &Namespace, filter: &Filter, update: &UpdateSpec) -> StoreResult<UpdateResult> {
        self.record("update_many", ns).await?;
        self.inner.update_many(ns, filter, update).await
    }

    async fn delete_one(&self, ns: &Namespace, filter: &Filter) -> StoreResult<DeleteResult> {
        self.record("delete_one", ns).await?;
        self.inner.delete_one(ns, filter).await
    }

    async fn delete_many(&self, ns: &Namespace, filter: &Filter) -> StoreResult<DeleteResult> {
        self.record("delete_many", ns).await?;
        self.inner.delete_many(ns, filter).await
    }

    async fn aggregate(&self, ns: &Namespace, pipeline: &[Stage]) -> StoreResult<Cursor> {
        self.record("aggregate", ns).await?;
        self.inner.aggregate(ns, pipeline).await
    }

    async fn count_documents(&self, ns: &Namespace, filter: &Filter) -> StoreResult<u64> {
        self.record("count_documents", ns).await?;
        self.inner.count_documents(ns, filter).await
    }

    async fn estimated_document_count(&self, ns: &Namespace) -> StoreResult<u64> {
        self.record("estimated_document_count", ns).await?;
        self.inner.estimated_document_count(ns).await
    }

    fn transactions(&self) -> Option<&dyn Transactional> {
        self.inner.transactions()
    }
}

/// Database over a recording driver, keeping a handle to the driver
pub async fn recording_db(config: StoreConfig) -> (Arc<Database>, Arc<RecordingStore>) {
    init_tracing();
    let store = Arc::new(RecordingStore::new());
    let db = Database::connect(store.clone(), config)
        .await
        .expect("connect");
    (db, store)
}

/// Database over a driver that yields before every call
pub async fn yielding_db(config: StoreConfig) -> (Arc<Database>, Arc<RecordingStore>) {
    init_tracing();
    let store = Arc::new(RecordingStore::yielding());
    let db = Database::connect(store.clone(), config)
        .await
        .expect("connect");
    (db, store)
}
