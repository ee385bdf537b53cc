//! Post-operation hooks
//!
//! Each test owns its schema so hook registrations never leak between
//! tests running in parallel.

use std::sync::Arc;

use crate::test_utils::*;
use framedb::{
    doc, Attribute, ChildRelation, Frame, HookEvent, OnDelete, RefTarget, Schema, Value,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

type Log = Arc<Mutex<Vec<(HookEvent, Value)>>>;

fn record_all(schema: &'static Schema) -> Log {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    for event in [HookEvent::Inserted, HookEvent::Updated, HookEvent::Deleted] {
        let log = log.clone();
        schema.listen(event, move |frame: &Frame| {
            log.lock().push((event, frame.value("label").clone()));
        });
    }
    log
}

static LIFECYCLE: Lazy<Schema> = Lazy::new(|| {
    Schema::document("HookedLifecycle")
        .attribute(Attribute::string("label"))
        .build()
        .expect("schema")
});

#[tokio::test]
async fn hooks_fire_after_each_successful_write() {
    let db = db().await;
    let log = record_all(&LIFECYCLE);

    let mut frame = Frame::new(&LIFECYCLE).with("label", "first");
    frame.insert(&db).await.unwrap();
    frame.set("label", "second");
    frame.update(&db).await.unwrap();
    assert!(frame.delete(&db).await.unwrap());

    assert_eq!(
        *log.lock(),
        vec![
            (HookEvent::Inserted, Value::from("first")),
            (HookEvent::Updated, Value::from("second")),
            (HookEvent::Deleted, Value::from("second")),
        ]
    );
}

static SILENT: Lazy<Schema> = Lazy::new(|| {
    Schema::document("HookedSilent")
        .attribute(Attribute::string("label"))
        .build()
        .expect("schema")
});

#[tokio::test]
async fn failed_or_empty_operations_stay_silent() {
    let db = db().await;
    let log = record_all(&SILENT);

    // validation failure
    let mut invalid = Frame::new(&SILENT);
    assert!(invalid.insert(&db).await.is_err());

    let mut frame = Frame::new(&SILENT).with("label", "x");
    frame.insert(&db).await.unwrap();
    log.lock().clear();

    // nothing dirty
    let mut clean = frame.reload(&db).await.unwrap().unwrap();
    assert_eq!(clean.update(&db).await.unwrap(), 0);

    // nothing to delete
    let ghost = Frame::from_document(&SILENT, doc! { "_id" => framedb::ObjectId::new() });
    assert!(!ghost.delete(&db).await.unwrap());

    assert!(log.lock().is_empty());
}

static REMOVABLE: Lazy<Schema> = Lazy::new(|| {
    Schema::document("HookedRemovable")
        .attribute(Attribute::string("label"))
        .build()
        .expect("schema")
});

#[tokio::test]
async fn removed_hooks_stop_firing() {
    let db = db().await;
    let hits = Arc::new(Mutex::new(0usize));
    let counter = hits.clone();
    let id = REMOVABLE.listen(HookEvent::Inserted, move |_| *counter.lock() += 1);
    assert_eq!(REMOVABLE.hook_count(), 1);

    Frame::new(&REMOVABLE).with("label", "a").insert(&db).await.unwrap();
    assert!(REMOVABLE.stop_listening(id));
    assert!(!REMOVABLE.stop_listening(id));
    Frame::new(&REMOVABLE).with("label", "b").insert(&db).await.unwrap();

    assert_eq!(*hits.lock(), 1);
    assert_eq!(REMOVABLE.hook_count(), 0);
}

static FOLDER: Lazy<Schema> = Lazy::new(|| {
    Schema::document("HookedFolder")
        .attribute(Attribute::string("label"))
        .child(ChildRelation::new("files", file, OnDelete::Cascade))
        .build()
        .expect("schema")
});

static FILE: Lazy<Schema> = Lazy::new(|| {
    Schema::document("HookedFile")
        .attribute(Attribute::string("label"))
        .attribute(Attribute::reference("folder", RefTarget::Model(folder)))
        .child(ChildRelation::new("versions", version, OnDelete::Cascade))
        .build()
        .expect("schema")
});

static VERSION: Lazy<Schema> = Lazy::new(|| {
    Schema::document("HookedVersion")
        .attribute(Attribute::string("label"))
        .attribute(Attribute::reference("file", RefTarget::Model(file)))
        .build()
        .expect("schema")
});

fn folder() -> &'static Schema {
    &FOLDER
}
fn file() -> &'static Schema {
    &FILE
}
fn version() -> &'static Schema {
    &VERSION
}

#[tokio::test]
async fn children_deleted_one_by_one_fire_their_own_hooks() {
    let db = db().await;
    let files = record_all(file());
    let versions = record_all(version());

    let mut root = Frame::new(folder()).with("label", "root");
    root.insert(&db).await.unwrap();
    let mut doc_file = Frame::new(file()).with("label", "a.txt").with("folder", root.id().cloned());
    doc_file.insert(&db).await.unwrap();
    let mut v1 = Frame::new(version()).with("label", "v1").with("file", doc_file.id().cloned());
    v1.insert(&db).await.unwrap();
    files.lock().clear();
    versions.lock().clear();

    assert!(root.delete(&db).await.unwrap());

    // files have relations, so each is deleted through its own chain
    assert_eq!(*files.lock(), vec![(HookEvent::Deleted, Value::from("a.txt"))]);
    // versions are leaves and go in one bulk delete without hooks
    assert!(versions.lock().is_empty());
    assert_eq!(count(&db, "HookedVersion").await, 0);
}
