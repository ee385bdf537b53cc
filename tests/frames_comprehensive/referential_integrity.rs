//! Parent deletes and the four referential actions

use crate::test_utils::*;
use framedb::{
    doc, Database, Filter, Frame, FrameError, FrameStore, ObjectId, Schema, StoreConfig,
    StoreError, Value,
};

async fn insert(db: &Database, schema: &'static Schema, doc: framedb::Document) -> Value {
    let mut frame = Frame::from_document(schema, doc);
    assert!(frame.insert(db).await.unwrap());
    frame.id().cloned().unwrap()
}

fn handle(id: &Value) -> Frame {
    Frame::from_document(order(), doc! { "_id" => id.clone() })
}

#[tokio::test]
async fn restrict_refuses_until_children_are_gone() {
    let db = db().await;
    let o1 = insert(&db, order(), doc! { "number" => 1 }).await;
    insert(&db, line_item(), doc! { "order_id" => o1.clone(), "sku" => "A-1" }).await;

    assert!(!handle(&o1).delete(&db).await.unwrap());
    assert_eq!(count(&db, "orders").await, 1);
    assert_eq!(count(&db, "line_items").await, 1);

    // string identifiers are parsed back to the native form
    let hex = o1.as_object_id().unwrap().to_hex();
    let items = FrameStore::new(db.clone(), line_item()).unwrap();
    assert_eq!(items.delete_many("order_id", hex).await.unwrap(), 1);

    assert!(handle(&o1).delete(&db).await.unwrap());
    assert_eq!(count(&db, "orders").await, 0);
}

#[tokio::test]
async fn cascade_on_multi_valued_reference_pulls_the_parent() {
    let db = db().await;
    let o1 = insert(&db, order(), doc! { "number" => 1 }).await;
    let o2 = insert(&db, order(), doc! { "number" => 2 }).await;
    insert(&db, coupon(), doc! { "code" => "SPRING", "orders" => vec![o1.clone(), o2.clone()] }).await;

    assert!(handle(&o1).delete(&db).await.unwrap());

    let coupons = all(&db, "coupons").await;
    assert_eq!(coupons.len(), 1);
    assert_eq!(coupons[0]["orders"], Value::Array(vec![o2]));
}

#[tokio::test]
async fn cascade_on_leaf_children_deletes_them_in_one_call() {
    let (db, driver) = recording_db(StoreConfig::new()).await;
    let o1 = insert(&db, order(), doc! { "number" => 1 }).await;
    let o2 = insert(&db, order(), doc! { "number" => 2 }).await;
    insert(&db, invoice(), doc! { "order" => o1.clone(), "amount" => 10.0 }).await;
    insert(&db, invoice(), doc! { "order" => o1.clone(), "amount" => 12.5 }).await;
    insert(&db, invoice(), doc! { "order" => o2.clone(), "amount" => 3.0 }).await;

    assert!(handle(&o1).delete(&db).await.unwrap());

    let remaining = all(&db, "invoices").await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["order"], o2);
    assert_eq!(driver.count_of("delete_many"), 1);
}

#[tokio::test]
async fn set_null_and_set_default_reset_the_back_reference() {
    let db = db().await;
    let o1 = insert(&db, order(), doc! { "number" => 1 }).await;
    insert(&db, review(), doc! { "order" => o1.clone(), "stars" => 5 }).await;
    insert(&db, shipment(), doc! { "order" => o1.clone(), "carrier" => "UPS" }).await;

    assert!(handle(&o1).delete(&db).await.unwrap());

    let reviews = all(&db, "reviews").await;
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["order"], Value::Null);
    assert_eq!(reviews[0]["stars"], Value::Int(5));

    let shipments = all(&db, "shipments").await;
    assert_eq!(shipments.len(), 1);
    assert_eq!(shipments[0]["order"], Value::Int(0));
}

#[tokio::test]
async fn cascade_recurses_through_children_with_relations() {
    let db = db().await;
    let c = insert(&db, customer(), doc! { "name" => "Ada" }).await;
    let first = insert(&db, order(), doc! { "number" => 1, "buyer" => c.clone() }).await;
    let second = insert(&db, order(), doc! { "number" => 2, "buyer" => c.clone() }).await;
    insert(&db, order(), doc! { "number" => 3 }).await;
    insert(&db, invoice(), doc! { "order" => first.clone(), "amount" => 1.0 }).await;
    insert(&db, line_item(), doc! { "order_id" => second.clone(), "sku" => "B-2" }).await;

    let parent = Frame::from_document(customer(), doc! { "_id" => c.clone() });

    // a grandchild RESTRICT refuses and the whole delete rolls back
    assert!(!parent.delete(&db).await.unwrap());
    assert_eq!(count(&db, "customers").await, 1);
    assert_eq!(count(&db, "orders").await, 3);
    assert_eq!(count(&db, "invoices").await, 1);

    db.collection("line_items").delete_many(&Filter::all()).await.unwrap();
    assert!(parent.delete(&db).await.unwrap());
    assert_eq!(count(&db, "customers").await, 0);
    assert_eq!(count(&db, "orders").await, 1);
    assert_eq!(count(&db, "invoices").await, 0);
}

#[tokio::test]
async fn without_transactions_earlier_effects_stay() {
    let db = db_with(StoreConfig::new().transactional_deletes(false)).await;
    let c = insert(&db, customer(), doc! { "name" => "Grace" }).await;
    insert(&db, order(), doc! { "number" => 1, "buyer" => c.clone() }).await;
    let blocked = insert(&db, order(), doc! { "number" => 2, "buyer" => c.clone() }).await;
    insert(&db, line_item(), doc! { "order_id" => blocked, "sku" => "C-3" }).await;

    let parent = Frame::from_document(customer(), doc! { "_id" => c });
    assert!(!parent.delete(&db).await.unwrap());
    assert_eq!(count(&db, "customers").await, 1);
    assert_eq!(count(&db, "orders").await, 1);
}

#[tokio::test]
async fn driver_failure_aborts_the_transaction() {
    let (db, driver) = recording_db(StoreConfig::new()).await;
    let o1 = insert(&db, order(), doc! { "number" => 1 }).await;
    insert(&db, coupon(), doc! { "code" => "X", "orders" => vec![o1.clone()] }).await;
    insert(&db, invoice(), doc! { "order" => o1.clone(), "amount" => 2.0 }).await;

    driver.fail_on("delete_many");
    let err = handle(&o1).delete(&db).await.unwrap_err();
    assert!(matches!(err, FrameError::Store(StoreError::Driver { .. })));

    // the coupon pull that ran before the failure was rolled back
    assert_eq!(all(&db, "coupons").await[0]["orders"], Value::Array(vec![o1]));
    assert_eq!(count(&db, "orders").await, 1);
    assert_eq!(count(&db, "invoices").await, 1);
}

#[tokio::test]
async fn delete_without_a_match_reports_false() {
    let db = db().await;
    assert!(!Frame::new(order()).delete(&db).await.unwrap());
    assert!(!handle(&Value::Id(ObjectId::new())).delete(&db).await.unwrap());
}

#[tokio::test]
async fn raw_deletes_skip_referential_actions() {
    let db = db().await;
    let o1 = insert(&db, order(), doc! { "number" => 1 }).await;
    insert(&db, line_item(), doc! { "order_id" => o1.clone(), "sku" => "D-4" }).await;

    let orders = FrameStore::new(db.clone(), order()).unwrap();
    assert_eq!(orders.raw_delete_many(&Filter::eq("_id", o1)).await.unwrap(), 1);
    assert_eq!(count(&db, "line_items").await, 1);
}

#[tokio::test]
async fn restrict_on_multi_valued_reference_refuses_while_listed() {
    let db = db().await;
    let a1 = insert(&db, archive(), doc! { "name" => "old" }).await;
    let a2 = insert(&db, archive(), doc! { "name" => "new" }).await;
    let p1 = insert(&db, pin(), doc! { "note" => "keep", "archives" => vec![a2.clone(), a1.clone()] }).await;

    let parent = Frame::from_document(archive(), doc! { "_id" => a1.clone() });
    assert!(!parent.delete(&db).await.unwrap());
    assert_eq!(count(&db, "archives").await, 2);
    assert_eq!(all(&db, "pins").await[0]["archives"], Value::Array(vec![a2.clone(), a1.clone()]));

    let pins = FrameStore::new(db.clone(), pin()).unwrap();
    let unpin = framedb::UpdateSpec::new().pull("archives", a1.clone());
    assert_eq!(pins.raw_update_one(&Filter::eq("_id", p1), &unpin).await.unwrap(), 2);

    assert!(parent.delete(&db).await.unwrap());
    assert_eq!(count(&db, "archives").await, 1);
    assert_eq!(all(&db, "pins").await[0]["archives"], Value::Array(vec![a2]));
}

#[tokio::test]
async fn set_null_and_set_default_on_multi_valued_references_pull_the_parent() {
    let db = db().await;
    let l1 = insert(&db, library(), doc! { "name" => "central" }).await;
    let l2 = insert(&db, library(), doc! { "name" => "branch" }).await;
    insert(&db, label(), doc! { "text" => "both", "libraries" => vec![l1.clone(), l2.clone()] }).await;
    insert(&db, label(), doc! { "text" => "only", "libraries" => vec![l1.clone()] }).await;
    insert(&db, badge(), doc! { "title" => "gold", "libraries" => vec![l2.clone(), l1.clone()] }).await;

    let parent = Frame::from_document(library(), doc! { "_id" => l1 });
    assert!(parent.delete(&db).await.unwrap());

    let labels = all(&db, "labels").await;
    assert_eq!(labels.len(), 2);
    assert_eq!(labels[0]["libraries"], Value::Array(vec![l2.clone()]));
    // emptied, not nulled
    assert_eq!(labels[1]["libraries"], Value::Array(vec![]));

    let badges = all(&db, "badges").await;
    assert_eq!(badges.len(), 1);
    // pulled, not reset to the empty default
    assert_eq!(badges[0]["libraries"], Value::Array(vec![l2]));
}

#[tokio::test]
async fn set_null_and_set_default_delete_children_that_have_relations() {
    let db = db().await;
    let l1 = insert(&db, library(), doc! { "name" => "central" }).await;
    let l2 = insert(&db, library(), doc! { "name" => "branch" }).await;

    let s1 = insert(&db, shelf(), doc! { "library" => l1.clone(), "code" => "A" }).await;
    let s2 = insert(&db, shelf(), doc! { "library" => l2.clone(), "code" => "B" }).await;
    insert(&db, book(), doc! { "shelf" => s1.clone(), "title" => "Dune" }).await;
    insert(&db, book(), doc! { "shelf" => s2.clone(), "title" => "Emma" }).await;

    let r1 = insert(&db, room(), doc! { "library" => l1.clone(), "label" => "reading" }).await;
    insert(&db, room(), doc! { "library" => l2.clone(), "label" => "study" }).await;
    insert(&db, desk(), doc! { "room" => r1.clone(), "seats" => 4 }).await;

    let parent = Frame::from_document(library(), doc! { "_id" => l1 });
    assert!(parent.delete(&db).await.unwrap());

    // shelves and rooms of the deleted library are removed, not reset
    let shelves = all(&db, "shelves").await;
    assert_eq!(shelves.len(), 1);
    assert_eq!(shelves[0]["_id"], s2);
    let rooms = all(&db, "rooms").await;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["library"], l2);

    // their own relations ran: books cascade, desks are nulled
    let books = all(&db, "books").await;
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["title"], Value::from("Emma"));
    let desks = all(&db, "desks").await;
    assert_eq!(desks.len(), 1);
    assert_eq!(desks[0]["room"], Value::Null);
}
