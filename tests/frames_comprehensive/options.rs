//! Scoped collection option overrides

use crate::test_utils::*;
use framedb::{
    CollectionOptions, Filter, FindOptions, FrameResult, FrameStore, ReadPreference, StoreConfig,
    WriteConcern,
};

async fn read_under_override(store: &FrameStore, options: CollectionOptions) -> FrameResult<u64> {
    let _guard = store.with_options(options);
    let found = store.many_raw(&Filter::all(), &FindOptions::new()).await?;
    Ok(found.len() as u64)
}

#[tokio::test]
async fn override_applies_only_while_the_guard_lives() {
    let (db, driver) = recording_db(StoreConfig::new().database("shop")).await;
    let store = FrameStore::new(db.clone(), order()).unwrap();
    let secondary = CollectionOptions::new().read_preference(ReadPreference::Secondary);

    {
        let guard = store.with_options(secondary);
        assert_eq!(guard.options(), secondary);
        store.count(&Filter::eq("number", 1)).await.unwrap();
        let ns = driver.last_namespace().unwrap();
        assert_eq!(ns.options, secondary);
        assert_eq!(ns.full_name(), "shop.orders");

        // other collections keep the defaults
        assert_eq!(db.collection_options("line_items"), CollectionOptions::default());
    }

    store.count(&Filter::eq("number", 1)).await.unwrap();
    assert_eq!(driver.last_namespace().unwrap().options, CollectionOptions::default());
}

#[tokio::test]
async fn nested_overrides_unwind_in_order() {
    let db = db().await;
    let store = FrameStore::new(db.clone(), order()).unwrap();
    let outer = CollectionOptions::new().write_concern(WriteConcern::Majority);
    let inner = CollectionOptions::new().max_time_ms(250);

    let outer_guard = store.with_options(outer);
    {
        let _inner_guard = store.with_options(inner);
        assert_eq!(db.collection_options("orders"), inner);
    }
    assert_eq!(db.collection_options("orders"), outer);
    drop(outer_guard);
    assert_eq!(db.collection_options("orders"), CollectionOptions::default());
}

#[tokio::test]
async fn override_ends_when_the_body_fails() {
    let (db, driver) = recording_db(StoreConfig::new()).await;
    let store = FrameStore::new(db.clone(), order()).unwrap();
    let nearest = CollectionOptions::new().read_preference(ReadPreference::Nearest);

    driver.fail_on("find");
    assert!(read_under_override(&store, nearest).await.is_err());
    assert_eq!(db.collection_options("orders"), CollectionOptions::default());

    assert_eq!(read_under_override(&store, nearest).await.unwrap(), 0);
    assert_eq!(driver.last_namespace().unwrap().options, nearest);
    assert_eq!(db.collection_options("orders"), CollectionOptions::default());
}

#[tokio::test]
async fn configured_defaults_reach_the_driver() {
    let defaults = CollectionOptions::new()
        .read_preference(ReadPreference::PrimaryPreferred)
        .write_concern(WriteConcern::Majority);
    let (db, driver) = recording_db(StoreConfig::new().collection_options(defaults)).await;
    let store = FrameStore::new(db.clone(), order()).unwrap();

    store.ids(&Filter::all()).await.unwrap();
    assert_eq!(driver.last_namespace().unwrap().options, defaults);
}
