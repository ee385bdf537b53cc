//! framedb: typed document models over schemaless document stores
//!
//! Declare models as [`Schema`]s, work with [`Frame`] instances, query
//! through a [`FrameStore`], and let deletes honor CASCADE, RESTRICT,
//! SET_NULL and SET_DEFAULT relations the store does not enforce itself.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use framedb::{Attribute, Database, Frame, MemoryStore, Schema, StoreConfig};
//! use once_cell::sync::Lazy;
//!
//! static NOTE: Lazy<Schema> = Lazy::new(|| {
//!     Schema::document("Note")
//!         .attribute(Attribute::string("text"))
//!         .build()
//!         .expect("note schema")
//! });
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let db = Database::connect(Arc::new(MemoryStore::new()), StoreConfig::new()).await?;
//! let mut note = Frame::new(&NOTE).with("text", "hello");
//! assert!(note.save(&db).await?);
//! assert!(note.to_json()["_id"].is_string());
//! # Ok::<(), framedb::FrameError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]

pub mod types;

pub use types::*;
