//! Store layer for framedb
//!
//! This crate defines what the document-mapping layer needs from a document
//! store and ships one implementation of it:
//! - [`StoreDriver`] / [`Transactional`]: the async backend contract
//! - [`Database`] / [`Collection`]: lifecycle, option overrides and logging
//!   around a driver
//! - [`Filter`], [`FindOptions`], [`UpdateSpec`], [`Stage`]: typed query,
//!   update and pipeline descriptions
//! - [`MemoryStore`]: an in-process driver

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod matcher;
pub mod memory;
pub mod query;

pub use config::{CollectionOptions, ReadPreference, StoreConfig, WriteConcern};
pub use database::{Collection, Database, OptionsGuard};
pub use driver::{
    Cursor, DeleteResult, InsertManyResult, InsertOneResult, Namespace, SessionId, StoreDriver,
    Transactional, UpdateResult,
};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{Filter, FindOptions, Projection, SortOrder, Stage, UpdateSpec};
