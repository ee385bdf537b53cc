//! Typed document models over a schemaless store
//!
//! This crate maps model instances onto store documents:
//! - [`Attribute`] / [`Schema`]: statically declared models
//! - [`Record`]: values, dirty tracking, validation, rendering, projection
//! - [`Frame`]: persisted instances (insert, update, upsert, delete, ...)
//! - [`SubFrame`]: embedded instances
//! - [`FrameStore`]: queries, aggregation and bulk writes per model
//!
//! Deleting a [`Frame`] runs its schema's child relations first, emulating
//! CASCADE, RESTRICT, SET_NULL and SET_DEFAULT foreign keys.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod error;
pub mod frame;
pub mod hooks;
pub mod integrity;
pub mod record;
pub mod schema;
pub mod store;
pub mod subframe;

pub use attribute::{AttrKind, Attribute, DefaultPolicy, RefTarget, Validator, NULL_MESSAGE};
pub use error::{FrameError, FrameResult};
pub use frame::{Frame, ID_FIELD};
pub use hooks::{Hook, HookEvent, HookId};
pub use integrity::{parent_key, ParentKey};
pub use record::Record;
pub use schema::{ChildRelation, ModelRef, OnDelete, Schema, SchemaBuilder, SchemaKind};
pub use store::{BatchItem, FrameStore, COUNT_FIELD};
pub use subframe::SubFrame;
