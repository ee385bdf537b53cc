//! Public types for the framedb API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// ============================================================================
// Value model
// ============================================================================

pub use framedb_core::{doc, Document, ObjectId, Value};
pub use framedb_core::{BatchItemErrors, FieldError, ValidationErrors};

// ============================================================================
// Store layer
// ============================================================================

pub use framedb_store::{Collection, Database, OptionsGuard};
pub use framedb_store::{CollectionOptions, ReadPreference, StoreConfig, WriteConcern};
pub use framedb_store::{Cursor, Namespace, SessionId, StoreDriver, Transactional};
pub use framedb_store::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
pub use framedb_store::{Filter, FindOptions, Projection, SortOrder, Stage, UpdateSpec};
pub use framedb_store::{MemoryStore, StoreError, StoreResult};

// ============================================================================
// Models
// ============================================================================

pub use framedb_frames::{AttrKind, Attribute, DefaultPolicy, RefTarget, NULL_MESSAGE};
pub use framedb_frames::{ChildRelation, ModelRef, OnDelete, Schema, SchemaBuilder, SchemaKind};
pub use framedb_frames::{BatchItem, Frame, FrameStore, Record, SubFrame, COUNT_FIELD, ID_FIELD};
pub use framedb_frames::{parent_key, ParentKey};
pub use framedb_frames::{FrameError, FrameResult};
pub use framedb_frames::{Hook, HookEvent, HookId};
