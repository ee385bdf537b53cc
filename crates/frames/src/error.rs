//! Error types for the mapping layer

use framedb_core::{BatchItemErrors, ValidationErrors};
use framedb_store::StoreError;
use thiserror::Error;

/// Errors raised by frames and frame stores
///
/// Persistence outcomes (nothing updated, nothing deleted, refused delete)
/// are reported as `bool`/`u64` results, not errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    /// One or more attributes failed validation
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Items of a batch insert failed validation; nothing was inserted
    #[error("batch validation failed for {} item(s)", .0.len())]
    BatchValidation(Vec<BatchItemErrors>),

    /// The store layer failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A child relation is declared but the child has no attribute
    /// referencing the parent
    #[error("no attribute of {child} references {parent}")]
    RelationNotFound {
        /// Parent model name
        parent: String,
        /// Child model name
        child: String,
    },

    /// A schema declaration is inconsistent
    #[error("invalid schema: {reason}")]
    Schema {
        /// What is wrong
        reason: String,
    },

    /// Input could not be turned into a document
    #[error("conversion error: {reason}")]
    Conversion {
        /// What is wrong
        reason: String,
    },
}

impl FrameError {
    /// Field errors of a [`FrameError::Validation`]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            FrameError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Result type for frame operations
pub type FrameResult<T> = Result<T, FrameError>;
