//! Store error types

use thiserror::Error;

/// Errors raised by the store layer
///
/// Persistence outcomes (nothing matched, nothing deleted) are not errors;
/// they are reported through the result records. These variants cover
/// connectivity, malformed requests and driver failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The database handle was closed
    #[error("database is closed")]
    Closed,

    /// The driver could not reach the backend
    #[error("connection error: {reason}")]
    Connection {
        /// Driver supplied reason
        reason: String,
    },

    /// A filter could not be evaluated
    #[error("invalid filter: {reason}")]
    InvalidFilter {
        /// What was wrong with the filter
        reason: String,
    },

    /// An update specification could not be applied
    #[error("invalid update: {reason}")]
    InvalidUpdate {
        /// What was wrong with the update
        reason: String,
    },

    /// A document with the same identifier already exists
    #[error("duplicate key: {id}")]
    DuplicateKey {
        /// Offending identifier, display form
        id: String,
    },

    /// Transaction lifecycle failure
    #[error("transaction error: {reason}")]
    Transaction {
        /// What went wrong
        reason: String,
    },

    /// Configuration could not be parsed
    #[error("invalid configuration: {reason}")]
    Config {
        /// Parser message
        reason: String,
    },

    /// Any other driver failure
    #[error("driver error: {reason}")]
    Driver {
        /// Driver supplied reason
        reason: String,
    },
}

impl StoreError {
    /// Shorthand for [`StoreError::InvalidFilter`]
    pub fn invalid_filter(reason: impl Into<String>) -> Self {
        StoreError::InvalidFilter {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`StoreError::InvalidUpdate`]
    pub fn invalid_update(reason: impl Into<String>) -> Self {
        StoreError::InvalidUpdate {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`StoreError::Transaction`]
    pub fn transaction(reason: impl Into<String>) -> Self {
        StoreError::Transaction {
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
