//! Validation error records
//!
//! Validation never stops at the first bad attribute. Every failure is
//! recorded as a [`FieldError`] and the full list is reported at once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One `{attribute: message}` validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Attribute that failed to clean
    pub attribute: String,
    /// Human readable reason
    pub message: String,
}

impl FieldError {
    /// Create a new field error
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.attribute, self.message)
    }
}

/// Accumulated result of one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    /// All failures in attribute declaration order
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Empty error list
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// True when nothing failed
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failures
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Message recorded for an attribute, if any
    pub fn message_for(&self, attribute: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.attribute == attribute)
            .map(|e| e.message.as_str())
    }

    /// Iterate over the failures
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.errors.iter()
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        ValidationErrors { errors }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Validation failures of one item in a batch, by input position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemErrors {
    /// Position of the item in the submitted batch
    pub index: usize,
    /// Failures for that item
    pub errors: ValidationErrors,
}

impl fmt::Display for BatchItemErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.errors)
    }
}
