//! Opaque document identifiers
//!
//! `ObjectId` is the store-native identifier type. It is a UUID v4 newtype,
//! rendered as 32 lowercase hex digits. Parsing accepts both the simple
//! (hex) and hyphenated UUID forms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a string is not a valid identifier
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid object id: {0:?}")]
pub struct ObjectIdParseError(pub String);

/// Store-assigned document identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        ObjectId(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        ObjectId(uuid)
    }

    /// Parse an identifier from its string form
    pub fn parse_str(s: &str) -> Result<Self, ObjectIdParseError> {
        Uuid::parse_str(s)
            .map(ObjectId)
            .map_err(|_| ObjectIdParseError(s.to_string()))
    }

    /// Hex string form (no hyphens)
    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
    }
}
