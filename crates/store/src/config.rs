//! Store configuration
//!
//! [`StoreConfig`] is the process-wide configuration handed to
//! [`Database::connect`](crate::Database::connect). It can be built in code
//! or parsed from TOML:
//!
//! ```
//! use framedb_store::{StoreConfig, ReadPreference};
//!
//! let config = StoreConfig::from_toml_str(r#"
//!     database = "shop"
//!     transactional_deletes = false
//!
//!     [collection_options]
//!     read_preference = "secondary_preferred"
//! "#).unwrap();
//!
//! assert_eq!(config.database, "shop");
//! assert_eq!(config.collection_options.read_preference, ReadPreference::SecondaryPreferred);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Which replica serves reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPreference {
    /// Always the primary (default)
    #[default]
    Primary,
    /// Primary when available
    PrimaryPreferred,
    /// Always a secondary
    Secondary,
    /// Secondary when available
    SecondaryPreferred,
    /// Lowest latency member
    Nearest,
}

/// Acknowledgement required for writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteConcern {
    /// Acknowledged by the primary (default)
    #[default]
    Acknowledged,
    /// Acknowledged by a majority
    Majority,
    /// Fire and forget
    Unacknowledged,
}

/// Per-collection driver options
///
/// ```
/// use framedb_store::{CollectionOptions, WriteConcern};
///
/// let opts = CollectionOptions::new()
///     .write_concern(WriteConcern::Majority)
///     .max_time_ms(500);
/// assert_eq!(opts.max_time_ms, Some(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionOptions {
    /// Read routing
    pub read_preference: ReadPreference,
    /// Write acknowledgement
    pub write_concern: WriteConcern,
    /// Server-side time limit per operation
    pub max_time_ms: Option<u64>,
}

impl CollectionOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read preference
    pub fn read_preference(mut self, preference: ReadPreference) -> Self {
        self.read_preference = preference;
        self
    }

    /// Set the write concern
    pub fn write_concern(mut self, concern: WriteConcern) -> Self {
        self.write_concern = concern;
        self
    }

    /// Set the per-operation time limit
    pub fn max_time_ms(mut self, millis: u64) -> Self {
        self.max_time_ms = Some(millis);
        self
    }
}

/// Process-wide store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database every collection lives in
    pub database: String,
    /// Wrap a delete and its referential actions in one store transaction
    /// when the driver supports transactions
    pub transactional_deletes: bool,
    /// Options applied to collections without an override
    pub collection_options: CollectionOptions,
}

impl StoreConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config {
            reason: e.to_string(),
        })
    }

    /// Set the database name
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database = name.into();
        self
    }

    /// Enable or disable transactional deletes
    pub fn transactional_deletes(mut self, enabled: bool) -> Self {
        self.transactional_deletes = enabled;
        self
    }

    /// Set the default collection options
    pub fn collection_options(mut self, options: CollectionOptions) -> Self {
        self.collection_options = options;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "default".to_string(),
            transactional_deletes: true,
            collection_options: CollectionOptions::default(),
        }
    }
}
