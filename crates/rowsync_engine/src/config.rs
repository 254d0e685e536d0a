//! Configuration for a sync pass.
//!
//! All settings are passed explicitly into [`Reconciler::sync`]; the engine
//! keeps no global configuration.
//!
//! [`Reconciler::sync`]: crate::Reconciler::sync

use crate::error::ConfigError;
use rowsync_protocol::Value;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Default identity field name on the destination.
pub const DEFAULT_IDENTITY_FIELD: &str = "ID";

/// Default number of records requested per destination page.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Connection settings handed to the source provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    /// Connection string or location understood by the provider.
    pub connection: String,
    /// Additional provider-specific parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl SourceConfig {
    /// Creates a source configuration.
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds a provider parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Settings for the destination store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Endpoint or location understood by the store.
    pub endpoint: String,
    /// Name of the store-assigned identity field.
    pub identity_field: String,
    /// Records requested per page when reading the destination.
    pub page_size: u32,
    /// Maximum operations per submitted batch. `None` submits each phase
    /// as a single batch.
    pub max_batch_size: Option<usize>,
}

impl DestinationConfig {
    /// Creates a destination configuration.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_batch_size: None,
        }
    }

    /// Sets the identity field name.
    pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Caps the number of operations per batch.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    /// Checks sizes and names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity_field.is_empty() {
            return Err(ConfigError::Empty {
                field: "identity_field",
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroSize { field: "page_size" });
        }
        if self.max_batch_size == Some(0) {
            return Err(ConfigError::ZeroSize {
                field: "max_batch_size",
            });
        }
        Ok(())
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// How to treat primary keys that are not unique.
///
/// Under [`FirstWins`](Self::FirstWins) a source key that appears on more
/// than one row is only logged. Every such row is classified on its own, so
/// a first pass inserts one record per row and later passes keep rewriting
/// the matched record with whichever row differs. The mapping never
/// converges. Use [`Fail`](Self::Fail) when the source key is not
/// guaranteed unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Match only the first destination record seen for each key. The
    /// others are left untouched while their key exists in the source.
    #[default]
    FirstWins,
    /// Abort the mapping when any key is duplicated, in the source rows or
    /// in the destination records.
    Fail,
}

/// One source query mapped onto one destination list.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    /// Name used in logs and errors.
    pub name: String,
    /// Query handed to the source provider.
    pub query: String,
    /// Destination list identifier.
    pub list: String,
    /// Field used to match source rows to destination records.
    pub primary_key: String,
    /// Value substituted for source nulls.
    #[serde(default)]
    pub null_sentinel: Value,
    /// Duplicate key handling.
    #[serde(default)]
    pub duplicate_keys: DuplicateKeyPolicy,
}

impl MappingConfig {
    /// Creates a mapping.
    pub fn new(
        name: impl Into<String>,
        query: impl Into<String>,
        list: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            list: list.into(),
            primary_key: primary_key.into(),
            null_sentinel: Value::Null,
            duplicate_keys: DuplicateKeyPolicy::FirstWins,
        }
    }

    /// Sets the null sentinel.
    pub fn with_null_sentinel(mut self, sentinel: impl Into<Value>) -> Self {
        self.null_sentinel = sentinel.into();
        self
    }

    /// Sets the duplicate key policy.
    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }

    /// Checks the mapping against the destination it targets.
    pub fn validate(&self, destination: &DestinationConfig) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Empty { field: "name" });
        }
        if self.list.is_empty() {
            return Err(ConfigError::Empty { field: "list" });
        }
        if self.primary_key.is_empty() {
            return Err(ConfigError::Empty {
                field: "primary_key",
            });
        }
        destination.validate()?;
        if self.primary_key == destination.identity_field {
            return Err(ConfigError::PrimaryKeyIsIdentity(self.primary_key.clone()));
        }
        Ok(())
    }
}
