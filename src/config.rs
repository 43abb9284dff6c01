//! Configuration options for record engines.
//!
//! This module provides [`EngineConfig`], which controls the collation table,
//! output sorting, buffer growth, and the bounds of the field directory and
//! position stack. Configurations can be built in code or loaded from JSON;
//! every key is optional and falls back to the default.
//!
//! ```
//! use marc_engine::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(
//!     r#"{ "collation": "abc", "sort": { "protected_tags": [400, 599] } }"#,
//! )?;
//! assert_eq!(config.sort.protected_tags, Some((400, 599)));
//! assert!(config.sort.sort_fields);
//! # Ok::<(), marc_engine::MarcError>(())
//! ```

use crate::buffer::DEFAULT_GROWTH_INCREMENT;
use crate::collation::{CollationTable, DEFAULT_COLLATION};
use crate::cursor::MAX_POSITION_DEPTH;
use crate::directory::DEFAULT_MAX_FIELDS;
use crate::error::{MarcError, Result};
use crate::{LEADER_LEN, MAX_RECORD_LENGTH, MAX_TAG};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Most fields that could ever fit in one record: each needs a 12-byte
/// directory entry and at least one data byte besides its terminator.
pub const MAX_DIRECTORY_FIELDS: usize = (MAX_RECORD_LENGTH - LEADER_LEN - 2) / 14;

/// Output ordering applied by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOptions {
    /// Sort fields by tag, insertion order breaking ties.
    pub sort_fields: bool,
    /// Sort subfields within each variable field by collation rank.
    pub sort_subfields: bool,
    /// Inclusive tag range whose fields keep insertion order among themselves.
    pub protected_tags: Option<(u16, u16)>,
}

impl Default for SortOptions {
    fn default() -> Self {
        SortOptions {
            sort_fields: true,
            sort_subfields: false,
            protected_tags: None,
        }
    }
}

/// Configuration for [`Record`](crate::Record) instances.
///
/// # Examples
///
/// ```
/// use marc_engine::{EngineConfig, Record, SortOptions};
///
/// let config = EngineConfig {
///     sort: SortOptions {
///         protected_tags: Some((400, 599)),
///         ..SortOptions::default()
///     },
///     ..EngineConfig::default()
/// };
/// let record = Record::with_config(&config)?;
/// assert!(!record.is_read_only());
/// # Ok::<(), marc_engine::MarcError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Collation string for subfield sorting.
    pub collation: String,
    /// Output ordering.
    pub sort: SortOptions,
    /// Raw buffer growth increment in bytes.
    pub growth_increment: usize,
    /// Maximum number of fields per record, leader excluded.
    pub max_fields: usize,
    /// Maximum depth of the save-position stack.
    pub position_stack_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            collation: DEFAULT_COLLATION.to_string(),
            sort: SortOptions::default(),
            growth_increment: DEFAULT_GROWTH_INCREMENT,
            max_fields: DEFAULT_MAX_FIELDS,
            position_stack_depth: MAX_POSITION_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidConfig`] for malformed JSON or out-of-range
    /// values, [`MarcError::InvalidCollation`] for a bad collation string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| MarcError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration as JSON from `reader` and validate it.
    ///
    /// # Errors
    ///
    /// As for [`EngineConfig::from_json_str`].
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let config: EngineConfig = serde_json::from_reader(reader)
            .map_err(|e| MarcError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidConfig`] or [`MarcError::InvalidCollation`].
    pub fn validate(&self) -> Result<()> {
        self.collation_table()?;
        if self.growth_increment == 0 {
            return Err(MarcError::InvalidConfig(
                "growth_increment must be positive".to_string(),
            ));
        }
        if self.max_fields == 0 || self.max_fields > MAX_DIRECTORY_FIELDS {
            return Err(MarcError::InvalidConfig(format!(
                "max_fields must be in 1-{MAX_DIRECTORY_FIELDS}, got {}",
                self.max_fields
            )));
        }
        if self.position_stack_depth == 0 || self.position_stack_depth > MAX_POSITION_DEPTH {
            return Err(MarcError::InvalidConfig(format!(
                "position_stack_depth must be in 1-{MAX_POSITION_DEPTH}, got {}",
                self.position_stack_depth
            )));
        }
        if let Some((first, last)) = self.sort.protected_tags {
            if first > last || last > MAX_TAG {
                return Err(MarcError::InvalidConfig(format!(
                    "protected_tags must be an ascending range within 0-999, got {first}-{last}"
                )));
            }
        }
        Ok(())
    }

    /// Build the collation table named by `collation`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidCollation`] if the string does not parse.
    pub fn collation_table(&self) -> Result<CollationTable> {
        if self.collation == DEFAULT_COLLATION {
            return Ok(CollationTable::default_table().clone());
        }
        CollationTable::parse(&self.collation)
    }
}
