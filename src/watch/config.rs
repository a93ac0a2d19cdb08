//! Watch configuration and validation.
//!
//! The host hands configuration over as untyped JSON; everything is shape-
//! checked here before any scanning starts. Validation failure is the only
//! error that ever propagates out of the watch path.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Pattern watched when a spec does not name one.
pub const DEFAULT_BASE_PATH: &str = "/opt/so/saltstack/local/salt/hypervisor/hosts/*/add_*";

/// Errors produced by configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The top-level configuration was not a sequence of records.
    #[error("Configuration must be a list of records")]
    NotAList,

    /// An item in the sequence was not a record.
    #[error("Configuration item {index} must be a record")]
    ItemNotARecord {
        /// Position of the offending item.
        index: usize,
    },

    /// A `base_path` was present but not a string.
    #[error("base_path in configuration item {index} must be a string")]
    BasePathNotAString {
        /// Position of the offending item.
        index: usize,
    },

    /// A `base_path` string was not a well-formed glob pattern.
    #[error("base_path in configuration item {index} is not a valid pattern: {source}")]
    InvalidPattern {
        /// Position of the offending item.
        index: usize,
        /// The underlying pattern error.
        source: glob::PatternError,
    },
}

/// One watch entry: a glob pattern selecting descriptor files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSpec {
    /// Glob pattern for descriptor files; [`DEFAULT_BASE_PATH`] is watched
    /// when absent.
    pub base_path: Option<String>,
}

impl WatchSpec {
    /// The pattern this spec actually watches.
    pub fn pattern(&self) -> &str {
        self.base_path.as_deref().unwrap_or(DEFAULT_BASE_PATH)
    }
}

/// Validate host-supplied configuration into watch specs.
///
/// The accepted shape is a sequence of records, each with an optional string
/// `base_path` holding a well-formed glob pattern. The first violation is
/// returned as a [`ConfigError`] naming the offending item; nothing is
/// scanned on invalid configuration.
pub fn validate(config: &Value) -> Result<Vec<WatchSpec>, ConfigError> {
    let items = config.as_array().ok_or(ConfigError::NotAList)?;

    let mut specs = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let record = item
            .as_object()
            .ok_or(ConfigError::ItemNotARecord { index })?;

        let base_path = match record.get("base_path") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(ConfigError::BasePathNotAString { index }),
        };

        if let Some(pattern) = &base_path {
            Pattern::new(pattern).map_err(|source| ConfigError::InvalidPattern { index, source })?;
        }

        specs.push(WatchSpec { base_path });
    }

    Ok(specs)
}
