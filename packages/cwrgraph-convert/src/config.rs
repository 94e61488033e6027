//! Converter configuration
//!
//! Defaults keep the historical behaviour: 16 workers, every transaction
//! filed under `NWR`, unterminated groups dropped with a warning.
//!
//! ```yaml
//! version: 1
//! converter:
//!   workers: 8
//!   queue_capacity: 128
//!   transaction_keying: main_record
//!   strict_groups: true
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_WORKERS: usize = 16;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

const MAX_WORKERS: usize = 1024;
const MAX_QUEUE_CAPACITY: usize = 65_536;
const SUPPORTED_VERSION: u32 = 1;

pub const ENV_WORKERS: &str = "CWRGRAPH_WORKERS";
pub const ENV_QUEUE_CAPACITY: &str = "CWRGRAPH_QUEUE_CAPACITY";
pub const ENV_STRICT_GROUPS: &str = "CWRGRAPH_STRICT_GROUPS";

/// Which key a finished transaction is filed under in its group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKeying {
    /// Always `NWR`, even for transactions opened by `REV`
    #[default]
    WorkRegistration,
    /// The tag of the record that opened the transaction
    MainRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Concurrent encode/store workers
    pub workers: usize,
    /// Capacity of the job and result queues
    pub queue_capacity: usize,
    pub transaction_keying: TransactionKeying,
    /// Reject groups that are never closed by a group trailer
    pub strict_groups: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            transaction_keying: TransactionKeying::default(),
            strict_groups: false,
        }
    }
}

/// YAML schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFileV1 {
    version: Option<u32>,
    #[serde(default)]
    converter: ConverterConfig,
}

impl ConverterConfig {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn transaction_keying(mut self, keying: TransactionKeying) -> Self {
        self.transaction_keying = keying;
        self
    }

    pub fn strict_groups(mut self, strict: bool) -> Self {
        self.strict_groups = strict;
        self
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(yaml)?;
        match file.version {
            None => Err(ConfigError::MissingVersion),
            Some(SUPPORTED_VERSION) => {
                file.converter.validate()?;
                Ok(file.converter)
            }
            Some(found) => Err(ConfigError::UnsupportedVersion { found }),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: Some(SUPPORTED_VERSION),
            converter: self.clone(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Apply `CWRGRAPH_*` environment overrides
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    pub(crate) fn with_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_WORKERS) {
            self.workers = parse_env(ENV_WORKERS, &value)?;
        }
        if let Some(value) = lookup(ENV_QUEUE_CAPACITY) {
            self.queue_capacity = parse_env(ENV_QUEUE_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_STRICT_GROUPS) {
            self.strict_groups = parse_env(ENV_STRICT_GROUPS, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range("workers", self.workers, 1, MAX_WORKERS)?;
        check_range("queue_capacity", self.queue_capacity, 1, MAX_QUEUE_CAPACITY)?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn check_range(field: &str, value: usize, min: usize, max: usize) -> ConfigResult<()> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Range {
        field: field.to_string(),
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
    })
}
