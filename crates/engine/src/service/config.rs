//! Service configuration via `uniqnum.toml`
//!
//! On first open, a default `uniqnum.toml` is created in the data directory.
//! To change settings, edit the file and restart.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use uniqnum_core::{Error, Result, ValueKind, ValueSpace};

use crate::allocator::RetryPolicy;

/// Config file name placed in the service data directory.
pub const CONFIG_FILE_NAME: &str = "uniqnum.toml";

/// Snapshot file for the integer space
pub const INTEGER_SNAPSHOT_FILE: &str = "used_numbers.json";
/// Snapshot file for the decimal space
pub const DECIMAL_SNAPSHOT_FILE: &str = "used_decimals.json";
/// SQLite database shared by both spaces
pub const SQLITE_FILE: &str = "random_numbers.db";

/// Where issued values are recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStrategy {
    /// JSON snapshot rewritten on every reservation
    Snapshot,
    /// SQLite table with a uniqueness constraint
    Sqlite,
    /// Non-durable, in-process set
    Memory,
}

/// Inclusive integer range
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IntegerRangeConfig {
    /// Smallest value (inclusive)
    #[serde(default = "default_integer_min")]
    pub min: i64,
    /// Largest value (inclusive)
    #[serde(default = "default_integer_max")]
    pub max: i64,
}

fn default_integer_min() -> i64 {
    100
}

fn default_integer_max() -> i64 {
    100_000
}

impl Default for IntegerRangeConfig {
    fn default() -> Self {
        Self {
            min: default_integer_min(),
            max: default_integer_max(),
        }
    }
}

/// Half-open decimal range with fixed precision
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DecimalRangeConfig {
    /// Smallest value (inclusive)
    #[serde(default)]
    pub min: f64,
    /// Upper bound (exclusive)
    #[serde(default = "default_decimal_max")]
    pub max: f64,
    /// Fractional digits kept after rounding
    #[serde(default = "default_decimal_precision")]
    pub precision: u32,
}

fn default_decimal_max() -> f64 {
    1e8
}

fn default_decimal_precision() -> u32 {
    6
}

impl Default for DecimalRangeConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: default_decimal_max(),
            precision: default_decimal_precision(),
        }
    }
}

/// Service configuration loaded from `uniqnum.toml`.
///
/// # Example
///
/// ```toml
/// storage = "snapshot"
/// default_kind = "integer"
/// max_attempts = 5
/// backoff_ms = 10
///
/// [integer]
/// min = 100
/// max = 100000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Storage strategy: `"snapshot"`, `"sqlite"` or `"memory"`.
    #[serde(default = "default_storage_str")]
    pub storage: String,
    /// Kind used when a request carries no selector.
    #[serde(default = "default_kind_str")]
    pub default_kind: String,
    /// Candidates drawn per allocation before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between colliding attempts, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Integer space.
    #[serde(default)]
    pub integer: IntegerRangeConfig,
    /// Decimal space; absent means decimal requests are rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal: Option<DecimalRangeConfig>,
}

fn default_storage_str() -> String {
    "snapshot".to_string()
}

fn default_kind_str() -> String {
    "integer".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_ms() -> u64 {
    10
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage: default_storage_str(),
            default_kind: default_kind_str(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            integer: IntegerRangeConfig::default(),
            decimal: None,
        }
    }
}

impl ServiceConfig {
    /// Parse the storage string into a `StorageStrategy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"snapshot"`, `"sqlite"` or
    /// `"memory"`.
    pub fn storage_strategy(&self) -> Result<StorageStrategy> {
        match self.storage.as_str() {
            "snapshot" => Ok(StorageStrategy::Snapshot),
            "sqlite" => Ok(StorageStrategy::Sqlite),
            "memory" => Ok(StorageStrategy::Memory),
            other => Err(Error::Config(format!(
                "Invalid storage '{}' in uniqnum.toml. Expected \"snapshot\", \"sqlite\" or \"memory\".",
                other
            ))),
        }
    }

    /// Parse the default kind selector.
    pub fn default_kind(&self) -> Result<ValueKind> {
        self.default_kind
            .parse()
            .map_err(|_| Error::Config(format!("Invalid default_kind '{}'", self.default_kind)))
    }

    /// Retry policy built from `max_attempts` and `backoff_ms`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_backoff(Duration::from_millis(self.backoff_ms))
    }

    /// SQLite busy timeout.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// The configured integer space.
    pub fn integer_space(&self) -> Result<ValueSpace> {
        ValueSpace::integer(self.integer.min, self.integer.max)
            .map_err(|e| Error::Config(format!("[integer]: {}", e)))
    }

    /// The configured decimal space, if any.
    pub fn decimal_space(&self) -> Result<Option<ValueSpace>> {
        self.decimal
            .map(|d| {
                ValueSpace::decimal(d.min, d.max, d.precision)
                    .map_err(|e| Error::Config(format!("[decimal]: {}", e)))
            })
            .transpose()
    }

    /// Check every field that is stored as a string or needs a range check.
    pub fn validate(&self) -> Result<()> {
        self.storage_strategy()?;
        let kind = self.default_kind()?;
        if self.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        self.integer_space()?;
        if self.decimal_space()?.is_none() && kind == ValueKind::Decimal {
            return Err(Error::Config(
                "default_kind is \"decimal\" but no [decimal] section is configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# uniqnum configuration
#
# Storage strategy: "snapshot" (default), "sqlite" or "memory"
#   "snapshot" = JSON file per space, rewritten on every allocation
#   "sqlite"   = one row per value, uniqueness enforced by the database
#   "memory"   = nothing persisted, values repeat after restart
storage = "snapshot"

# Kind used when a request does not name one: "integer" or "decimal"
default_kind = "integer"

# Candidates drawn per allocation before reporting failure
max_attempts = 5

# Pause between colliding attempts (0 disables)
backoff_ms = 10

# How long SQLite waits on a locked database
busy_timeout_ms = 5000

[integer]
min = 100
max = 100000

# Decimal values in [min, max), rounded to `precision` digits.
# Uncomment to enable decimal requests.
# [decimal]
# min = 0.0
# max = 100000000.0
# precision = 6
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ServiceConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
