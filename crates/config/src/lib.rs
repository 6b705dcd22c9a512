//! # Config - run configuration for crawlshard
//!
//! A single [`ShardConfig`] value describes one sharding run: where the tree
//! goes, how many shards, how large a batch may grow, which column is the
//! routing key and which columns are stored.
//!
//! ## Environment
//!
//! ```text
//! CRAWLSHARD_OUT_DIR      output root                   (default: ".")
//! CRAWLSHARD_SHARD_BITS   shard count is 2^bits         (default: 8)
//! CRAWLSHARD_BATCH_MB     batch budget in MiB           (default: 100)
//! CRAWLSHARD_KEY          routing key column            (default: "url")
//! CRAWLSHARD_COLUMNS      comma-separated input columns (default: "plain_text,url,mime")
//! CRAWLSHARD_SUFFIX_FILE  extra public suffix rules     (default: unset)
//! CRAWLSHARD_FATAL_READ   abort on column read errors   (default: "true")
//! ```

use linecodec::ReadPolicy;
use std::path::PathBuf;
use thiserror::Error;

/// Largest accepted `shard_bits`. 2^32 directories is already absurd.
pub const MAX_SHARD_BITS: u32 = 32;

pub const DEFAULT_SHARD_BITS: u32 = 8;
pub const DEFAULT_BATCH_MB: u64 = 100;
pub const DEFAULT_KEY_COLUMN: &str = "url";
pub const DEFAULT_COLUMNS: &[&str] = &["plain_text", "url", "mime"];
pub const DEFAULT_PROVENANCE_COLUMN: &str = "source";

/// Validation failures for a [`ShardConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("shard bits {0} out of range (max {max})", max = MAX_SHARD_BITS)]
    ShardBits(u32),

    #[error("batch size must be greater than zero")]
    BatchSize,

    #[error("at least one column is required")]
    NoColumns,

    #[error("invalid column name {0:?}")]
    ColumnName(String),

    #[error("duplicate column {0:?}")]
    DuplicateColumn(String),

    #[error("key column {0:?} is not among the configured columns")]
    KeyNotInColumns(String),

    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },
}

/// Settings for one sharding run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardConfig {
    pub out_dir: PathBuf,
    pub shard_bits: u32,
    pub batch_size_mb: u64,
    pub key_column: String,
    /// Columns read from every input and written to every batch.
    pub columns: Vec<String>,
    /// Column holding the synthesized `hostname:input` provenance tag.
    pub provenance_column: String,
    pub suffix_file: Option<PathBuf>,
    pub fatal_read_errors: bool,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            shard_bits: DEFAULT_SHARD_BITS,
            batch_size_mb: DEFAULT_BATCH_MB,
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            columns: DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            provenance_column: DEFAULT_PROVENANCE_COLUMN.to_string(),
            suffix_file: None,
            fatal_read_errors: true,
        }
    }
}

impl ShardConfig {
    /// Builds a config from `CRAWLSHARD_*` variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Like [`from_env`](ShardConfig::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("CRAWLSHARD_OUT_DIR") {
            cfg.out_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CRAWLSHARD_SHARD_BITS") {
            cfg.shard_bits = parse_env("CRAWLSHARD_SHARD_BITS", v)?;
        }
        if let Some(v) = lookup("CRAWLSHARD_BATCH_MB") {
            cfg.batch_size_mb = parse_env("CRAWLSHARD_BATCH_MB", v)?;
        }
        if let Some(v) = lookup("CRAWLSHARD_KEY") {
            cfg.key_column = v;
        }
        if let Some(v) = lookup("CRAWLSHARD_COLUMNS") {
            cfg.columns = split_columns(&v);
        }
        if let Some(v) = lookup("CRAWLSHARD_SUFFIX_FILE") {
            if !v.is_empty() {
                cfg.suffix_file = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = lookup("CRAWLSHARD_FATAL_READ") {
            cfg.fatal_read_errors = parse_env("CRAWLSHARD_FATAL_READ", v)?;
        }

        Ok(cfg)
    }

    /// Checks the invariants the writer relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_bits > MAX_SHARD_BITS {
            return Err(ConfigError::ShardBits(self.shard_bits));
        }
        if self.batch_size_mb == 0 {
            return Err(ConfigError::BatchSize);
        }
        if self.columns.is_empty() {
            return Err(ConfigError::NoColumns);
        }
        let mut seen = std::collections::HashSet::new();
        for c in self.columns.iter().chain(std::iter::once(&self.provenance_column)) {
            if !is_valid_column(c) {
                return Err(ConfigError::ColumnName(c.clone()));
            }
            if !seen.insert(c.as_str()) {
                return Err(ConfigError::DuplicateColumn(c.clone()));
            }
        }
        if !self.columns.contains(&self.key_column) {
            return Err(ConfigError::KeyNotInColumns(self.key_column.clone()));
        }
        Ok(())
    }

    /// Batch budget in bytes.
    #[must_use]
    pub fn batch_size_bytes(&self) -> u64 {
        self.batch_size_mb.saturating_mul(1024 * 1024)
    }

    /// Input columns followed by the provenance column.
    #[must_use]
    pub fn output_columns(&self) -> Vec<String> {
        let mut cols = self.columns.clone();
        cols.push(self.provenance_column.clone());
        cols
    }

    #[must_use]
    pub fn read_policy(&self) -> ReadPolicy {
        if self.fatal_read_errors {
            ReadPolicy::Fatal
        } else {
            ReadPolicy::LogAndStop
        }
    }
}

/// Splits a comma-separated column list, dropping blanks.
pub fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

// column names become file names
fn is_valid_column(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
