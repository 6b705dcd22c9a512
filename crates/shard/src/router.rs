//! Fan-out of rows to per-shard batches.

use anyhow::{Context, Result};
use columns::Row;
use config::ShardConfig;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{shard_id, Batch, ShardError, SlugError, SuffixRules};

/// Routes rows to `2^bits` shard directories under one output root.
///
/// A shard's [`Batch`] is opened the first time a row hashes to it and stays
/// open until [`close`](ShardRouter::close). Writes take `&mut self`: one
/// writer drives a router at a time. Wrap it in a `Mutex` to share it.
pub struct ShardRouter {
    dir: PathBuf,
    bits: u32,
    budget: u64,
    key: String,
    columns: Vec<String>,
    rules: SuffixRules,
    batches: BTreeMap<u64, Batch>,
    rows: u64,
}

impl std::fmt::Debug for ShardRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardRouter")
            .field("dir", &self.dir)
            .field("bits", &self.bits)
            .field("budget", &self.budget)
            .field("key", &self.key)
            .field("columns", &self.columns)
            .field("open_shards", &self.batches.len())
            .field("rows", &self.rows)
            .finish()
    }
}

impl ShardRouter {
    /// Creates a router writing under `dir`.
    ///
    /// # Arguments
    ///
    /// * `bits` - there are `2^bits` shards.
    /// * `budget` - batch size budget in bytes.
    /// * `key` - column whose value picks the shard.
    /// * `columns` - columns written to every batch.
    /// * `rules` - public suffix rules used for every slug.
    pub fn new<P: AsRef<Path>, S: AsRef<str>>(
        dir: P,
        bits: u32,
        budget: u64,
        key: &str,
        columns: &[S],
        rules: SuffixRules,
    ) -> Result<Self> {
        anyhow::ensure!(bits < u64::BITS, "shard bits must be below 64, got {}", bits);
        anyhow::ensure!(budget > 0, "batch budget must be greater than zero");
        anyhow::ensure!(!columns.is_empty(), "at least one column is required");

        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            bits,
            budget,
            key: key.to_string(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rules,
            batches: BTreeMap::new(),
            rows: 0,
        })
    }

    /// Creates a router from a validated run configuration. The provenance
    /// column is written alongside the input columns.
    pub fn from_config(cfg: &ShardConfig, rules: SuffixRules) -> Result<Self> {
        cfg.validate().context("invalid shard configuration")?;
        Self::new(
            &cfg.out_dir,
            cfg.shard_bits,
            cfg.batch_size_bytes(),
            &cfg.key_column,
            &cfg.output_columns(),
            rules,
        )
    }

    /// Shard for `row`, from the value of the key column. A row without the
    /// key column is a routing error.
    pub fn shard_of(&self, row: &Row) -> Result<u64, SlugError> {
        let key = row
            .get(&self.key)
            .map(|v| String::from_utf8_lossy(v))
            .unwrap_or_default();
        shard_id(&key, self.bits, &self.rules)
    }

    /// Routes `row` to its shard and writes it.
    ///
    /// # Errors
    ///
    /// * [`ShardError::Routing`] - no shard for this row; nothing written.
    /// * [`ShardError::Storage`] - directory, open or write failure.
    pub fn write_row(&mut self, row: &Row) -> Result<(), ShardError> {
        let shard = self.shard_of(row)?;

        let batch = match self.batches.entry(shard) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let shard_dir = self.dir.join(shard.to_string());
                info!(shard, dir = %shard_dir.display(), "initialising shard");
                fs::create_dir_all(&shard_dir).with_context(|| {
                    format!("failed to create shard dir {}", shard_dir.display())
                })?;
                e.insert(Batch::open(&shard_dir, self.budget, &self.columns)?)
            }
        };

        batch.write_row(row)?;
        self.rows += 1;
        Ok(())
    }

    /// Directory of shard `shard`.
    pub fn shard_dir(&self, shard: u64) -> PathBuf {
        self.dir.join(shard.to_string())
    }

    /// The open batch of `shard`, if any row went there.
    pub fn batch(&self, shard: u64) -> Option<&Batch> {
        self.batches.get(&shard)
    }

    #[must_use]
    pub fn open_shards(&self) -> usize {
        self.batches.len()
    }

    /// Rows written since the router was created.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn rules(&self) -> &SuffixRules {
        &self.rules
    }

    /// Closes every open batch. Every batch is attempted; the last error is
    /// returned.
    pub fn close(&mut self) -> Result<()> {
        let mut last_err = None;
        for (shard, mut batch) in std::mem::take(&mut self.batches) {
            if let Err(e) = batch.close() {
                warn!(shard, error = %e, "failed to close shard");
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Best-effort close on drop.
///
/// Errors are ignored because Drop cannot report them; call
/// [`ShardRouter::close`] to see them.
impl Drop for ShardRouter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
