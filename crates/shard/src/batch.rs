//! Rolling, size-bounded batch writer for one shard.
//!
//! ```text
//! <shard>/1/url.gz  <shard>/1/mime.gz  ...
//! <shard>/2/url.gz  <shard>/2/mime.gz  ...
//! ```
//!
//! The size of a row is the length of its widest column value. When the next
//! row would push the running size past the budget, the current batch is
//! closed and writing continues in the next number.

use anyhow::{Context, Result};
use columns::{ColumnWriter, Row};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::recovery::{batch_dir, estimate_batch_size, max_batch};

/// The current batch of one shard plus the state needed to roll over.
pub struct Batch {
    /// Shard directory holding the numbered batches.
    dir: PathBuf,
    number: u64,
    budget: u64,
    /// Approximate bytes in the current batch.
    running: u64,
    columns: Vec<String>,
    writer: Option<ColumnWriter>,
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("dir", &self.dir)
            .field("number", &self.number)
            .field("budget", &self.budget)
            .field("running", &self.running)
            .field("columns", &self.columns)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

impl Batch {
    /// Opens the newest batch under `dir` for appending.
    ///
    /// The batch number is recovered with [`max_batch`] and the running size
    /// with [`estimate_batch_size`], so a restarted writer keeps filling the
    /// batch it left off in. `dir` must exist.
    pub fn open<P: AsRef<Path>, S: AsRef<str>>(dir: P, budget: u64, columns: &[S]) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let number = max_batch(&dir)
            .with_context(|| format!("failed to scan batches in {}", dir.display()))?;

        let mut batch = Self {
            dir,
            number,
            budget,
            running: 0,
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            writer: None,
        };
        let writer = batch.open_current()?;
        batch.writer = Some(writer);
        Ok(batch)
    }

    /// Writes `row` into the current batch, rotating first if it would not
    /// fit.
    ///
    /// At most one rotation happens per write. A row larger than the whole
    /// budget therefore always lands alone in a fresh batch, even when the
    /// current one is still empty.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        let row_size = self.row_size(row);

        if self.running.saturating_add(row_size) > self.budget {
            self.rotate(row_size)?;
        }

        if self.writer.is_none() {
            let writer = self.open_current()?;
            self.writer = Some(writer);
        }
        let path = self.path();
        let writer = self
            .writer
            .as_mut()
            .with_context(|| format!("batch {} is not open", path.display()))?;

        writer
            .write_row(row)
            .with_context(|| format!("failed to write row to batch {}", path.display()))?;
        self.running += row_size;
        Ok(())
    }

    /// Length of the widest configured column value in `row`.
    fn row_size(&self, row: &Row) -> u64 {
        self.columns
            .iter()
            .filter_map(|c| row.get(c))
            .map(|v| v.len() as u64)
            .max()
            .unwrap_or(0)
    }

    /// Closes the current batch and moves to the next number. The new batch
    /// is opened lazily by the next write.
    fn rotate(&mut self, row_size: u64) -> Result<()> {
        info!(
            batch = %self.path().display(),
            row_size,
            running = self.running,
            budget = self.budget,
            "row would overflow batch, rotating"
        );
        let closed = self.writer.take();
        self.running = 0;
        self.number += 1;
        if let Some(writer) = closed {
            writer.close()?;
        }
        Ok(())
    }

    /// Creates the current batch directory, re-estimates its size and opens
    /// its columns for appending.
    fn open_current(&mut self) -> Result<ColumnWriter> {
        let bdir = self.path();
        debug!(batch = %bdir.display(), "opening batch");
        fs::create_dir_all(&bdir)
            .with_context(|| format!("failed to create batch dir {}", bdir.display()))?;
        self.running = estimate_batch_size(&bdir, &self.columns)?;
        ColumnWriter::create(&bdir, &self.columns)
    }

    /// Directory of the current batch.
    pub fn path(&self) -> PathBuf {
        batch_dir(&self.dir, self.number)
    }

    pub fn shard_dir(&self) -> &Path {
        &self.dir
    }

    /// Current batch number.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Approximate bytes in the current batch.
    #[must_use]
    pub fn running_size(&self) -> u64 {
        self.running
    }

    #[must_use]
    pub fn budget(&self) -> u64 {
        self.budget
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Finalizes every column file of the current batch. Safe to call more
    /// than once.
    pub fn close(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(writer) => writer.close(),
            None => Ok(()),
        }
    }
}
