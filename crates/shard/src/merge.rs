//! Merging finished batches from several trees into one shard directory.
//!
//! Gzip members concatenate, so merging is a raw byte append per column with
//! no recompression. Sizes come from the same estimate the batch writer uses.

use anyhow::{Context, Result};
use columns::column_path;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::recovery::{batch_dir, estimate_batch_size, max_batch};

/// Outcome of [`merge_batches`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Source batches appended.
    pub sources: usize,
    /// Destination batch numbers that received data, in order.
    pub batches: Vec<u64>,
}

/// Appends every batch in `sources` to the batches under `out_dir`.
///
/// Starts at the newest batch in `out_dir`. When adding a source would push
/// the destination past `budget`, moves on to the next number first, so a
/// source larger than the budget skips an empty destination. A source is
/// never split across two destination batches.
///
/// # Errors
///
/// Fails on any I/O error, or when a source is missing one of `columns`.
pub fn merge_batches<P, Q, S>(out_dir: P, sources: &[Q], columns: &[S], budget: u64) -> Result<MergeSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    S: AsRef<str>,
{
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut number = max_batch(out_dir)
        .with_context(|| format!("failed to scan batches in {}", out_dir.display()))?;
    let mut dst = batch_dir(out_dir, number);
    let mut writers: HashMap<String, File> = HashMap::new();
    let mut summary = MergeSummary::default();

    for src in sources {
        let src = src.as_ref();

        let dsize = estimate_batch_size(&dst, columns)?;
        let ssize = estimate_batch_size(src, columns)?;
        debug!(dst = %dst.display(), dsize, src = %src.display(), ssize, "merge sizes");

        if dsize.saturating_add(ssize) > budget {
            info!(dst = %dst.display(), dsize, ssize, budget, "appending would overflow, rotating");
            close_all(&mut writers);
            number += 1;
            dst = batch_dir(out_dir, number);
        }

        fs::create_dir_all(&dst)
            .with_context(|| format!("failed to create {}", dst.display()))?;

        for c in columns {
            let c = c.as_ref();
            let src_path = column_path(src, c);
            let mut input = File::open(&src_path)
                .with_context(|| format!("failed to open {}", src_path.display()))?;

            let output = match writers.entry(c.to_string()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let dst_path = column_path(&dst, c);
                    let f = OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&dst_path)
                        .with_context(|| format!("failed to open {}", dst_path.display()))?;
                    e.insert(f)
                }
            };

            io::copy(&mut input, output)
                .with_context(|| format!("failed to append {}", src_path.display()))?;
        }

        summary.sources += 1;
        if summary.batches.last() != Some(&number) {
            summary.batches.push(number);
        }
    }

    close_all(&mut writers);
    Ok(summary)
}

fn close_all(writers: &mut HashMap<String, File>) {
    for (column, f) in writers.drain() {
        if let Err(e) = f.sync_all() {
            warn!(column = %column, error = %e, "error closing merged column");
        }
    }
}
