//! Reconstructing batch state from what is on disk.
//!
//! Nothing about a batch is persisted beyond its directory tree, so a
//! restarted writer (or the merge tool) recovers its position by scanning.

use anyhow::{bail, Context, Result};
use columns::column_path;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Assumed ratio of decompressed to compressed column size.
pub const COMPRESSION_FACTOR: u64 = 3;

/// Returns `<shard_dir>/<number>`.
pub fn batch_dir(shard_dir: &Path, number: u64) -> PathBuf {
    shard_dir.join(number.to_string())
}

/// Finds the numerically greatest batch directory under `shard_dir`.
///
/// Entries whose names are not plain decimal numbers are ignored. Returns `1`
/// when there are none, which is where a fresh shard starts.
pub fn max_batch(shard_dir: &Path) -> io::Result<u64> {
    let mut max = 1u64;
    for entry in fs::read_dir(shard_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(n) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u64>().ok())
        {
            max = max.max(n);
        }
    }
    Ok(max)
}

/// Estimates how many bytes were written into the batch at `dir`.
///
/// Takes the largest compressed column file and multiplies it by
/// [`COMPRESSION_FACTOR`]. This never decompresses anything, so it is cheap
/// but approximate. A batch with no column files (or no directory) is 0.
///
/// # Errors
///
/// Fails if some column holds data while another column file is missing,
/// since such a batch cannot be aligned.
pub fn estimate_batch_size<S: AsRef<str>>(dir: &Path, columns: &[S]) -> Result<u64> {
    let mut largest = 0u64;
    let mut missing: Option<&str> = None;

    for c in columns {
        let path = column_path(dir, c.as_ref());
        match fs::metadata(&path) {
            Ok(meta) => largest = largest.max(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                missing.get_or_insert(c.as_ref());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to stat {}", path.display()));
            }
        }
    }

    if let Some(c) = missing {
        if largest > 0 {
            bail!("batch {} holds data but column {} is missing", dir.display(), c);
        }
    }

    Ok(largest.saturating_mul(COMPRESSION_FACTOR))
}
