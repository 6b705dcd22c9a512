//! Per-batch statistics and health checks.
//!
//! The reader silently stops at the shortest column, so this is where column
//! divergence actually gets noticed: every column file is counted on its own.

use anyhow::{Context, Result};
use columns::column_path;
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use linecodec::{LineReader, ReadPolicy, WRITER_COMMENT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// File the stats are persisted to, inside the batch directory.
pub const STATS_FILE: &str = "stats.json.gz";

/// Byte and record counts for every column of one batch. `-1` marks a column
/// file that is missing or could not be read to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    pub shard: PathBuf,
    pub bytes: BTreeMap<String, i64>,
    pub records: BTreeMap<String, i64>,
}

/// One named health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub description: String,
    pub status: bool,
}

/// All checks plus the fraction that passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardHealth {
    pub overall: f32,
    pub tests: BTreeMap<String, HealthCheck>,
}

impl ShardStats {
    /// Counts every column under `dir`. Never fails; problems are recorded
    /// as `-1` and logged.
    pub fn calc<P: AsRef<Path>, S: AsRef<str>>(dir: P, columns: &[S]) -> Self {
        let dir = dir.as_ref();
        let mut stats = Self {
            shard: dir.to_path_buf(),
            bytes: BTreeMap::new(),
            records: BTreeMap::new(),
        };

        for c in columns {
            let c = c.as_ref();
            let path = column_path(dir, c);
            let bytes = match fs::metadata(&path) {
                Ok(m) => i64::try_from(m.len()).unwrap_or(i64::MAX),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "error reading column");
                    -1
                }
            };
            stats.bytes.insert(c.to_string(), bytes);
            let records = if bytes < 0 { -1 } else { count_records(&path) };
            stats.records.insert(c.to_string(), records);
        }
        stats
    }

    /// True if every readable column has the same number of records.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        let mut counts = self.records.values().filter(|&&n| n >= 0);
        match counts.next() {
            Some(first) => counts.all(|n| n == first),
            None => true,
        }
    }

    /// Total records, taken from the first readable column.
    #[must_use]
    pub fn rows(&self) -> Option<i64> {
        self.records.values().copied().find(|&n| n >= 0)
    }

    /// Runs the health checks.
    pub fn health(&self) -> ShardHealth {
        let mut tests = BTreeMap::new();

        let present = self.bytes.values().all(|&b| b >= 0);
        tests.insert(
            "columns".to_string(),
            HealthCheck {
                description: "All column files are present".to_string(),
                status: present,
            },
        );

        let readable = self.records.values().all(|&n| n >= 0);
        tests.insert(
            "readable".to_string(),
            HealthCheck {
                description: "All column files decompress cleanly".to_string(),
                status: readable,
            },
        );

        tests.insert(
            "records".to_string(),
            HealthCheck {
                description: "Number of records matches".to_string(),
                status: self.is_aligned(),
            },
        );

        let passed = tests.values().filter(|t| t.status).count();
        ShardHealth {
            overall: passed as f32 / tests.len() as f32,
            tests,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Writes the stats to `<shard>/stats.json.gz`.
    pub fn write(&self) -> Result<()> {
        let path = self.shard.join(STATS_FILE);
        let json = serde_json::to_vec(self)?;
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut enc = GzBuilder::new()
            .comment(WRITER_COMMENT)
            .write(file, Compression::best());
        enc.write_all(&json)?;
        enc.finish()?.flush()?;
        Ok(())
    }

    /// Loads stats previously written by [`write`](ShardStats::write).
    pub fn read<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(STATS_FILE);
        let file = File::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut json = Vec::new();
        GzDecoder::new(file)
            .read_to_end(&mut json)
            .with_context(|| format!("failed to decompress {}", path.display()))?;
        serde_json::from_slice(&json).with_context(|| format!("failed to parse {}", path.display()))
    }
}

fn count_records(path: &Path) -> i64 {
    let lines = match LineReader::open(path)
        .map(|r| r.with_policy(ReadPolicy::Fatal))
        .and_then(|r| r.lines())
    {
        Ok(lines) => lines,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "error opening column");
            return -1;
        }
    };

    let mut n = 0i64;
    for line in lines {
        if let Err(e) = line {
            warn!(path = %path.display(), error = %e, "error reading column");
            return -1;
        }
        n += 1;
    }
    n
}
