//! # Shard - domain-hash partitioning of crawl records
//!
//! Splits a stream of rows into `2^n` shard directories by the registrable
//! domain of a key column, and each shard into size-bounded batches of
//! aligned gzip column files.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                 SHARD ROUTER                  │
//! │                                               │
//! │ key column -> slug -> fnv1_64 % 2^n -> shard  │
//! │              |                                │
//! │              v   (first row for this shard?)  │
//! │           open Batch at <out>/<shard>/        │
//! │              |                                │
//! │              v                                │
//! │ BATCH: running + row_size > budget?           │
//! │              |  yes: close, number += 1       │
//! │              v                                │
//! │ COLUMN WRITER -> one line per column .gz      │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## On-disk layout
//!
//! ```text
//! <out>/<shard>/<batch>/<column>.gz
//! ```
//!
//! Shard ids and batch numbers are plain decimal. Batches start at 1.
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                              |
//! |--------------|------------------------------------------------------|
//! | [`slug`]     | key -> slug -> shard id, [`SuffixRules`]             |
//! | [`batch`]    | rolling size-bounded writer for one shard            |
//! | [`recovery`] | max batch scan, compressed size estimate             |
//! | [`router`]   | lazy per-shard batches, row fan-out                  |
//! | [`merge`]    | appending whole batches without recompression        |
//! | [`stats`]    | per-column byte/record counts, health checks         |
//!
//! ## Errors
//!
//! Routing failures ([`SlugError`]) are safe to skip: nothing was written.
//! Storage failures are not; a batch that failed mid-row may have misaligned
//! columns and is not repaired.
pub mod batch;
mod error;
pub mod merge;
pub mod recovery;
pub mod router;
pub mod slug;
pub mod stats;

pub use batch::Batch;
pub use columns::Row;
pub use error::{ShardError, SlugError};
pub use merge::{merge_batches, MergeSummary};
pub use recovery::{batch_dir, estimate_batch_size, max_batch, COMPRESSION_FACTOR};
pub use router::ShardRouter;
pub use slug::{fnv1_64, shard_id, slug, SuffixRules};
pub use stats::{HealthCheck, ShardHealth, ShardStats, STATS_FILE};

#[cfg(test)]
mod tests;
