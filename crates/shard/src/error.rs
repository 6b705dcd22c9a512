//! Error classes for the write path.
//!
//! A [`ShardError::Routing`] means no shard could be chosen for the row and
//! nothing was written, so the caller can log it and move on. Anything else is
//! a [`ShardError::Storage`] failure and the run should stop.

use thiserror::Error;

/// The key could not be turned into a slug.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("unable to determine host from {key:?}")]
    NoHost { key: String },
}

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("routing error: {0}")]
    Routing(#[from] SlugError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ShardError {
    /// True if the row was skipped before anything hit the disk.
    #[must_use]
    pub fn is_routing(&self) -> bool {
        matches!(self, ShardError::Routing(_))
    }
}
