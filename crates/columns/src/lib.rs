//! # Columns - synchronized multi-column storage
//!
//! A column store is a directory holding one gzip line file per column:
//!
//! ```text
//! <dir>/url.gz
//! <dir>/mime.gz
//! <dir>/plain_text.gz
//! ```
//!
//! Line `i` of every file belongs to row `i`. [`ColumnWriter`] keeps the files
//! aligned by writing exactly one line to every column on every call, using an
//! empty line for a field the row does not carry. [`ColumnReader`] zips the
//! files back together one line from each per row, and stops at the shortest
//! column.

mod reader;
mod writer;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use linecodec::{LineError, ReadPolicy};
pub use reader::{ColumnReader, Rows};
pub use writer::ColumnWriter;

/// File extension of every column file.
pub const COLUMN_EXT: &str = "gz";

/// One record: column name -> opaque value bytes.
pub type Row = HashMap<String, Vec<u8>>;

/// Returns `<dir>/<column>.gz`.
pub fn column_path(dir: &Path, column: &str) -> PathBuf {
    dir.join(format!("{}.{}", column, COLUMN_EXT))
}

#[cfg(test)]
mod tests;
