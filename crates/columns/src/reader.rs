use anyhow::{Context, Result};
use linecodec::{LineError, LineReader, Lines, ReadPolicy};
use std::path::Path;

use crate::{column_path, Row};

/// Opens the column files of one store for reading.
///
/// Every file is opened up front, so a missing column fails here rather than
/// part way through the rows.
pub struct ColumnReader {
    columns: Vec<String>,
    readers: Vec<LineReader>,
}

impl ColumnReader {
    /// Opens `<dir>/<column>.gz` for every column with the default
    /// [`ReadPolicy::Fatal`].
    pub fn open<S: AsRef<str>>(dir: &Path, columns: &[S]) -> Result<Self> {
        let mut readers = Vec::with_capacity(columns.len());
        for c in columns {
            let path = column_path(dir, c.as_ref());
            let reader = LineReader::open(&path)
                .with_context(|| format!("failed to open column {}", path.display()))?;
            readers.push(reader);
        }
        Ok(Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            readers,
        })
    }

    /// Applies `policy` to every column stream.
    #[must_use]
    pub fn with_policy(self, policy: ReadPolicy) -> Self {
        Self {
            columns: self.columns,
            readers: self
                .readers
                .into_iter()
                .map(|r| r.with_policy(policy))
                .collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Starts one decoder per column and returns the row iterator.
    pub fn rows(self) -> Result<Rows> {
        let mut streams = Vec::with_capacity(self.readers.len());
        for r in self.readers {
            streams.push(r.lines()?);
        }
        Ok(Rows {
            columns: self.columns,
            streams,
            done: false,
        })
    }
}

/// Lazy iterator zipping one line from each column into a [`Row`].
///
/// Iteration ends as soon as any column runs out. Extra lines in longer
/// columns are silently ignored. Dropping the iterator shuts every column
/// decoder down.
pub struct Rows {
    columns: Vec<String>,
    streams: Vec<Lines>,
    done: bool,
}

impl Iterator for Rows {
    type Item = Result<Row, LineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.streams.is_empty() {
            return None;
        }

        let mut row = Row::with_capacity(self.columns.len());
        for (column, stream) in self.columns.iter().zip(self.streams.iter_mut()) {
            match stream.next() {
                Some(Ok(value)) => {
                    row.insert(column.clone(), value);
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
        Some(Ok(row))
    }
}
