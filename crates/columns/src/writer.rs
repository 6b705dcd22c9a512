use anyhow::{Context, Result};
use linecodec::LineWriter;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{column_path, Row};

/// Writes rows across one [`LineWriter`] per column.
///
/// Every call to [`write_row`](ColumnWriter::write_row) appends exactly one
/// line to every column file, in the fixed column order given at creation.
/// That is the only thing keeping the files aligned, so there is no path that
/// writes a subset of the columns.
pub struct ColumnWriter {
    dir: PathBuf,
    columns: Vec<String>,
    writers: Vec<LineWriter>,
    rows: u64,
}

impl ColumnWriter {
    /// Opens `<dir>/<column>.gz` for every column, appending to existing
    /// files. The directory must already exist.
    ///
    /// If any file fails to open, the writers opened so far are closed before
    /// the error is returned.
    pub fn create<S: AsRef<str>>(dir: &Path, columns: &[S]) -> Result<Self> {
        let mut writers: Vec<LineWriter> = Vec::with_capacity(columns.len());
        for c in columns {
            let path = column_path(dir, c.as_ref());
            match LineWriter::create(&path) {
                Ok(w) => writers.push(w),
                Err(e) => {
                    for w in writers {
                        if let Err(close_err) = w.close() {
                            warn!(error = %close_err, "failed to close column after open failure");
                        }
                    }
                    return Err(e).with_context(|| format!("failed to open column {}", path.display()));
                }
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            writers,
            rows: 0,
        })
    }

    /// Writes one line to every column. Columns missing from `row` get an
    /// empty line.
    ///
    /// # Errors
    ///
    /// Stops at the first failing column. Columns before it already hold the
    /// row's line, so the store is misaligned from then on.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        for (column, writer) in self.columns.iter().zip(self.writers.iter_mut()) {
            let value = row.get(column).map(Vec::as_slice).unwrap_or_default();
            writer
                .write_line(value)
                .with_context(|| format!("failed to write column {}", writer.path().display()))?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Number of rows written through this writer.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Closes every column file. All columns are closed even if one fails;
    /// the last error is returned.
    pub fn close(self) -> Result<()> {
        let mut last_err = None;
        for w in self.writers {
            let path = w.path().to_path_buf();
            if let Err(e) = w.close() {
                warn!(path = %path.display(), error = %e, "failed to close column");
                last_err = Some(anyhow::Error::new(e).context(format!("failed to close column {}", path.display())));
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
