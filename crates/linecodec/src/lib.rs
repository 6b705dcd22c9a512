//! # Line Codec
//!
//! Reads and writes gzip-compressed files made of newline-delimited byte
//! strings ("lines"). One file holds all values of one column.
//!
//! ## File format
//!
//! ```text
//! [gzip member][gzip member]...
//!
//! decompressed payload:  line \n line \n ... line [\n]
//! ```
//!
//! Every [`LineWriter`] opens its file in append mode and starts a fresh gzip
//! member, so a file that was reopened N times holds N concatenated members.
//! The reader decodes all members as one stream. Lines must not contain an
//! embedded `\n`; callers base64-encode free text before it gets here.
//!
//! ## Reading
//!
//! [`LineReader::lines`] spawns one worker thread that decompresses the file
//! and hands each line over a zero-capacity channel. The worker can never run
//! more than one line ahead of the consumer. Dropping the [`Lines`] iterator
//! disconnects the channel, the worker's next send fails, and the thread exits.
//!
//! ## Example
//!
//! ```rust,no_run
//! use linecodec::{LineReader, LineWriter};
//!
//! let mut w = LineWriter::create("url.gz").unwrap();
//! w.write_line(b"http://example.com/").unwrap();
//! w.close().unwrap();
//!
//! for line in LineReader::open("url.gz").unwrap().lines().unwrap() {
//!     println!("{}", String::from_utf8_lossy(&line.unwrap()));
//! }
//! ```

use crossbeam_channel::{bounded, Receiver, Sender};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::warn;

/// Comment stored in the gzip header of every member we write.
pub const WRITER_COMMENT: &str = "Written by crawlshard";

/// Initial capacity of a line buffer on the read side.
const LINE_CAPACITY: usize = 1024;

/// Errors that can occur while reading or writing a line file.
#[derive(Debug, Error)]
pub enum LineError {
    /// Opening, writing or finishing a file failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The compressed stream failed part way through.
    #[error("error reading column {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a reader does when the compressed stream fails mid-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Hand the error to the consumer as the last item of the stream. The
    /// consumer is expected to abort the run.
    #[default]
    Fatal,
    /// Log the error and end this stream as if it had reached EOF.
    LogAndStop,
}

/// Appends lines to a gzip-compressed file.
pub struct LineWriter {
    enc: GzEncoder<BufWriter<File>>,
    path: PathBuf,
    lines: u64,
}

impl LineWriter {
    /// Opens (or creates) `path` in append mode and starts a new gzip member
    /// at best compression.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, LineError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let enc = GzBuilder::new()
            .comment(WRITER_COMMENT)
            .write(BufWriter::new(file), Compression::best());
        Ok(Self {
            enc,
            path,
            lines: 0,
        })
    }

    /// Writes `line` followed by a single `\n`.
    pub fn write_line(&mut self, line: &[u8]) -> Result<(), LineError> {
        self.enc.write_all(line)?;
        self.enc.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Number of lines written through this writer (not the whole file).
    #[must_use]
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finishes the gzip member, then flushes and releases the file.
    ///
    /// The compressed trailer is always written before the file handle is
    /// dropped.
    pub fn close(self) -> Result<(), LineError> {
        let buffered = self.enc.finish()?;
        let mut file = buffered.into_inner().map_err(|e| e.into_error())?;
        file.flush()?;
        Ok(())
    }
}

/// Reads lines back out of a gzip-compressed source.
///
/// Generic over any `Read` implementor so tests can feed in-memory buffers;
/// files are opened with [`LineReader::open`].
pub struct LineReader<R: Read + Send + 'static = File> {
    src: R,
    label: PathBuf,
    policy: ReadPolicy,
}

impl LineReader<File> {
    /// Opens `path` for reading. Fails immediately if the file is missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LineError> {
        let label = path.as_ref().to_path_buf();
        let src = File::open(&label)?;
        Ok(Self {
            src,
            label,
            policy: ReadPolicy::default(),
        })
    }
}

impl<R: Read + Send + 'static> LineReader<R> {
    /// Wraps an arbitrary compressed source. `label` is only used in errors
    /// and log lines.
    pub fn from_reader<P: Into<PathBuf>>(src: R, label: P) -> Self {
        Self {
            src,
            label: label.into(),
            policy: ReadPolicy::default(),
        }
    }

    /// Sets the mid-stream error policy (default [`ReadPolicy::Fatal`]).
    #[must_use]
    pub fn with_policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.label
    }

    /// Starts the background decoder and returns the line iterator.
    pub fn lines(self) -> Result<Lines, LineError> {
        let (tx, rx) = bounded(0);
        let name = self
            .label
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "lines".to_string());
        let worker = thread::Builder::new()
            .name(format!("linecodec-{}", name))
            .spawn(move || pump(self.src, self.label, self.policy, tx))?;
        Ok(Lines {
            rx: Some(rx),
            worker: Some(worker),
        })
    }
}

/// Decoder loop run on the worker thread.
fn pump<R: Read>(
    src: R,
    label: PathBuf,
    policy: ReadPolicy,
    tx: Sender<Result<Vec<u8>, LineError>>,
) {
    let mut rdr = BufReader::new(MultiGzDecoder::new(src));
    loop {
        let mut line = Vec::with_capacity(LINE_CAPACITY);
        match rdr.read_until(b'\n', &mut line) {
            Ok(0) => return,
            Ok(_) => {
                if line.last() == Some(&b'\n') {
                    line.pop();
                }
                if tx.send(Ok(line)).is_err() {
                    // consumer hung up
                    return;
                }
            }
            Err(e) => {
                match policy {
                    ReadPolicy::Fatal => {
                        let _ = tx.send(Err(LineError::Read {
                            path: label,
                            source: e,
                        }));
                    }
                    ReadPolicy::LogAndStop => {
                        warn!(path = %label.display(), error = %e, "error reading column, ending stream");
                    }
                }
                return;
            }
        }
    }
}

/// Lazy, forward-only iterator over the lines of one file.
///
/// Each item is a line without its trailing newline. Under
/// [`ReadPolicy::Fatal`] a read failure shows up as one final `Err` item.
pub struct Lines {
    rx: Option<Receiver<Result<Vec<u8>, LineError>>>,
    worker: Option<JoinHandle<()>>,
}

impl Iterator for Lines {
    type Item = Result<Vec<u8>, LineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl Drop for Lines {
    fn drop(&mut self) {
        // Disconnect first so a worker parked in `send` wakes up and exits.
        drop(self.rx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
