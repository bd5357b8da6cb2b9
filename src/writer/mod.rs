//! Output artifact framing.
//!
//! The artifact is created once with a `USE [db]` header, closed, and then
//! reopened in append mode for every rendered object. Generated text is UTF-8
//! with CR LF line terminators; module definitions are written as stored.
//! Every batch ends with a `GO` line.

use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const WRITER_BUFFER_SIZE: usize = 256 * 1024;
pub const BATCH_FLUSH_COUNT: usize = 100;

const LINE_END: &[u8] = b"\r\n";
const BATCH_TERMINATOR: &[u8] = b"GO\r\n";

/// One batch of script text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// Text produced by the scripter; line terminators are normalized to CR LF
    Generated(String),
    /// Module definition from the catalog, written byte for byte
    Verbatim(String),
}

impl Batch {
    pub fn generated(text: impl Into<String>) -> Self {
        Batch::Generated(text.into())
    }

    pub fn verbatim(text: impl Into<String>) -> Self {
        Batch::Verbatim(text.into())
    }

    pub fn text(&self) -> &str {
        match self {
            Batch::Generated(text) | Batch::Verbatim(text) => text,
        }
    }
}

/// Header selecting the database, written exactly once at the start
pub fn database_header(database: &str) -> String {
    format!("USE [{}]\r\nGO\r\n", database.replace(']', "]]"))
}

/// Append-only writer over the artifact
pub struct ScriptWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
    batch_count: usize,
    max_batch_buffer: usize,
}

impl ScriptWriter {
    /// Remove a previous artifact; a missing file is fine
    pub fn remove_existing(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Create the artifact (truncating anything there) with only the header.
    ///
    /// Returns the number of header bytes written.
    pub fn create_with_header(path: &Path, database: &str) -> io::Result<u64> {
        let header = database_header(database);
        let mut file = File::create(path)?;
        file.write_all(header.as_bytes())?;
        file.sync_all()?;
        Ok(header.len() as u64)
    }

    /// Open an existing artifact for appending
    pub fn open_append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::with_capacity(WRITER_BUFFER_SIZE, file),
            bytes_written: 0,
            batch_count: 0,
            max_batch_buffer: BATCH_FLUSH_COUNT,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended through this writer
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append one batch followed by `GO`
    pub fn write(&mut self, batch: &Batch) -> io::Result<()> {
        match batch {
            Batch::Generated(text) => self.write_batch(text),
            Batch::Verbatim(text) => self.write_verbatim_batch(text),
        }
    }

    /// Append one generated batch followed by `GO`.
    ///
    /// Line terminators are normalized to CR LF and trailing blank lines dropped.
    pub fn write_batch(&mut self, batch: &str) -> io::Result<()> {
        let body = batch.trim_end_matches(['\r', '\n']);
        if !body.is_empty() {
            for line in body.split('\n') {
                let line = line.strip_suffix('\r').unwrap_or(line);
                self.write_bytes(line.as_bytes())?;
                self.write_bytes(LINE_END)?;
            }
        }
        self.end_batch()
    }

    /// Append text exactly as given followed by `GO`.
    ///
    /// Only the trailing line terminators are replaced by a single CR LF, so the
    /// `GO` lands on its own line.
    pub fn write_verbatim_batch(&mut self, text: &str) -> io::Result<()> {
        let body = text.trim_end_matches(['\r', '\n']);
        if !body.is_empty() {
            self.write_bytes(body.as_bytes())?;
            self.write_bytes(LINE_END)?;
        }
        self.end_batch()
    }

    fn end_batch(&mut self) -> io::Result<()> {
        self.write_bytes(BATCH_TERMINATOR)?;

        self.batch_count += 1;
        if self.batch_count >= self.max_batch_buffer {
            self.batch_count = 0;
            self.writer.flush()?;
        }

        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.batch_count = 0;
        self.writer.flush()
    }

    /// Flush and close, returning the bytes appended
    pub fn finish(mut self) -> io::Result<u64> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(self.bytes_written)
    }
}

/// Hex SHA-256 of a file's contents
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
