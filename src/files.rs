//! File reader/writer abstraction injected into the loader and exporter.
//!
//! Inputs are opened once and read forward-only through a
//! [`CountingReader`]; outputs are named sinks, one per logical file (the
//! bulk-import exporter opens several per run). [`DirFiles`] backs both
//! sides with a directory on disk, [`MemFiles`] keeps everything in memory
//! for tests.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Write};
use std::mem;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{acquire_lock, Result};

/// A forward-only character stream that counts consumed bytes and lines,
/// so a status reader can estimate progress through a file.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    bytes: u64,
    lines: u64,
}

impl<R> CountingReader<R> {
    /// Wraps a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes: 0,
            lines: 0,
        }
    }

    /// Bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Newlines consumed so far.
    pub fn lines_read(&self) -> u64 {
        self.lines
    }
}

impl<R: BufRead> CountingReader<R> {
    /// Reads one physical line without its terminator; `None` at EOF.
    /// Used for the raw header scan before the CSV reader takes over.
    pub fn read_raw_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.inner.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.bytes += n as u64;
        if buf.last() == Some(&b'\n') {
            self.lines += 1;
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        String::from_utf8(buf)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(out)?;
        self.bytes += n as u64;
        self.lines += out[..n].iter().filter(|&&b| b == b'\n').count() as u64;
        Ok(n)
    }
}

/// Opens named input files for reading.
pub trait FileProvider {
    /// Opens `name` for a single forward pass.
    fn open(&self, name: &str) -> Result<CountingReader<Box<dyn BufRead>>>;
}

/// Creates named output sinks.
pub trait SinkProvider {
    /// Opens the sink for one logical output file, truncating any
    /// previous content.
    fn create(&self, name: &str) -> Result<Box<dyn Write + '_>>;
}

/// Directory-backed implementation of both file abstractions.
#[derive(Debug, Clone)]
pub struct DirFiles {
    root: PathBuf,
}

impl DirFiles {
    /// Uses `root` as the base directory for all named files.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileProvider for DirFiles {
    fn open(&self, name: &str) -> Result<CountingReader<Box<dyn BufRead>>> {
        let file = File::open(self.root.join(name))?;
        Ok(CountingReader::new(
            Box::new(BufReader::new(file)) as Box<dyn BufRead>
        ))
    }
}

impl SinkProvider for DirFiles {
    fn create(&self, name: &str) -> Result<Box<dyn Write + '_>> {
        let file = File::create(self.root.join(name))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// In-memory implementation of both file abstractions.
#[derive(Debug, Default)]
pub struct MemFiles {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemFiles {
    /// Creates an empty file set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an input file.
    pub fn insert(&self, name: &str, contents: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(name.to_string(), contents.into());
        }
    }

    /// Contents of a written file, as UTF-8.
    pub fn get(&self, name: &str) -> Option<String> {
        let files = self.files.lock().ok()?;
        files
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Sorted names of all files present.
    pub fn names(&self) -> Vec<String> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl FileProvider for MemFiles {
    fn open(&self, name: &str) -> Result<CountingReader<Box<dyn BufRead>>> {
        let files = acquire_lock(&self.files)?;
        let contents = files.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {name}"))
        })?;
        Ok(CountingReader::new(
            Box::new(Cursor::new(contents)) as Box<dyn BufRead>
        ))
    }
}

impl SinkProvider for MemFiles {
    fn create(&self, name: &str) -> Result<Box<dyn Write + '_>> {
        Ok(Box::new(MemSink {
            name: name.to_string(),
            buf: Vec::new(),
            files: &self.files,
        }))
    }
}

struct MemSink<'a> {
    name: String,
    buf: Vec<u8>,
    files: &'a Mutex<BTreeMap<String, Vec<u8>>>,
}

impl Write for MemSink<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Ok(mut files) = self.files.lock() {
            files.insert(self.name.clone(), self.buf.clone());
        }
        Ok(())
    }
}

impl Drop for MemSink<'_> {
    fn drop(&mut self) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(self.name.clone(), mem::take(&mut self.buf));
        }
    }
}
