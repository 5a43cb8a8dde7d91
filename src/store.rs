//! # Blob Store
//!
//! The engine's sole I/O boundary. Inputs are read and shards are written
//! through [`BlobStore`]; the engine itself never touches the filesystem
//! directly, and it never retries I/O. Retry policy belongs to the store
//! implementation or the compute substrate.
//!
//! Paths are store-relative, `/`-separated strings.

use crate::error::{EngineError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only output sink handed out by [`BlobStore::create`].
pub type BlobSink = Box<dyn Write + Send>;

/// Read/write access to a flat namespace of byte blobs.
pub trait BlobStore: Send + Sync {
    /// Length of a blob in bytes.
    fn len(&self, path: &str) -> Result<u64>;

    /// Whether a blob exists.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Read up to `len` bytes starting at `offset`. A short (or empty)
    /// result past end-of-blob is not an error.
    fn read_at(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Create (or truncate) a blob and return an append-only sink.
    /// Truncation is what makes a retried task's rewrite idempotent.
    fn create(&self, path: &str) -> Result<BlobSink>;

    /// Remove a blob. Removing a missing blob is not an error.
    fn delete(&self, path: &str) -> Result<()>;

    /// Remove a directory subtree. Removing a missing subtree is not an
    /// error.
    fn delete_dir(&self, path: &str) -> Result<()>;
}

/// Filesystem-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl BlobStore for LocalStore {
    fn len(&self, path: &str) -> Result<u64> {
        let meta = fs::metadata(self.resolve(path)).map_err(|e| EngineError::io(path, e))?;
        Ok(meta.len())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }

    fn read_at(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = File::open(self.resolve(path)).map_err(|e| EngineError::io(path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| EngineError::io(path, e))?;
        let mut buffer = Vec::with_capacity(len.min(1 << 20));
        file.take(len as u64)
            .read_to_end(&mut buffer)
            .map_err(|e| EngineError::io(path, e))?;
        Ok(buffer)
    }

    fn create(&self, path: &str) -> Result<BlobSink> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(path, e))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full)
            .map_err(|e| EngineError::io(path, e))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.resolve(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::io(path, e)),
        }
    }

    fn delete_dir(&self, path: &str) -> Result<()> {
        match fs::remove_dir_all(self.resolve(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::io(path, e)),
        }
    }
}

/// Stream one blob into a sink in `chunk_size`-byte reads. Returns the
/// number of bytes copied.
pub fn copy_blob(
    store: &dyn BlobStore,
    source: &str,
    sink: &mut dyn Write,
    chunk_size: usize,
) -> Result<u64> {
    let mut offset = 0u64;
    loop {
        let chunk = store.read_at(source, offset, chunk_size)?;
        if chunk.is_empty() {
            return Ok(offset);
        }
        sink.write_all(&chunk)
            .map_err(|e| EngineError::io(source, e))?;
        offset += chunk.len() as u64;
    }
}
