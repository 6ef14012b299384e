//! Digesting output writer

use super::hasher::DualHasher;
use super::store::{self, DigestStorage};
use super::Digests;
use crate::error::{PublishError, PublishResult};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read buffer size when digesting files already on disk
const READ_BUFFER: usize = 64 * 1024;

/// Writes output files while digesting them, and persists the digests.
///
/// The service holds no per-file state, so one instance can be shared by
/// any number of concurrent render tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestService {
    storage: DigestStorage,
}

impl DigestService {
    /// Create a service persisting digests with the given strategy
    pub fn new(storage: DigestStorage) -> Self {
        Self { storage }
    }

    /// Persistence strategy in use
    pub fn storage(&self) -> DigestStorage {
        self.storage
    }

    /// Open `path` for writing. Parent directories are created.
    ///
    /// Digests recorded for an earlier version of the file are removed up
    /// front. New ones are persisted by [`DigestWriter::finish`], so a
    /// writer dropped without finishing leaves the file without metadata.
    pub fn write(&self, path: &Path) -> PublishResult<DigestWriter> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PublishError::io(format!("creating {}", parent.display()), e))?;
        }
        let file = File::create(path)
            .map_err(|e| PublishError::io(format!("creating {}", path.display()), e))?;
        store::clear(path)?;

        Ok(DigestWriter {
            path: path.to_path_buf(),
            inner: BufWriter::new(file),
            hasher: DualHasher::for_path(path),
            storage: self.storage,
            written: 0,
        })
    }

    /// Write a whole buffer to `path` and persist its digests
    pub fn write_all(&self, path: &Path, bytes: &[u8]) -> PublishResult<Digests> {
        let mut writer = self.write(path)?;
        writer
            .write_all(bytes)
            .map_err(|e| PublishError::io(format!("writing {}", path.display()), e))?;
        writer.finish()
    }

    /// Load the persisted digests of `path`
    pub fn load(&self, path: &Path) -> PublishResult<Digests> {
        store::load(path, self.storage)
    }

    /// Recompute both digests from the bytes currently on disk
    pub fn compute(path: &Path) -> PublishResult<Digests> {
        let mut file = File::open(path)
            .map_err(|e| PublishError::io(format!("opening {}", path.display()), e))?;
        let mut hasher = DualHasher::for_path(path);
        let mut buf = vec![0u8; READ_BUFFER];
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PublishError::io(format!("reading {}", path.display()), e)),
            };
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Digest a file produced outside the service and persist the result.
    ///
    /// Used when an external renderer wrote the output tree directly.
    pub fn stamp(&self, path: &Path) -> PublishResult<Digests> {
        let digests = Self::compute(path)?;
        store::persist(path, &digests, self.storage)?;
        debug!("Stamped {} ({})", path.display(), digests.sha1_hex());
        Ok(digests)
    }
}

/// An output sink that digests everything written through it
pub struct DigestWriter {
    path: PathBuf,
    inner: BufWriter<File>,
    hasher: DualHasher,
    storage: DigestStorage,
    written: u64,
}

impl DigestWriter {
    /// Path being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush the file, finalize both digests and persist them
    pub fn finish(self) -> PublishResult<Digests> {
        let DigestWriter {
            path,
            inner,
            hasher,
            storage,
            written,
        } = self;

        let file = inner
            .into_inner()
            .map_err(|e| PublishError::io(format!("flushing {}", path.display()), e.into_error()))?;
        file.sync_all()
            .map_err(|e| PublishError::io(format!("syncing {}", path.display()), e))?;
        drop(file);

        let digests = hasher.finalize();
        store::persist(&path, &digests, storage)?;
        debug!(
            "Wrote {} ({} bytes, sha1 {})",
            path.display(),
            written,
            digests.sha1_hex()
        );
        Ok(digests)
    }
}

impl Write for DigestWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
