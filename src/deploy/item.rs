//! Deployable file descriptors

use crate::digest::verify::output_files;
use crate::digest::{Algorithm, DigestService, Digests};
use crate::error::{PublishError, PublishResult};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
enum Content {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

/// One output file ready for deployment: root-relative POSIX path, size,
/// both digests, and a content stream that can be reopened for retries.
#[derive(Debug, Clone)]
pub struct DeployItem {
    path: String,
    size: u64,
    digests: Digests,
    content: Content,
}

impl DeployItem {
    /// Build an item for a file under `root` from its stored digests
    pub fn from_file(service: &DigestService, root: &Path, file: &Path) -> PublishResult<Self> {
        let relative = file.strip_prefix(root).map_err(|_| {
            PublishError::Internal(format!(
                "{} is not under {}",
                file.display(),
                root.display()
            ))
        })?;
        let metadata = std::fs::metadata(file)
            .map_err(|e| PublishError::io(format!("reading metadata of {}", file.display()), e))?;

        Ok(Self {
            path: posix_path(relative),
            size: metadata.len(),
            digests: service.load(file)?,
            content: Content::File(file.to_path_buf()),
        })
    }

    /// Build an item from in-memory content, digested on the spot
    pub fn from_bytes(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let path = path.into().trim_start_matches('/').to_string();
        let bytes: Vec<u8> = bytes.into();
        Self {
            digests: Digests::of_bytes(&path, &bytes),
            size: bytes.len() as u64,
            path,
            content: Content::Memory(bytes.into()),
        }
    }

    /// Root-relative POSIX path without a leading slash
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Absolute site path, with a leading slash
    pub fn site_path(&self) -> String {
        format!("/{}", self.path)
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Both digests
    pub fn digests(&self) -> &Digests {
        &self.digests
    }

    /// Hex digest for one algorithm
    pub fn digest(&self, algorithm: Algorithm) -> String {
        self.digests.hex(algorithm)
    }

    /// Open a fresh content stream
    pub fn open(&self) -> PublishResult<Box<dyn Read + Send>> {
        match &self.content {
            Content::File(path) => {
                let file = File::open(path)
                    .map_err(|e| PublishError::io(format!("opening {}", path.display()), e))?;
                Ok(Box::new(file))
            }
            Content::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }

    /// Read the whole content into memory
    pub fn read_all(&self) -> PublishResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size as usize);
        self.open()?
            .read_to_end(&mut buf)
            .map_err(|e| PublishError::io(format!("reading {}", self.path), e))?;
        Ok(buf)
    }
}

/// Collect every output file under `root` as a deploy item
pub fn collect_items(service: &DigestService, root: &Path) -> PublishResult<Vec<DeployItem>> {
    let items = output_files(root)?
        .iter()
        .map(|file| DeployItem::from_file(service, root, file))
        .collect::<PublishResult<Vec<_>>>()?;
    debug!("Collected {} deploy items from {}", items.len(), root.display());
    Ok(items)
}

fn posix_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
