//! Digest metadata persistence
//!
//! Digests live in extended attributes (`user.pawgen.<algorithm>`, raw
//! bytes) when the filesystem supports them, or in a sidecar dot-file
//! `.<name>.digests` holding hex strings as JSON.

use super::{Algorithm, Digests, CF_DIGEST_LEN, SHA1_LEN};
use crate::error::{PublishError, PublishResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix for digest extended attributes
pub const XATTR_PREFIX: &str = "user.pawgen.";

/// Suffix of sidecar digest files
pub const SIDECAR_SUFFIX: &str = ".digests";

/// Where digests are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestStorage {
    /// Extended attributes, falling back to sidecars when unsupported
    #[default]
    Auto,
    /// Extended attributes only
    Xattr,
    /// Sidecar files only
    Sidecar,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SidecarFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cfdigest: Option<String>,
}

/// Sidecar path for an output file: `dir/.name.digests`
pub fn sidecar_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}{}", name, SIDECAR_SUFFIX))
}

/// Check whether a path is a digest sidecar rather than site output
pub fn is_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| {
            n.starts_with('.') && n.ends_with(SIDECAR_SUFFIX) && n.len() > 1 + SIDECAR_SUFFIX.len()
        })
}

/// Persist digests for `path` using the configured strategy
pub(crate) fn persist(path: &Path, digests: &Digests, storage: DigestStorage) -> PublishResult<()> {
    match storage {
        DigestStorage::Sidecar => write_sidecar(path, digests),
        DigestStorage::Xattr => match write_xattrs(path, digests) {
            Ok(()) => Ok(()),
            Err(e) if is_unsupported(&e) => {
                Err(PublishError::XattrUnsupported(path.to_path_buf()))
            }
            Err(e) => Err(PublishError::io(
                format!("writing digest attributes on {}", path.display()),
                e,
            )),
        },
        DigestStorage::Auto => match write_xattrs(path, digests) {
            Ok(()) => Ok(()),
            Err(e) if is_unsupported(&e) => {
                debug!(
                    "Extended attributes unavailable for {}, using sidecar",
                    path.display()
                );
                write_sidecar(path, digests)
            }
            Err(e) => Err(PublishError::io(
                format!("writing digest attributes on {}", path.display()),
                e,
            )),
        },
    }
}

/// Load persisted digests for `path`
pub(crate) fn load(path: &Path, storage: DigestStorage) -> PublishResult<Digests> {
    match storage {
        DigestStorage::Sidecar => read_sidecar(path),
        DigestStorage::Xattr => read_xattrs(path)?.ok_or_else(|| missing(path, Algorithm::Sha1)),
        DigestStorage::Auto => match read_xattrs(path)? {
            Some(digests) => Ok(digests),
            None => read_sidecar(path),
        },
    }
}

/// Drop every digest persisted for `path`, whichever storage holds it
pub(crate) fn clear(path: &Path) -> PublishResult<()> {
    clear_xattrs(path).map_err(|e| {
        PublishError::io(
            format!("clearing digest attributes on {}", path.display()),
            e,
        )
    })?;

    let sidecar = sidecar_path(path);
    match fs::remove_file(&sidecar) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PublishError::io(
            format!("removing digest sidecar {}", sidecar.display()),
            e,
        )),
    }
}

fn write_sidecar(path: &Path, digests: &Digests) -> PublishResult<()> {
    let sidecar = SidecarFile {
        sha1: Some(digests.sha1_hex()),
        cfdigest: Some(digests.cfdigest_hex()),
    };
    let target = sidecar_path(path);
    let content = serde_json::to_string(&sidecar)?;
    fs::write(&target, content)
        .map_err(|e| PublishError::io(format!("writing digest sidecar {}", target.display()), e))
}

fn read_sidecar(path: &Path) -> PublishResult<Digests> {
    let target = sidecar_path(path);
    if !target.exists() {
        return Err(missing(path, Algorithm::Sha1));
    }

    let content = fs::read_to_string(&target)
        .map_err(|e| PublishError::io(format!("reading digest sidecar {}", target.display()), e))?;
    let sidecar: SidecarFile = serde_json::from_str(&content)?;

    let sha1 = decode_hex(path, Algorithm::Sha1, sidecar.sha1.as_deref())?;
    let cfdigest = decode_hex(path, Algorithm::CfDigest, sidecar.cfdigest.as_deref())?;
    assemble(path, &sha1, &cfdigest)
}

fn decode_hex(path: &Path, algorithm: Algorithm, value: Option<&str>) -> PublishResult<Vec<u8>> {
    let value = value.ok_or_else(|| missing(path, algorithm))?;
    hex::decode(value).map_err(|_| invalid(path, algorithm))
}

/// Returns `Ok(None)` when no digest attribute is present at all; a
/// half-written pair is reported as missing.
#[cfg(unix)]
fn read_xattrs(path: &Path) -> PublishResult<Option<Digests>> {
    let mut values = Vec::with_capacity(2);
    for algorithm in Algorithm::all() {
        let name = format!("{}{}", XATTR_PREFIX, algorithm.name());
        let value = match xattr::get(path, &name) {
            Ok(value) => value,
            Err(e) if is_unsupported(&e) => return Ok(None),
            Err(e) => {
                return Err(PublishError::io(
                    format!("reading digest attributes on {}", path.display()),
                    e,
                ))
            }
        };
        values.push((*algorithm, value));
    }

    match (&values[0], &values[1]) {
        ((_, None), (_, None)) => Ok(None),
        ((_, Some(sha1)), (_, Some(cfdigest))) => assemble(path, sha1, cfdigest).map(Some),
        ((algorithm, None), _) | (_, (algorithm, None)) => Err(missing(path, *algorithm)),
    }
}

#[cfg(unix)]
fn clear_xattrs(path: &Path) -> io::Result<()> {
    for algorithm in Algorithm::all() {
        let name = format!("{}{}", XATTR_PREFIX, algorithm.name());
        match xattr::get(path, &name) {
            Ok(Some(_)) => xattr::remove(path, &name)?,
            Ok(None) => {}
            Err(e) if is_unsupported(&e) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn clear_xattrs(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn read_xattrs(_path: &Path) -> PublishResult<Option<Digests>> {
    Ok(None)
}

#[cfg(unix)]
fn write_xattrs(path: &Path, digests: &Digests) -> io::Result<()> {
    if !xattr::SUPPORTED_PLATFORM {
        return Err(io::Error::from(io::ErrorKind::Unsupported));
    }
    for (algorithm, bytes) in digests.iter() {
        let name = format!("{}{}", XATTR_PREFIX, algorithm.name());
        xattr::set(path, &name, bytes)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn write_xattrs(_path: &Path, _digests: &Digests) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

fn is_unsupported(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::Unsupported {
        return true;
    }
    #[cfg(unix)]
    {
        let code = e.raw_os_error();
        code == Some(libc::ENOTSUP) || code == Some(libc::EOPNOTSUPP)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

fn assemble(path: &Path, sha1: &[u8], cfdigest: &[u8]) -> PublishResult<Digests> {
    let sha1: [u8; SHA1_LEN] = sha1
        .try_into()
        .map_err(|_| invalid(path, Algorithm::Sha1))?;
    let cfdigest: [u8; CF_DIGEST_LEN] = cfdigest
        .try_into()
        .map_err(|_| invalid(path, Algorithm::CfDigest))?;
    Ok(Digests::new(sha1, cfdigest))
}

fn missing(path: &Path, algorithm: Algorithm) -> PublishError {
    PublishError::MissingDigest {
        path: path.to_path_buf(),
        algorithm: algorithm.name().to_string(),
    }
}

fn invalid(path: &Path, algorithm: Algorithm) -> PublishError {
    PublishError::InvalidDigest {
        path: path.to_path_buf(),
        algorithm: algorithm.name().to_string(),
    }
}
