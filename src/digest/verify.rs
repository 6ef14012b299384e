//! Post-build checksum verification
//!
//! Runs after every render task has finished writing. Each file is
//! re-read from disk and both digests are compared with the stored ones;
//! files are independent at this point, so the pass fans out over rayon.

use super::service::DigestService;
use super::store::is_sidecar;
use super::Algorithm;
use crate::error::{PublishError, PublishResult};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A stored digest that no longer matches the file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: PathBuf,
    pub algorithm: Algorithm,
    pub expected: String,
    pub actual: String,
}

/// Outcome of a verification pass
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Number of output files checked
    pub checked: usize,
    /// Every mismatching digest found
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    /// True when every file matched its stored digests
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Number of distinct files with at least one mismatch
    pub fn failed_files(&self) -> usize {
        let mut paths: Vec<&Path> = self.mismatches.iter().map(|m| m.path.as_path()).collect();
        paths.dedup();
        paths.len()
    }
}

/// Re-reads output and compares it against stored digests
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumVerifier {
    service: DigestService,
}

impl ChecksumVerifier {
    /// Create a verifier reading metadata through `service`
    pub fn new(service: DigestService) -> Self {
        Self { service }
    }

    /// Check every output file under `root` and report mismatches
    pub fn check(&self, root: &Path) -> PublishResult<VerifyReport> {
        let files = output_files(root)?;
        debug!("Verifying {} files under {}", files.len(), root.display());

        let per_file = files
            .par_iter()
            .map(|path| self.check_file(path))
            .collect::<PublishResult<Vec<_>>>()?;

        let mismatches: Vec<Mismatch> = per_file.into_iter().flatten().collect();
        for m in &mismatches {
            warn!(
                "Checksum mismatch for {}: {} expected {} but found {}",
                m.path.display(),
                m.algorithm,
                m.expected,
                m.actual
            );
        }

        Ok(VerifyReport {
            checked: files.len(),
            mismatches,
        })
    }

    /// Returns false if any file under `root` no longer matches its digests
    pub fn verify(&self, root: &Path) -> PublishResult<bool> {
        Ok(self.check(root)?.is_ok())
    }

    /// Like [`check`](Self::check), but a mismatch is an error.
    ///
    /// This is the gate in front of every deployment.
    pub fn verify_or_abort(&self, root: &Path) -> PublishResult<VerifyReport> {
        let report = self.check(root)?;
        if !report.is_ok() {
            return Err(PublishError::ChecksumMismatch {
                count: report.failed_files(),
            });
        }
        Ok(report)
    }

    fn check_file(&self, path: &Path) -> PublishResult<Vec<Mismatch>> {
        let stored = self.service.load(path)?;
        let actual = DigestService::compute(path)?;

        Ok(Algorithm::all()
            .iter()
            .filter(|a| stored.get(**a) != actual.get(**a))
            .map(|a| Mismatch {
                path: path.to_path_buf(),
                algorithm: *a,
                expected: stored.hex(*a),
                actual: actual.hex(*a),
            })
            .collect())
    }
}

/// Regular output files under `root`, sorted, excluding digest sidecars
pub(crate) fn output_files(root: &Path) -> PublishResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PublishError::PathNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry
            .map_err(|e| PublishError::io(format!("walking {}", root.display()), e.into()))?;
        if entry.file_type().is_file() && !is_sidecar(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
