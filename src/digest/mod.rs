//! Content digests for rendered output
//!
//! Every output file carries two digests, computed while the file is
//! written and persisted next to it:
//!
//! | Algorithm  | Input                                   | Consumer          |
//! |------------|-----------------------------------------|-------------------|
//! | `sha1`     | raw bytes                               | Netlify           |
//! | `cfdigest` | base64(bytes) + extension, BLAKE3 / 128 | Cloudflare Pages  |
//!
//! Digests are trusted only when produced by [`DigestService`] (or the same
//! [`DualHasher`]); verification re-reads the files after the build.

mod hasher;
pub mod service;
pub mod store;
pub mod verify;

pub use hasher::{extension_of, DualHasher};
pub use service::{DigestService, DigestWriter};
pub use store::{is_sidecar, sidecar_path, DigestStorage};
pub use verify::{ChecksumVerifier, Mismatch, VerifyReport};

use std::fmt;

/// Length of a SHA1 digest in bytes
pub const SHA1_LEN: usize = 20;

/// Length of a cfdigest in bytes (BLAKE3 truncated to 128 bits)
pub const CF_DIGEST_LEN: usize = 16;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    /// SHA1 over the raw content
    Sha1,
    /// BLAKE3-128 over base64 content plus extension
    CfDigest,
}

impl Algorithm {
    /// Metadata key for this algorithm
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::CfDigest => "cfdigest",
        }
    }

    /// Digest length in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => SHA1_LEN,
            Self::CfDigest => CF_DIGEST_LEN,
        }
    }

    /// All algorithms recorded for every output file
    pub fn all() -> &'static [Self] {
        &[Self::Sha1, Self::CfDigest]
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Both digests of one file
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digests {
    sha1: [u8; SHA1_LEN],
    cfdigest: [u8; CF_DIGEST_LEN],
}

impl Digests {
    pub(crate) fn new(sha1: [u8; SHA1_LEN], cfdigest: [u8; CF_DIGEST_LEN]) -> Self {
        Self { sha1, cfdigest }
    }

    /// Digest an in-memory buffer that will be published under `path`
    pub fn of_bytes(path: &str, bytes: &[u8]) -> Self {
        let mut hasher = DualHasher::new(extension_of(path));
        hasher.update(bytes);
        hasher.finalize()
    }

    /// Raw digest bytes for an algorithm
    pub fn get(&self, algorithm: Algorithm) -> &[u8] {
        match algorithm {
            Algorithm::Sha1 => &self.sha1,
            Algorithm::CfDigest => &self.cfdigest,
        }
    }

    /// Lowercase hex rendering of a digest
    pub fn hex(&self, algorithm: Algorithm) -> String {
        hex::encode(self.get(algorithm))
    }

    /// SHA1 digest as 40 hex chars
    pub fn sha1_hex(&self) -> String {
        self.hex(Algorithm::Sha1)
    }

    /// cfdigest as 32 hex chars
    pub fn cfdigest_hex(&self) -> String {
        self.hex(Algorithm::CfDigest)
    }

    /// Iterate over `(algorithm, bytes)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (Algorithm, &[u8])> + '_ {
        Algorithm::all().iter().map(move |a| (*a, self.get(*a)))
    }
}

impl fmt::Debug for Digests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Digests")
            .field("sha1", &self.sha1_hex())
            .field("cfdigest", &self.cfdigest_hex())
            .finish()
    }
}
