//! Streaming dual-digest accumulator

use super::{Digests, CF_DIGEST_LEN, SHA1_LEN};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::path::Path;

/// Raw bytes encoded per base64 round (multiple of 3)
const ENCODE_CHUNK: usize = 3 * 4096;

/// Lowercase extension without the dot, empty when the name has none
pub fn extension_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Feeds every byte into SHA1 and into the cfdigest pipeline at once.
///
/// The cfdigest side base64-encodes incrementally. Up to two trailing bytes
/// are carried between updates so the encoded stream is identical to
/// encoding the whole content in one go.
pub struct DualHasher {
    sha1: Sha1,
    blake: blake3::Hasher,
    carry: [u8; 3],
    carry_len: usize,
    encoded: String,
    extension: String,
}

impl DualHasher {
    /// Create a hasher for a file with the given (lowercase) extension
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            sha1: Sha1::new(),
            blake: blake3::Hasher::new(),
            carry: [0; 3],
            carry_len: 0,
            encoded: String::with_capacity(ENCODE_CHUNK / 3 * 4),
            extension: extension.into(),
        }
    }

    /// Create a hasher whose extension is taken from `path`
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self::new(extension_of(path))
    }

    /// Absorb the next slice of content
    pub fn update(&mut self, data: &[u8]) {
        self.sha1.update(data);

        let mut data = data;
        if self.carry_len > 0 {
            let take = (3 - self.carry_len).min(data.len());
            self.carry[self.carry_len..self.carry_len + take].copy_from_slice(&data[..take]);
            self.carry_len += take;
            data = &data[take..];
            if self.carry_len < 3 {
                return;
            }
            let carry = self.carry;
            self.encode(&carry);
            self.carry_len = 0;
        }

        let whole = data.len() / 3 * 3;
        for chunk in data[..whole].chunks(ENCODE_CHUNK) {
            self.encode(chunk);
        }

        let rest = &data[whole..];
        self.carry[..rest.len()].copy_from_slice(rest);
        self.carry_len = rest.len();
    }

    /// Finish both digests
    pub fn finalize(mut self) -> Digests {
        if self.carry_len > 0 {
            let carry = self.carry;
            self.encode(&carry[..self.carry_len]);
        }
        // The extension is appended raw, after the padded base64 stream.
        self.blake.update(self.extension.as_bytes());

        let mut sha1 = [0u8; SHA1_LEN];
        sha1.copy_from_slice(&self.sha1.finalize());

        let mut cfdigest = [0u8; CF_DIGEST_LEN];
        cfdigest.copy_from_slice(&self.blake.finalize().as_bytes()[..CF_DIGEST_LEN]);

        Digests::new(sha1, cfdigest)
    }

    fn encode(&mut self, chunk: &[u8]) {
        self.encoded.clear();
        STANDARD.encode_string(chunk, &mut self.encoded);
        self.blake.update(self.encoded.as_bytes());
    }
}
