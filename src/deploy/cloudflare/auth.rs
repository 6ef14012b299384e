//! Upload token cache

use crate::error::PublishResult;
use parking_lot::Mutex;
use tracing::debug;

/// Lazily fetched upload JWT shared by every call of one deployer.
///
/// The fetch runs while the lock is held, so concurrent callers wait for
/// the first fetch and reuse its token instead of fetching their own.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<String>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, fetching one if the cache is empty
    pub fn get(&self, fetch: impl FnOnce() -> PublishResult<String>) -> PublishResult<String> {
        let mut slot = self.slot.lock();
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let token = fetch()?;
        debug!("Fetched new upload token");
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token if it is still `stale`.
    ///
    /// Returns false when another caller already replaced it.
    pub fn invalidate(&self, stale: &str) -> bool {
        let mut slot = self.slot.lock();
        if slot.as_deref() == Some(stale) {
            *slot = None;
            true
        } else {
            false
        }
    }
}
