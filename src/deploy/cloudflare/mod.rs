//! Cloudflare Pages deployer
//!
//! Pages stores assets by content digest (cfdigest). A deployment is a
//! manifest mapping every site path to a digest; only digests the asset
//! store is missing get uploaded, in size-bounded batches.

mod auth;
mod client;
pub mod content_type;

pub use auth::TokenCache;
pub use client::{Deployment, PagesApi, PagesClient, UploadEntry, UploadMetadata};

use super::item::DeployItem;
use super::retry::{Retrier, RetryPolicy};
use super::{DeploySummary, Deployer, Provider};
use crate::config::CloudflareConfig;
use crate::error::{PublishError, PublishResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use client::PROVIDER;
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest file Pages accepts
pub const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Upper bound on the content bytes of one upload batch
pub const MAX_BATCH_BYTES: u64 = 25 * 1024 * 1024;

/// Upper bound on the number of files in one upload batch
pub const MAX_BATCH_FILES: usize = 1000;

/// Site path sent with deployment creation instead of as an asset
pub const REDIRECTS_PATH: &str = "_redirects";

/// Items split by how they reach the provider
struct Partition<'a> {
    normal: Vec<&'a DeployItem>,
    redirects: Option<&'a DeployItem>,
    dropped: usize,
}

fn partition(items: &[DeployItem]) -> Partition<'_> {
    let mut out = Partition {
        normal: Vec::with_capacity(items.len()),
        redirects: None,
        dropped: 0,
    };
    for item in items {
        if item.size() > MAX_FILE_SIZE {
            warn!(
                "Skipping {}: {} bytes exceeds the {} byte Pages limit",
                item.path(),
                item.size(),
                MAX_FILE_SIZE
            );
            out.dropped += 1;
        } else if item.path() == REDIRECTS_PATH {
            out.redirects = Some(item);
        } else {
            out.normal.push(item);
        }
    }
    out
}

/// First item per cfdigest, in input order
fn unique_by_digest<'a>(items: &[&'a DeployItem]) -> Vec<&'a DeployItem> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.digests().cfdigest_hex()))
        .copied()
        .collect()
}

/// Split items into batches bounded by total size and file count
fn batches<'a>(items: &[&'a DeployItem]) -> Vec<Vec<&'a DeployItem>> {
    let mut batches = Vec::new();
    let mut current: Vec<&DeployItem> = Vec::new();
    let mut current_bytes = 0u64;

    for item in items {
        let full = current_bytes + item.size() > MAX_BATCH_BYTES || current.len() >= MAX_BATCH_FILES;
        if full && !current.is_empty() {
            batches.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += item.size();
        current.push(item);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Publishes a file collection as one Pages deployment
pub struct CloudflarePagesDeployer<A: PagesApi = PagesClient> {
    api: A,
    retrier: Retrier,
    tokens: TokenCache,
    progress: ProgressBar,
}

impl CloudflarePagesDeployer<PagesClient> {
    /// Build a deployer from configuration; token, account and project are required
    pub fn from_config(config: &CloudflareConfig, max_attempts: u32) -> PublishResult<Self> {
        let setting = |value: &Option<String>, key: &'static str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or(PublishError::MissingSetting {
                    provider: PROVIDER,
                    key,
                })
        };
        let token = setting(&config.token, "token")?;
        let account_id = setting(&config.account_id, "account_id")?;
        let project_name = setting(&config.project_name, "project_name")?;

        let policy = RetryPolicy::new(
            max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
        );
        Ok(Self::new(
            PagesClient::new(&config.base_url, token, account_id, project_name),
            Retrier::new(policy),
        ))
    }
}

impl<A: PagesApi> CloudflarePagesDeployer<A> {
    pub fn new(api: A, retrier: Retrier) -> Self {
        Self {
            api,
            retrier,
            tokens: TokenCache::new(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report upload progress (in bytes) on `bar`
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    fn jwt(&self) -> PublishResult<String> {
        self.tokens.get(|| {
            self.retrier
                .exec("cloudflare upload token", || self.api.upload_token())
        })
    }

    /// Run a JWT-authenticated call, refreshing the token once if it expired
    fn with_jwt<T>(
        &self,
        operation: &str,
        mut call: impl FnMut(&str) -> PublishResult<T>,
    ) -> PublishResult<T> {
        let jwt = self.jwt()?;
        match self.retrier.exec(operation, || call(&jwt)) {
            Err(e) if e.is_token_expired() => {
                info!("Upload token rejected, fetching a new one");
                self.tokens.invalidate(&jwt);
                let fresh = self.jwt()?;
                self.retrier.exec(operation, || call(&fresh))
            }
            other => other,
        }
    }

    fn upload_batch(&self, index: usize, total: usize, batch: &[&DeployItem]) -> PublishResult<u64> {
        let mut entries = Vec::with_capacity(batch.len());
        let mut bytes_total = 0u64;
        for item in batch {
            let bytes = item.read_all()?;
            bytes_total += bytes.len() as u64;
            entries.push(UploadEntry {
                key: item.digests().cfdigest_hex(),
                metadata: UploadMetadata {
                    content_type: content_type::detect(item.path(), &bytes),
                },
                value: STANDARD.encode(&bytes),
                base64: true,
            });
        }

        self.with_jwt("cloudflare upload batch", |jwt| self.api.upload(jwt, &entries))?;
        info!(
            "Uploaded batch {}/{}: {} files, {} bytes",
            index + 1,
            total,
            entries.len(),
            bytes_total
        );
        self.progress.inc(bytes_total);
        Ok(bytes_total)
    }
}

impl<A: PagesApi> Deployer for CloudflarePagesDeployer<A> {
    fn provider(&self) -> Provider {
        Provider::CloudflarePages
    }

    fn deploy(&self, items: &[DeployItem]) -> PublishResult<DeploySummary> {
        let parts = partition(items);
        let unique = unique_by_digest(&parts.normal);
        let hashes: Vec<String> = unique.iter().map(|i| i.digests().cfdigest_hex()).collect();
        debug!(
            "{} files, {} unique digests, {} dropped",
            parts.normal.len(),
            unique.len(),
            parts.dropped
        );

        let missing: HashSet<String> = if hashes.is_empty() {
            HashSet::new()
        } else {
            self.with_jwt("cloudflare check missing", |jwt| {
                self.api.check_missing(jwt, &hashes)
            })?
            .into_iter()
            .collect()
        };
        let to_upload: Vec<&DeployItem> = unique
            .iter()
            .filter(|i| missing.contains(&i.digests().cfdigest_hex()))
            .copied()
            .collect();

        let planned = batches(&to_upload);
        self.progress
            .set_length(to_upload.iter().map(|i| i.size()).sum());
        let mut uploaded_bytes = 0;
        for (index, batch) in planned.iter().enumerate() {
            uploaded_bytes += self.upload_batch(index, planned.len(), batch)?;
        }
        self.progress.finish_and_clear();

        let manifest: BTreeMap<String, String> = parts
            .normal
            .iter()
            .map(|i| (i.site_path(), i.digests().cfdigest_hex()))
            .collect();
        let redirects = parts.redirects.map(|r| r.read_all()).transpose()?;
        let deployment = self.retrier.exec("cloudflare create deployment", || {
            self.api.create_deployment(&manifest, redirects.as_deref())
        })?;
        info!(
            "Created Pages deployment {} ({} paths)",
            deployment.id,
            manifest.len()
        );

        if !to_upload.is_empty() {
            let uploaded: Vec<String> = to_upload
                .iter()
                .map(|i| i.digests().cfdigest_hex())
                .collect();
            self.with_jwt("cloudflare upsert hashes", |jwt| {
                self.api.upsert_hashes(jwt, &uploaded)
            })?;
        }

        Ok(DeploySummary {
            deploy_id: deployment.id,
            uploaded_files: to_upload.len(),
            uploaded_bytes,
            skipped_files: items.len().saturating_sub(to_upload.len()),
            url: deployment.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// In-memory asset store recording every call
    #[derive(Default)]
    struct FakePages {
        stored: Mutex<HashSet<String>>,
        batches: Mutex<Vec<Vec<UploadEntry>>>,
        manifests: Mutex<Vec<BTreeMap<String, String>>>,
        redirects: Mutex<Option<Vec<u8>>>,
        upserted: Mutex<Vec<String>>,
        tokens_issued: Mutex<u32>,
        /// Status and error code returned for the first JWT, if it is refused
        first_token_refusal: Option<(u16, Option<u64>)>,
    }

    impl FakePages {
        fn check_token(&self, jwt: &str) -> PublishResult<()> {
            match self.first_token_refusal {
                Some((status, code)) if jwt == "jwt-1" => Err(PublishError::Api {
                    provider: PROVIDER,
                    status,
                    code,
                    message: "expired".to_string(),
                    retry_after: None,
                }),
                _ => Ok(()),
            }
        }
    }

    impl PagesApi for Arc<FakePages> {
        fn upload_token(&self) -> PublishResult<String> {
            let mut issued = self.tokens_issued.lock();
            *issued += 1;
            Ok(format!("jwt-{}", *issued))
        }

        fn check_missing(&self, jwt: &str, hashes: &[String]) -> PublishResult<Vec<String>> {
            self.check_token(jwt)?;
            let stored = self.stored.lock();
            Ok(hashes.iter().filter(|h| !stored.contains(*h)).cloned().collect())
        }

        fn upload(&self, jwt: &str, entries: &[UploadEntry]) -> PublishResult<()> {
            self.check_token(jwt)?;
            self.stored
                .lock()
                .extend(entries.iter().map(|e| e.key.clone()));
            self.batches.lock().push(entries.to_vec());
            Ok(())
        }

        fn upsert_hashes(&self, jwt: &str, hashes: &[String]) -> PublishResult<()> {
            self.check_token(jwt)?;
            self.upserted.lock().extend_from_slice(hashes);
            Ok(())
        }

        fn create_deployment(
            &self,
            manifest: &BTreeMap<String, String>,
            redirects: Option<&[u8]>,
        ) -> PublishResult<Deployment> {
            self.manifests.lock().push(manifest.clone());
            *self.redirects.lock() = redirects.map(|r| r.to_vec());
            Ok(Deployment {
                id: format!("dep-{}", self.manifests.lock().len()),
                url: None,
            })
        }
    }

    fn deployer(fake: &Arc<FakePages>) -> CloudflarePagesDeployer<Arc<FakePages>> {
        let retrier = Retrier::new(RetryPolicy::new(3, Duration::from_millis(1))).with_sleep(|_| {});
        CloudflarePagesDeployer::new(Arc::clone(fake), retrier)
    }

    fn sized(path: &str, size: usize, fill: u8) -> DeployItem {
        DeployItem::from_bytes(path, vec![fill; size])
    }

    #[test]
    fn duplicate_content_is_uploaded_once() {
        let fake = Arc::new(FakePages::default());
        let items = vec![
            DeployItem::from_bytes("a.html", b"same".to_vec()),
            DeployItem::from_bytes("b.html", b"same".to_vec()),
            DeployItem::from_bytes("c.html", b"different".to_vec()),
        ];

        let summary = deployer(&fake).deploy(&items).unwrap();

        let batches = fake.batches.lock();
        let uploaded: Vec<&UploadEntry> = batches.iter().flatten().collect();
        assert_eq!(uploaded.len(), 2);
        assert_eq!(summary.uploaded_files, 2);

        let manifest = &fake.manifests.lock()[0];
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest["/a.html"], items[0].digests().cfdigest_hex());
        assert_eq!(manifest["/a.html"], manifest["/b.html"]);
    }

    #[test]
    fn oversized_file_is_dropped() {
        let fake = Arc::new(FakePages::default());
        let mut items = vec![sized("video.mp4", 30 * 1024 * 1024, 7)];
        for i in 0..9 {
            items.push(DeployItem::from_bytes(
                format!("page{}.html", i),
                format!("page {}", i).into_bytes(),
            ));
        }

        let summary = deployer(&fake).deploy(&items).unwrap();

        let manifest = &fake.manifests.lock()[0];
        assert_eq!(manifest.len(), 9);
        assert!(!manifest.contains_key("/video.mp4"));
        assert_eq!(summary.uploaded_files, 9);
        assert_eq!(summary.skipped_files, 1);
    }

    #[test]
    fn large_sites_upload_in_bounded_batches() {
        let fake = Arc::new(FakePages::default());
        let items: Vec<DeployItem> = (0..6u8)
            .map(|i| sized(&format!("img/{}.bin", i), 10 * 1024 * 1024, i))
            .collect();

        deployer(&fake).deploy(&items).unwrap();

        let batches = fake.batches.lock();
        assert!(batches.len() >= 2);
        for batch in batches.iter() {
            let raw: u64 = batch
                .iter()
                .map(|e| STANDARD.decode(&e.value).unwrap().len() as u64)
                .sum();
            assert!(raw <= MAX_BATCH_BYTES);
        }
        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 6);
    }

    #[test]
    fn batches_respect_file_count() {
        let items: Vec<DeployItem> = (0..2500)
            .map(|i| DeployItem::from_bytes(format!("{}.txt", i), format!("{}", i).into_bytes()))
            .collect();
        let refs: Vec<&DeployItem> = items.iter().collect();

        let planned = batches(&refs);

        assert_eq!(planned.len(), 3);
        assert!(planned.iter().all(|b| b.len() <= MAX_BATCH_FILES));
    }

    #[test]
    fn redeploy_uploads_nothing() {
        let fake = Arc::new(FakePages::default());
        let items = vec![
            DeployItem::from_bytes("index.html", b"home".to_vec()),
            DeployItem::from_bytes("app.js", b"run()".to_vec()),
        ];
        let deployer = deployer(&fake);

        deployer.deploy(&items).unwrap();
        let summary = deployer.deploy(&items).unwrap();

        assert_eq!(summary.uploaded_files, 0);
        assert_eq!(fake.batches.lock().len(), 1);
        assert_eq!(fake.manifests.lock().len(), 2);
        // upsert only for the run that uploaded
        assert_eq!(fake.upserted.lock().len(), 2);
    }

    #[test]
    fn redirects_go_with_the_deployment() {
        let fake = Arc::new(FakePages::default());
        let items = vec![
            DeployItem::from_bytes("index.html", b"home".to_vec()),
            DeployItem::from_bytes("_redirects", b"/old /new 301".to_vec()),
        ];

        deployer(&fake).deploy(&items).unwrap();

        assert_eq!(fake.redirects.lock().as_deref(), Some(&b"/old /new 301"[..]));
        assert!(!fake.manifests.lock()[0].contains_key("/_redirects"));
        assert_eq!(fake.batches.lock().iter().flatten().count(), 1);
    }

    #[test]
    fn expired_token_is_refreshed_once() {
        let fake = Arc::new(FakePages {
            first_token_refusal: Some((401, Some(crate::error::CF_TOKEN_EXPIRED_CODE))),
            ..Default::default()
        });
        let items = vec![DeployItem::from_bytes("index.html", b"home".to_vec())];

        deployer(&fake).deploy(&items).unwrap();

        assert_eq!(*fake.tokens_issued.lock(), 2);
        assert_eq!(fake.batches.lock().len(), 1);
    }

    #[test]
    fn forbidden_token_is_refreshed_once() {
        let fake = Arc::new(FakePages {
            first_token_refusal: Some((403, None)),
            ..Default::default()
        });
        let items = vec![DeployItem::from_bytes("index.html", b"home".to_vec())];

        let summary = deployer(&fake).deploy(&items).unwrap();

        assert_eq!(*fake.tokens_issued.lock(), 2);
        assert_eq!(fake.batches.lock().len(), 1);
        assert_eq!(summary.uploaded_files, 1);
    }

    #[test]
    fn upload_entries_carry_content_type() {
        let fake = Arc::new(FakePages::default());
        let items = vec![DeployItem::from_bytes("style.css", b"body{}".to_vec())];

        deployer(&fake).deploy(&items).unwrap();

        let batches = fake.batches.lock();
        let entry = &batches[0][0];
        assert_eq!(entry.metadata.content_type, "text/css");
        assert!(entry.base64);
        assert_eq!(STANDARD.decode(&entry.value).unwrap(), b"body{}");
    }

    #[test]
    fn missing_settings_fail_construction() {
        let config = CloudflareConfig {
            token: Some("t".to_string()),
            account_id: Some("a".to_string()),
            project_name: None,
            ..Default::default()
        };
        assert!(matches!(
            CloudflarePagesDeployer::from_config(&config, 3).err(),
            Some(PublishError::MissingSetting {
                key: "project_name",
                ..
            })
        ));
    }
}
