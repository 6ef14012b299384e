//! Deployment to static hosting providers
//!
//! Provides a trait-based abstraction over hosting backends:
//! - Netlify (digest-addressed deploys driven by a polling state machine)
//! - Cloudflare Pages (content-addressed asset uploads plus a manifest)
//!
//! Every network call runs under a [`Retrier`]; the [`Dispatcher`] fans a
//! single file collection out to the configured providers.

pub mod cloudflare;
pub mod dispatch;
pub(crate) mod http;
pub mod item;
pub mod netlify;
pub mod retry;

pub use cloudflare::{CloudflarePagesDeployer, PagesApi, PagesClient};
pub use dispatch::{DispatchReport, Dispatcher, Provider, ProviderOutcome};
pub use item::{collect_items, DeployItem};
pub use netlify::{DeployState, NetlifyApi, NetlifyClient, NetlifyDeployer};
pub use retry::{Retrier, RetryClass, RetryPolicy, DEFAULT_MAX_ATTEMPTS};

use crate::error::PublishResult;

/// What one provider did with a file collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploySummary {
    /// Provider-side deploy or deployment id
    pub deploy_id: String,
    /// Files whose content was sent this run
    pub uploaded_files: usize,
    /// Bytes of content sent this run
    pub uploaded_bytes: u64,
    /// Files the provider already had, or that were dropped
    pub skipped_files: usize,
    /// Public URL of the deploy, when the provider reports one
    pub url: Option<String>,
}

/// Publishes a file collection to one hosting provider
pub trait Deployer: Send + Sync {
    /// Provider name for logs and reports
    fn provider(&self) -> Provider;

    /// Converge the provider onto exactly `items`
    fn deploy(&self, items: &[DeployItem]) -> PublishResult<DeploySummary>;
}
