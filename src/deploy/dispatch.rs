//! Fan-out of one file collection to the configured providers

use super::cloudflare::CloudflarePagesDeployer;
use super::item::DeployItem;
use super::netlify::NetlifyDeployer;
use super::{DeploySummary, Deployer};
use crate::config::Config;
use crate::error::{PublishError, PublishResult};
use indicatif::ProgressBar;
use std::fmt;
use std::str::FromStr;
use tracing::{error, info};

/// Supported hosting providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Netlify,
    CloudflarePages,
    /// Render and verify only
    None,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Netlify => "netlify",
            Self::CloudflarePages => "cloudflarepages",
            Self::None => "none",
        }
    }

    /// Resolve a list of names, case-insensitively, keeping the first
    /// occurrence of each provider
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> PublishResult<Vec<Provider>> {
        let mut providers = Vec::with_capacity(names.len());
        for name in names {
            let provider: Provider = name.as_ref().parse()?;
            if !providers.contains(&provider) {
                providers.push(provider);
            }
        }
        Ok(providers)
    }
}

impl FromStr for Provider {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "netlify" => Ok(Self::Netlify),
            "cloudflarepages" => Ok(Self::CloudflarePages),
            "none" => Ok(Self::None),
            _ => Err(PublishError::UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of one provider's deployment
#[derive(Debug)]
pub struct ProviderOutcome {
    pub provider: Provider,
    pub result: PublishResult<DeploySummary>,
}

/// Per-provider outcomes of a dispatch, in dispatch order
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ProviderOutcome>,
}

impl DispatchReport {
    /// True when every provider succeeded
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Names of providers that failed
    pub fn failed(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.provider.to_string())
            .collect()
    }

    /// Turn any provider failure into an error
    pub fn into_result(self) -> PublishResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PublishError::ProvidersFailed {
                providers: self.failed(),
            })
        }
    }
}

/// Applies one file collection to several deployers in order
pub struct Dispatcher {
    deployers: Vec<Box<dyn Deployer>>,
}

impl Dispatcher {
    /// Build deployers for `names` from configuration.
    ///
    /// Unknown names and missing provider settings fail here, before any
    /// provider has been contacted. `progress` supplies the upload bar for
    /// each provider.
    pub fn from_config<S: AsRef<str>>(
        config: &Config,
        names: &[S],
        progress: impl Fn(Provider) -> ProgressBar,
    ) -> PublishResult<Self> {
        let max_attempts = config.deploy.max_attempts;
        let mut deployers: Vec<Box<dyn Deployer>> = Vec::new();

        for provider in Provider::parse_list(names)? {
            match provider {
                Provider::Netlify => deployers.push(Box::new(
                    NetlifyDeployer::from_config(&config.netlify, max_attempts)?
                        .with_progress(progress(provider)),
                )),
                Provider::CloudflarePages => deployers.push(Box::new(
                    CloudflarePagesDeployer::from_config(&config.cloudflare, max_attempts)?
                        .with_progress(progress(provider)),
                )),
                Provider::None => {}
            }
        }
        Ok(Self { deployers })
    }

    /// Dispatch to prebuilt deployers
    pub fn new(deployers: Vec<Box<dyn Deployer>>) -> Self {
        Self { deployers }
    }

    /// Providers that will be deployed to, in order
    pub fn providers(&self) -> Vec<Provider> {
        self.deployers.iter().map(|d| d.provider()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.deployers.is_empty()
    }

    /// Run every deployer on `items`; one failure never stops the others
    pub fn dispatch(&self, items: &[DeployItem]) -> DispatchReport {
        if self.deployers.is_empty() {
            info!("No deploy providers configured, skipping deployment");
        }

        let mut report = DispatchReport::default();
        for deployer in &self.deployers {
            let provider = deployer.provider();
            info!("Deploying {} files to {}", items.len(), provider);

            let result = deployer.deploy(items);
            match &result {
                Ok(summary) => info!(
                    "{} deploy {} finished: {} uploaded, {} skipped",
                    provider, summary.deploy_id, summary.uploaded_files, summary.skipped_files
                ),
                Err(e) => error!("{} deploy failed: {}", provider, e),
            }
            report.outcomes.push(ProviderOutcome { provider, result });
        }
        report
    }
}
