//! Configuration schema for pawgen-publish
//!
//! Configuration is stored at `~/.config/pawgen/config.toml`, optionally
//! overlaid by a project-local `.pawgen.toml`.

use crate::deploy::retry::DEFAULT_MAX_ATTEMPTS;
use crate::digest::DigestStorage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Output tree settings
    pub output: OutputConfig,

    /// Deployment settings
    pub deploy: DeployConfig,

    /// Netlify settings
    pub netlify: NetlifyConfig,

    /// Cloudflare Pages settings
    pub cloudflare: CloudflareConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Output tree settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Rendered site directory
    pub dir: PathBuf,

    /// Where file digests are kept
    pub digest_storage: DigestStorage,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("public"),
            digest_storage: DigestStorage::Auto,
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Providers to deploy to, in order
    pub providers: Vec<String>,

    /// Attempts per network operation
    pub max_attempts: u32,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Netlify settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetlifyConfig {
    /// API base URL
    pub base_url: String,

    /// Personal access token (`NETLIFY_AUTH_TOKEN` overrides)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Site id or name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,

    /// First retry delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Delay between deploy state polls
    pub poll_interval_secs: u64,

    /// Polls before giving up on a deploy
    pub max_polls: u32,
}

impl Default for NetlifyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.netlify.com/api/v1".to_string(),
            token: None,
            site_id: None,
            initial_backoff_ms: 1000,
            poll_interval_secs: 2,
            max_polls: 900,
        }
    }
}

/// Cloudflare Pages settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudflareConfig {
    /// API base URL
    pub base_url: String,

    /// Account API token (`CLOUDFLARE_API_TOKEN` overrides)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Account id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Pages project name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// First retry delay in milliseconds
    pub initial_backoff_ms: u64,
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cloudflare.com/client/v4".to_string(),
            token: None,
            account_id: None,
            project_name: None,
            initial_backoff_ms: 1000,
        }
    }
}

impl Config {
    /// Copy of the configuration with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        let mut config = self.clone();
        config.netlify.token = mask(&self.netlify.token);
        config.cloudflare.token = mask(&self.cloudflare.token);
        config
    }
}
