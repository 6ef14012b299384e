//! Error types for pawgen-publish
//!
//! All modules use `PublishResult<T>` as their return type.

use crate::deploy::retry::RetryClass;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for publish operations
pub type PublishResult<T> = Result<T, PublishError>;

/// Cloudflare error code signalling an expired upload JWT
pub const CF_TOKEN_EXPIRED_CODE: u64 = 8_000_013;

/// Cloudflare error code signalling request throttling
pub const CF_RATE_LIMIT_CODE: u64 = 971;

/// All errors that can occur while digesting, verifying or deploying output
#[derive(Error, Debug)]
pub enum PublishError {
    // Digest errors
    #[error("No {algorithm} digest recorded for {path}")]
    MissingDigest { path: PathBuf, algorithm: String },

    #[error("Stored {algorithm} digest for {path} is malformed")]
    InvalidDigest { path: PathBuf, algorithm: String },

    #[error("Checksum verification failed for {count} file(s)")]
    ChecksumMismatch { count: usize },

    #[error("Extended attributes are not supported for {0}")]
    XattrUnsupported(PathBuf),

    // Provider errors
    #[error("{provider} API returned HTTP {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        code: Option<u64>,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} protocol error: {message}")]
    Protocol {
        provider: &'static str,
        message: String,
    },

    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<PublishError>,
    },

    #[error("Deploy {deploy_id} was not ready after {polls} polls")]
    DeployTimedOut { deploy_id: String, polls: u32 },

    #[error("Deployment failed for: {}", providers.join(", "))]
    ProvidersFailed { providers: Vec<String> },

    // Configuration errors
    #[error("Unknown deploy provider '{0}'. Expected one of: netlify, cloudflarepages, none")]
    UnknownProvider(String),

    #[error("Missing {key} for {provider}")]
    MissingSetting {
        provider: &'static str,
        key: &'static str,
    },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl PublishError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a protocol error for a provider
    pub fn protocol(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider,
            message: message.into(),
        }
    }

    /// HTTP status of an API error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the provider rejected the request because of throttling
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::Api { status: 429, .. }
                | Self::Api {
                    code: Some(CF_RATE_LIMIT_CODE),
                    ..
                }
        )
    }

    /// Check if the error means the cached upload token is no longer accepted
    pub fn is_token_expired(&self) -> bool {
        matches!(
            self,
            Self::Api { status: 403, .. }
                | Self::Api {
                    code: Some(CF_TOKEN_EXPIRED_CODE),
                    ..
                }
        )
    }

    /// Classify the error for the retry driver
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { retry_after, .. } if self.is_rate_limited() => {
                RetryClass::RateLimited(*retry_after)
            }
            Self::Api { status, .. } if *status >= 500 => RetryClass::Transient,
            Self::Api { .. } => RetryClass::Terminal,
            Self::Transport { .. } | Self::Io { .. } => RetryClass::Transient,
            _ => RetryClass::Terminal,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ChecksumMismatch { .. } => {
                Some("Output changed after it was written. Rebuild the site before deploying")
            }
            Self::MissingDigest { .. } => {
                Some("Run: pawgen-publish digest <dir> to record digests for externally rendered output")
            }
            Self::UnknownProvider(_) => Some("Check deploy.providers in your config"),
            Self::MissingSetting { .. } => {
                Some("Run: pawgen-publish config set <section>.<key> <value>")
            }
            Self::Api { status: 401, .. } => Some("Check that your API token is valid"),
            _ => None,
        }
    }
}
