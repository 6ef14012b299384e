//! CLI command implementations

pub mod config;
pub mod deploy;
pub mod digest;
pub mod verify;

pub use config::execute as config;
pub use deploy::execute as deploy;
pub use digest::execute as digest;
pub use verify::execute as verify;

use crate::config::Config;
use crate::error::PublishError;
use std::path::PathBuf;

/// Directory argument, falling back to `output.dir`
pub(crate) fn output_dir(arg: Option<PathBuf>, config: &Config) -> PathBuf {
    arg.unwrap_or_else(|| config.output.dir.clone())
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> PublishError {
    PublishError::Internal(format!("background task failed: {}", e))
}
