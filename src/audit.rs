//! Audit logging for deployments
//!
//! Writes JSON lines to `~/.local/state/pawgen/audit.log`, one per provider
//! outcome, so a site's publish history survives terminal scrollback.

use crate::config::{schema::Config, ConfigManager};
use crate::deploy::{DispatchReport, ProviderOutcome};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based audit logger that appends JSON lines
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    /// Create a new audit logger from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.audit_log,
            path: ConfigManager::audit_log_path(),
        }
    }

    /// Log one event per provider outcome of a dispatch
    pub async fn record_dispatch(&self, root: &Path, report: &DispatchReport) {
        for outcome in &report.outcomes {
            let (event, data) = outcome_event(root, outcome);
            self.log(event, &data).await;
        }
    }

    /// Log an audit event as a JSON line
    ///
    /// IO failures are logged and dropped; a deploy never fails because
    /// its audit line could not be written.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write audit log: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn outcome_event(root: &Path, outcome: &ProviderOutcome) -> (&'static str, serde_json::Value) {
    match &outcome.result {
        Ok(summary) => (
            "deploy.completed",
            serde_json::json!({
                "provider": outcome.provider.name(),
                "dir": root.display().to_string(),
                "deploy_id": summary.deploy_id,
                "uploaded_files": summary.uploaded_files,
                "uploaded_bytes": summary.uploaded_bytes,
                "skipped_files": summary.skipped_files,
                "url": summary.url,
            }),
        ),
        Err(e) => (
            "deploy.failed",
            serde_json::json!({
                "provider": outcome.provider.name(),
                "dir": root.display().to_string(),
                "error": e.to_string(),
            }),
        ),
    }
}
