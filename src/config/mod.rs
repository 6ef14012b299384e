//! Configuration management for pawgen-publish

pub mod schema;

pub use schema::{CloudflareConfig, Config, DeployConfig, NetlifyConfig, OutputConfig};

use crate::error::{PublishError, PublishResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Project-local config file name
pub const LOCAL_CONFIG_NAME: &str = ".pawgen.toml";

/// Environment variable overriding the Netlify token
pub const NETLIFY_TOKEN_ENV: &str = "NETLIFY_AUTH_TOKEN";

/// Environment variable overriding the Cloudflare API token
pub const CLOUDFLARE_TOKEN_ENV: &str = "CLOUDFLARE_API_TOKEN";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pawgen")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pawgen")
    }

    /// Get the audit log path
    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("audit.log")
    }

    /// Walk up from `start` looking for a project-local config
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, creating default if not exists
    pub async fn load(&self) -> PublishResult<Config> {
        self.load_merged(None).await
    }

    /// Load the global config, overlay `local` on top, then apply
    /// environment overrides
    pub async fn load_merged(&self, local: Option<&Path>) -> PublishResult<Config> {
        let mut merged = if self.config_path.exists() {
            Self::read_value(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            toml::Value::Table(toml::map::Map::new())
        };

        if let Some(local) = local {
            debug!("Merging local config {}", local.display());
            let overlay = Self::read_value(local).await?;
            merge_values(&mut merged, overlay);
        }

        let origin = local.unwrap_or(&self.config_path).to_path_buf();
        let mut config: Config =
            merged
                .try_into()
                .map_err(|e: toml::de::Error| PublishError::ConfigInvalid {
                    path: origin,
                    reason: e.to_string(),
                })?;

        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> PublishResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PublishError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| PublishError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn read_value(path: &Path) -> PublishResult<toml::Value> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PublishError::io(format!("reading config from {}", path.display()), e))?;

        content
            .parse()
            .map_err(|e: toml::de::Error| PublishError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> PublishResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            PublishError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> PublishResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PublishError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `overlay` into `base`; tables merge key by key, anything
/// else in the overlay replaces the base value
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Replace tokens with non-empty environment values
fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup(NETLIFY_TOKEN_ENV).filter(|t| !t.is_empty()) {
        debug!("Using Netlify token from {}", NETLIFY_TOKEN_ENV);
        config.netlify.token = Some(token);
    }
    if let Some(token) = lookup(CLOUDFLARE_TOKEN_ENV).filter(|t| !t.is_empty()) {
        debug!("Using Cloudflare token from {}", CLOUDFLARE_TOKEN_ENV);
        config.cloudflare.token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load_from_file(&temp.path().join("nope")).await;
        assert!(config.is_err());

        let config = manager.load_merged(None).await.unwrap();
        assert_eq!(config.general.log_format, "text");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.netlify.site_id = Some("blog".to_string());

        manager.save(&config).await.unwrap();
        let loaded = manager.load_from_file(manager.path()).await.unwrap();

        assert_eq!(loaded.netlify.site_id.as_deref(), Some("blog"));
    }

    #[tokio::test]
    async fn local_config_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("config.toml");
        std::fs::write(
            &global,
            "[netlify]\nsite_id = \"global\"\npoll_interval_secs = 5\n",
        )
        .unwrap();
        let local = temp.path().join(LOCAL_CONFIG_NAME);
        std::fs::write(&local, "[netlify]\nsite_id = \"project\"\n").unwrap();

        let config = ConfigManager::with_path(global)
            .load_merged(Some(&local))
            .await
            .unwrap();

        assert_eq!(config.netlify.site_id.as_deref(), Some("project"));
        assert_eq!(config.netlify.poll_interval_secs, 5);
    }

    #[tokio::test]
    async fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[deploy]\nmax_attempts = \"many\"\n").unwrap();

        let err = ConfigManager::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, PublishError::ConfigInvalid { .. }));
    }

    #[test]
    fn finds_local_config_in_ancestors() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_NAME), "").unwrap();
        let nested = temp.path().join("site/content/posts");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            ConfigManager::find_local_config(&nested),
            Some(temp.path().join(LOCAL_CONFIG_NAME))
        );
    }

    #[test]
    fn env_overrides_tokens() {
        let mut config = Config::default();
        config.netlify.token = Some("from-file".to_string());

        apply_env_overrides(&mut config, |key| match key {
            NETLIFY_TOKEN_ENV => Some("from-env".to_string()),
            CLOUDFLARE_TOKEN_ENV => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.netlify.token.as_deref(), Some("from-env"));
        assert_eq!(config.cloudflare.token, None);
    }

    #[test]
    #[serial]
    fn load_reads_process_environment() {
        let temp = TempDir::new().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        std::env::set_var(CLOUDFLARE_TOKEN_ENV, "cf-env-token");

        let config = runtime
            .block_on(ConfigManager::with_path(temp.path().join("missing.toml")).load())
            .unwrap();
        std::env::remove_var(CLOUDFLARE_TOKEN_ENV);

        assert_eq!(config.cloudflare.token.as_deref(), Some("cf-env-token"));
    }
}
