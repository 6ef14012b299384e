//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_NAME};
use crate::error::{PublishError, PublishResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// Every settable key with the TOML type it is stored as
const KEYS: &[(&str, ValueKind)] = &[
    ("general.log_format", ValueKind::Str),
    ("general.audit_log", ValueKind::Bool),
    ("output.dir", ValueKind::Str),
    ("output.digest_storage", ValueKind::Str),
    ("deploy.providers", ValueKind::List),
    ("deploy.max_attempts", ValueKind::Int),
    ("netlify.base_url", ValueKind::Str),
    ("netlify.token", ValueKind::Str),
    ("netlify.site_id", ValueKind::Str),
    ("netlify.initial_backoff_ms", ValueKind::Int),
    ("netlify.poll_interval_secs", ValueKind::Int),
    ("netlify.max_polls", ValueKind::Int),
    ("cloudflare.base_url", ValueKind::Str),
    ("cloudflare.token", ValueKind::Str),
    ("cloudflare.account_id", ValueKind::Str),
    ("cloudflare.project_name", ValueKind::Str),
    ("cloudflare.initial_backoff_ms", ValueKind::Int),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Str,
    Bool,
    Int,
    List,
}

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> PublishResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            let path = if local {
                std::env::current_dir()
                    .map_err(|e| PublishError::io("getting current directory", e))?
                    .join(LOCAL_CONFIG_NAME)
            } else {
                manager.path().to_path_buf()
            };
            set_value(&path, &key, &value).await?;
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> PublishResult<()> {
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> PublishResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Set one key in the file at `path`, keeping every other key as written
async fn set_value(path: &Path, key: &str, value: &str) -> PublishResult<()> {
    let ctx = UiContext::detect();
    let kind = validate_config_key(key)?;

    let mut doc: toml::Value = if path.exists() {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PublishError::io(format!("reading {}", path.display()), e))?;
        content
            .parse()
            .map_err(|e: toml::de::Error| PublishError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, key, parse_value(kind, value)?)?;

    // Reject values the schema would refuse on the next load
    let _: Config = doc
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| PublishError::User(format!("Invalid value for {}: {}", key, e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PublishError::ConfigDirCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    let content = toml::to_string_pretty(&doc)?;
    fs::write(path, content)
        .await
        .map_err(|e| PublishError::io(format!("writing {}", path.display()), e))?;

    let shown = if key.ends_with(".token") { "********" } else { value };
    ui::step_ok(&ctx, &format!("Set {} = {} in {}", key, shown, path.display()));
    Ok(())
}

/// Validate that a config key is one we recognise.
fn validate_config_key(key: &str) -> PublishResult<ValueKind> {
    KEYS.iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            let valid: Vec<&str> = KEYS.iter().map(|(name, _)| *name).collect();
            PublishError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                valid.join(", ")
            ))
        })
}

fn parse_value(kind: ValueKind, value: &str) -> PublishResult<toml::Value> {
    Ok(match kind {
        ValueKind::Str => toml::Value::String(value.to_string()),
        ValueKind::Bool => toml::Value::Boolean(parse_bool(value)?),
        ValueKind::Int => toml::Value::Integer(
            value
                .parse::<u32>()
                .map(i64::from)
                .map_err(|_| PublishError::User(format!("Invalid number: {}", value)))?,
        ),
        ValueKind::List => toml::Value::Array(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_string()))
                .collect(),
        ),
    })
}

/// Set a dot-separated key in a TOML value tree, creating intermediate tables as needed.
fn set_toml_value(doc: &mut toml::Value, key: &str, value: toml::Value) -> PublishResult<()> {
    let (sections, leaf) = match key.rsplit_once('.') {
        Some((sections, leaf)) => (sections, leaf),
        None => ("", key),
    };

    let mut current = doc;
    for part in sections.split('.').filter(|p| !p.is_empty()) {
        current = current
            .as_table_mut()
            .ok_or_else(|| PublishError::User(format!("Expected table at key: {}", part)))?
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    current
        .as_table_mut()
        .ok_or_else(|| PublishError::User(format!("Expected table for key: {}", key)))?
        .insert(leaf.to_string(), value);
    Ok(())
}

fn parse_bool(value: &str) -> PublishResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(PublishError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unknown_key_is_rejected() {
        let err = validate_config_key("vm.name").unwrap_err();
        assert!(err.to_string().contains("netlify.site_id"));
        assert_eq!(
            validate_config_key("deploy.providers").unwrap(),
            ValueKind::List
        );
    }

    #[test]
    fn list_values_split_on_commas() {
        let value = parse_value(ValueKind::List, "netlify, cloudflarepages,").unwrap();
        let items: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(items, vec!["netlify", "cloudflarepages"]);
    }

    #[test]
    fn nested_tables_are_created() {
        let mut doc = toml::Value::Table(toml::map::Map::new());
        set_toml_value(
            &mut doc,
            "netlify.site_id",
            toml::Value::String("blog".into()),
        )
        .unwrap();
        assert_eq!(doc["netlify"]["site_id"].as_str(), Some("blog"));
    }

    #[tokio::test]
    async fn set_keeps_existing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[output]\ndir = \"dist\"\n").await.unwrap();

        set_value(&path, "deploy.max_attempts", "5").await.unwrap();

        let config: Config = toml::from_str(&fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(config.output.dir, std::path::PathBuf::from("dist"));
        assert_eq!(config.deploy.max_attempts, 5);
    }

    #[tokio::test]
    async fn set_rejects_invalid_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let err = set_value(&path, "output.digest_storage", "floppy")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("output.digest_storage"));
        assert!(!path.exists());
    }

    #[test]
    fn number_values_must_be_numeric() {
        assert!(parse_value(ValueKind::Int, "ten").is_err());
        assert!(parse_bool("maybe").is_err());
    }
}
