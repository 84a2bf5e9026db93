// Configuration loader
// Loads settings from ~/.banter/config.toml, then applies environment overrides

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::persona::Persona;
use super::settings::{Config, CredentialsConfig, GatewayConfig, StorageConfig, TimingConfig};

const CONFIG_DIR: &str = ".banter";
const CONFIG_FILE: &str = "config.toml";

/// On-disk shape; every section is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TomlConfig {
    user_name: Option<String>,
    default_roster: Vec<String>,
    api_key: Option<String>,
    gateway: GatewayConfig,
    timing: TimingConfig,
    storage: StorageConfig,
    credentials: CredentialsConfig,
    personas: Vec<Persona>,
}

/// Load configuration from `path`, or ~/.banter/config.toml when `None`.
/// A missing file yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let home = banter_home()?;
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => home.join(CONFIG_FILE),
    };

    let mut config = if config_path.exists() {
        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        parse_config(&contents, home)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?
    } else {
        tracing::debug!("No config at {}, using defaults", config_path.display());
        Config::new(home)
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

/// ~/.banter
pub fn banter_home() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(CONFIG_DIR))
}

fn parse_config(contents: &str, home: PathBuf) -> Result<Config> {
    let toml_config: TomlConfig = toml::from_str(contents)?;

    let mut config = Config::new(home);
    if let Some(name) = toml_config.user_name {
        config.user_name = name;
    }
    config.default_roster = toml_config.default_roster;
    config.api_key = toml_config.api_key.filter(|k| !k.is_empty());
    config.gateway = toml_config.gateway;
    config.timing = toml_config.timing;
    config.storage = toml_config.storage;
    config.credentials = toml_config.credentials;
    config.personas = toml_config.personas;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty("OPENROUTER_API_KEY") {
        config.api_key = Some(key);
    }
    if let Some(url) = non_empty("BANTER_GATEWAY_URL") {
        config.gateway.base_url = url;
    }
    if let Some(url) = non_empty("BANTER_STORE_URL") {
        config.storage.remote_url = Some(url);
    }
    if let Some(key) = non_empty("BANTER_STORE_KEY") {
        config.storage.remote_api_key = Some(key);
    }
}
