// Configuration structs

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::persona::Persona;

pub const DEFAULT_GATEWAY_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_TITLE: &str = "AI Conversation Banter";

/// Completions gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL; `/chat/completions` is appended
    pub base_url: String,

    /// Sent as `HTTP-Referer` (OpenRouter app attribution)
    pub referer: String,

    /// Sent as `X-Title`
    pub title: String,

    /// Output length cap per reply
    pub max_tokens: u32,

    /// Creativity parameter
    pub temperature: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            referer: "https://github.com/banter-rs/banter".to_string(),
            title: DEFAULT_TITLE.to_string(),
            max_tokens: 150,
            temperature: 0.7,
        }
    }
}

/// Fixed delays of the turn loop, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub inter_turn_ms: u64,
    pub inter_cycle_ms: u64,
    pub interjection_resume_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            inter_turn_ms: 800,
            inter_cycle_ms: 1000,
            interjection_resume_ms: 500,
        }
    }
}

impl TimingConfig {
    pub fn inter_turn(&self) -> Duration {
        Duration::from_millis(self.inter_turn_ms)
    }

    pub fn inter_cycle(&self) -> Duration {
        Duration::from_millis(self.inter_cycle_ms)
    }

    pub fn interjection_resume(&self) -> Duration {
        Duration::from_millis(self.interjection_resume_ms)
    }
}

/// Where transcripts are saved
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `conversations.json` (default: ~/.banter)
    pub dir: Option<PathBuf>,

    /// REST endpoint of the remote store (tried before the local file)
    pub remote_url: Option<String>,

    /// Key sent as `apikey` and bearer token to the remote store
    pub remote_api_key: Option<String>,

    /// Remote table name
    pub remote_table: Option<String>,
}

/// Where credentials come from, after the explicit value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Locally persisted key (default: ~/.banter/openrouter_api_key)
    pub key_file: Option<PathBuf>,

    /// Remote key-issuing endpoint, tried last
    pub issuer_url: Option<String>,

    /// Bearer token for the issuer
    pub issuer_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for local state (~/.banter)
    pub home_dir: PathBuf,

    /// Label used for the user's own messages
    pub user_name: String,

    /// Roster used when `--roster` is not given (empty = catalogue default)
    pub default_roster: Vec<String>,

    /// Explicit credential (flag or OPENROUTER_API_KEY)
    pub api_key: Option<String>,

    pub gateway: GatewayConfig,
    pub timing: TimingConfig,
    pub storage: StorageConfig,
    pub credentials: CredentialsConfig,

    /// Catalogue additions and overrides
    pub personas: Vec<Persona>,
}

impl Config {
    pub fn new(home_dir: PathBuf) -> Self {
        Self {
            home_dir,
            user_name: "You".to_string(),
            default_roster: Vec::new(),
            api_key: None,
            gateway: GatewayConfig::default(),
            timing: TimingConfig::default(),
            storage: StorageConfig::default(),
            credentials: CredentialsConfig::default(),
            personas: Vec::new(),
        }
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage
            .dir
            .clone()
            .unwrap_or_else(|| self.home_dir.clone())
    }

    pub fn key_file(&self) -> PathBuf {
        self.credentials
            .key_file
            .clone()
            .unwrap_or_else(|| self.home_dir.join("openrouter_api_key"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.base_url.trim().is_empty() {
            bail!("gateway.base_url must not be empty");
        }
        if self.gateway.max_tokens == 0 {
            bail!("gateway.max_tokens must be positive");
        }
        if !(0.0..=2.0).contains(&self.gateway.temperature) {
            bail!(
                "gateway.temperature must be within 0.0..=2.0, got {}",
                self.gateway.temperature
            );
        }
        if self.user_name.trim().is_empty() {
            bail!("user_name must not be empty");
        }
        Ok(())
    }
}
