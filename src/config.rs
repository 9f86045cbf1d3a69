use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SweepError;
use crate::feed::FeedConfig;
use crate::keyring;
use crate::normalize::NormalizeConfig;

// ---------------------------------------------------------------------------
// Password backends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend")]
pub enum PasswordBackend {
    #[serde(rename = "keyring")]
    Keyring,
    #[serde(rename = "plaintext")]
    Plaintext { value: String },
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const MAX_WORKERS: usize = 20;

fn default_port() -> u16 {
    993
}
fn default_password() -> PasswordBackend {
    PasswordBackend::Keyring
}
fn default_timeout() -> u64 {
    30
}
fn default_workers() -> usize {
    5
}
fn default_interval() -> u64 {
    300
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./feeds")
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./mailfeed.db")
}
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_title() -> String {
    "Mail".to_string()
}
fn default_folders() -> IndexMap<String, String> {
    let mut folders = IndexMap::new();
    folders.insert("INBOX".to_string(), "inbox".to_string());
    folders
}
fn default_max_html() -> usize {
    8000
}
fn default_max_text() -> usize {
    3000
}
fn default_max_rss_html() -> usize {
    5000
}
fn default_max_rss_text() -> usize {
    2900
}
fn default_max_summary() -> usize {
    300
}
fn default_remove_css() -> bool {
    true
}
fn default_max_items() -> usize {
    50
}

// ---------------------------------------------------------------------------
// On-disk config (JSON), env vars override
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default = "default_password")]
    pub password: PasswordBackend,
    #[serde(default)]
    pub starttls: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_workers")]
    pub max_workers: usize,
    #[serde(default = "default_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_title")]
    pub feed_title: String,
    /// Folder path on the server mapped to the feed name it publishes as.
    /// Iteration order is the file's order, so sweep order is predictable.
    #[serde(default = "default_folders")]
    pub folders: IndexMap<String, String>,
    #[serde(default = "default_max_html")]
    pub max_html_len: usize,
    #[serde(default = "default_max_text")]
    pub max_text_len: usize,
    #[serde(default = "default_max_rss_html")]
    pub max_rss_html_len: usize,
    #[serde(default = "default_max_rss_text")]
    pub max_rss_text_len: usize,
    #[serde(default = "default_max_summary")]
    pub max_summary_len: usize,
    #[serde(default = "default_remove_css")]
    pub remove_css: bool,
    #[serde(default = "default_max_items")]
    pub max_feed_items: usize,
}

impl Config {
    /// Load from a JSON file, overlay `MAILFEED_*` env vars, validate.
    pub fn load(path: &Path) -> Result<Self, SweepError> {
        let data = fs::read_to_string(path).map_err(|e| {
            SweepError::Config(format!("read {}: {e}", path.display()))
        })?;
        let mut config: Config = serde_json::from_str(&data)
            .map_err(|e| SweepError::Config(format!("parse {}: {e}", path.display())))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override precedence lives here; the lookup is injected so tests can
    /// exercise it without touching process-wide environment state.
    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(host) = get("MAILFEED_HOST") {
            self.host = host;
        }
        if let Some(port) = get("MAILFEED_PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(username) = get("MAILFEED_USERNAME") {
            self.username = username;
        }
        if let Some(value) = get("MAILFEED_PASSWORD") {
            self.password = PasswordBackend::Plaintext { value };
        }
    }

    fn validate(&mut self) -> Result<(), SweepError> {
        if self.host.trim().is_empty() {
            return Err(SweepError::Config("host must not be empty".into()));
        }
        if self.username.trim().is_empty() {
            return Err(SweepError::Config("username must not be empty".into()));
        }
        if self.folders.is_empty() {
            return Err(SweepError::Config("at least one folder is required".into()));
        }
        if self.max_workers < 1 {
            log::warn!("max_workers < 1, raising to 1");
            self.max_workers = 1;
        }
        if self.max_workers > MAX_WORKERS {
            log::warn!("max_workers > {MAX_WORKERS}, capping at {MAX_WORKERS}");
            self.max_workers = MAX_WORKERS;
        }
        Ok(())
    }

    pub fn resolve_password(&self) -> Result<String, String> {
        match &self.password {
            PasswordBackend::Plaintext { value } => Ok(value.clone()),
            PasswordBackend::Keyring => keyring::get_password(&self.username, &self.host),
        }
    }

    pub fn normalize_config(&self) -> NormalizeConfig {
        NormalizeConfig {
            max_html_len: self.max_html_len,
            max_text_len: self.max_text_len,
            max_summary_len: self.max_summary_len,
            remove_css: self.remove_css,
        }
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            output_dir: self.output_dir.clone(),
            title: self.feed_title.clone(),
            base_url: self.base_url.clone(),
            max_rss_html_len: self.max_rss_html_len,
            max_rss_text_len: self.max_rss_text_len,
            max_items: self.max_feed_items,
        }
    }
}
