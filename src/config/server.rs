// src/config/server.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::settings::{DEFAULT_SETTINGS_PATH, ENV_SETTINGS_PATH};
use crate::ingest::providers::excel::MAX_UPLOAD_BYTES;
use crate::ingest::providers::google_sheets::DEFAULT_SHEETS_BASE_URL;

pub const DEFAULT_SERVER_CONFIG_PATH: &str = "config/dashboard.toml";
pub const ENV_SERVER_CONFIG_PATH: &str = "DASHBOARD_CONFIG_PATH";
pub const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

fn default_settings_path() -> PathBuf {
    PathBuf::from(DEFAULT_SETTINGS_PATH)
}
fn default_sheets_base_url() -> String {
    DEFAULT_SHEETS_BASE_URL.to_string()
}
fn default_max_upload_bytes() -> usize {
    MAX_UPLOAD_BYTES
}
fn default_chat_completions_url() -> String {
    DEFAULT_CHAT_COMPLETIONS_URL.to_string()
}

/// Deployment-level knobs. Everything has a default, so an absent file is fine.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
    #[serde(default = "default_sheets_base_url")]
    pub sheets_base_url: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_chat_completions_url")]
    pub chat_completions_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            sheets_base_url: default_sheets_base_url(),
            max_upload_bytes: default_max_upload_bytes(),
            chat_completions_url: default_chat_completions_url(),
        }
    }
}

impl ServerConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading server config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: ServerConfig = toml::from_str(s).context("parsing server config toml")?;
        if cfg.max_upload_bytes == 0 {
            cfg.max_upload_bytes = default_max_upload_bytes();
        }
        Ok(cfg)
    }

    /// Resolve config using env var + fallbacks:
    /// 1) $DASHBOARD_CONFIG_PATH (must exist)
    /// 2) config/dashboard.toml
    /// 3) built-in defaults
    ///
    /// `$DASHBOARD_SETTINGS_PATH` then overrides the settings file location.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_SERVER_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_SERVER_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_SERVER_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                Self::default()
            }
        };
        if let Ok(p) = std::env::var(ENV_SETTINGS_PATH) {
            if !p.trim().is_empty() {
                cfg.settings_path = PathBuf::from(p.trim());
            }
        }
        Ok(cfg)
    }
}
