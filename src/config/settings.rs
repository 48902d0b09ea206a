// src/config/settings.rs
//! User settings (AI assistant + Google Sheet coordinates).
//!
//! Persisted as one flat JSON blob. Read once at startup, overwritten whole on
//! every save. A missing or corrupt file yields defaults; fields missing from
//! an older file are filled from defaults section by section.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.json";
pub const ENV_SETTINGS_PATH: &str = "DASHBOARD_SETTINGS_PATH";
/// Used when no key has been saved in settings.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert Social Media data analyst AI assistant. Provide insightful analysis based on the current dashboard context.";

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (100, 2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AiModel {
    #[serde(rename = "gpt-4.1")]
    Gpt41,
    #[default]
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl AiModel {
    pub fn as_str(self) -> &'static str {
        match self {
            AiModel::Gpt41 => "gpt-4.1",
            AiModel::Gpt4 => "gpt-4",
            AiModel::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    pub system_prompt: String,
    pub model: AiModel,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: AiModel::Gpt4,
            temperature: 0.7,
            max_tokens: 1000,
            api_key: String::new(),
        }
    }
}

impl AiSettings {
    /// Saved key, else `$OPENAI_API_KEY`. `None` when neither is set.
    pub fn resolved_api_key(&self) -> Option<String> {
        let saved = self.api_key.trim();
        if !saved.is_empty() {
            return Some(saved.to_string());
        }
        std::env::var(ENV_OPENAI_API_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    /// OpenAI secret keys start with `sk-`.
    pub fn is_api_key_valid(&self) -> bool {
        self.api_key.starts_with("sk-")
    }

    /// Clamp the tunables into the ranges the UI offers.
    fn sanitize(&mut self) {
        let (t_min, t_max) = TEMPERATURE_RANGE;
        if !self.temperature.is_finite() {
            self.temperature = AiSettings::default().temperature;
        }
        self.temperature = self.temperature.clamp(t_min, t_max);
        let (m_min, m_max) = MAX_TOKENS_RANGE;
        self.max_tokens = self.max_tokens.clamp(m_min, m_max);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleSheetsSettings {
    pub sheet_id: String,
    pub sheet_name: String,
    pub gid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub ai_settings: AiSettings,
    pub google_sheets_settings: GoogleSheetsSettings,
}

impl AppSettings {
    /// Copy safe to hand to a client: the API key is masked to its last 4 chars.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        out.ai_settings.api_key = mask_key(&self.ai_settings.api_key);
        out
    }
}

fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{tail}")
}

/// Partial update; `None` leaves the current value alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub ai_settings: Option<AiSettingsPatch>,
    pub google_sheets_settings: Option<GoogleSheetsPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettingsPatch {
    pub system_prompt: Option<String>,
    pub model: Option<AiModel>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSheetsPatch {
    pub sheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub gid: Option<String>,
}

impl SettingsPatch {
    pub fn apply(self, to: &mut AppSettings) {
        if let Some(ai) = self.ai_settings {
            let dst = &mut to.ai_settings;
            if let Some(v) = ai.system_prompt {
                dst.system_prompt = v;
            }
            if let Some(v) = ai.model {
                dst.model = v;
            }
            if let Some(v) = ai.temperature {
                dst.temperature = v;
            }
            if let Some(v) = ai.max_tokens {
                dst.max_tokens = v;
            }
            if let Some(v) = ai.api_key {
                dst.api_key = v.trim().to_string();
            }
            dst.sanitize();
        }
        if let Some(gs) = self.google_sheets_settings {
            let dst = &mut to.google_sheets_settings;
            if let Some(v) = gs.sheet_id {
                dst.sheet_id = v.trim().to_string();
            }
            if let Some(v) = gs.sheet_name {
                dst.sheet_name = v.trim().to_string();
            }
            if let Some(v) = gs.gid {
                dst.gid = v.trim().to_string();
            }
        }
    }
}

/// Parse a settings blob; unknown or missing keys fall back to defaults.
pub fn parse_settings(s: &str) -> Result<AppSettings> {
    let mut settings: AppSettings = serde_json::from_str(s).context("parsing settings json")?;
    settings.ai_settings.sanitize();
    Ok(settings)
}

/// Owner of the settings blob. Constructed once at startup and shared through
/// the application state; there is no global instance.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<AppSettings>,
}

impl SettingsStore {
    /// Load from `path`. Never fails: a missing or unreadable file means defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(s) => parse_settings(&s).unwrap_or_else(|e| {
                warn!(target: "settings", path = %path.display(), error = ?e, "corrupt settings, using defaults");
                AppSettings::default()
            }),
            Err(_) => AppSettings::default(),
        };
        info!(
            target: "settings",
            path = %path.display(),
            model = current.ai_settings.model.as_str(),
            key_len = current.ai_settings.api_key.len(),
            "settings loaded"
        );
        Self {
            path,
            current: RwLock::new(current),
        }
    }

    /// In-memory store that still persists to `path` on update.
    pub fn with_settings(path: impl Into<PathBuf>, settings: AppSettings) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(settings),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> AppSettings {
        self.current
            .read()
            .expect("settings rwlock poisoned")
            .clone()
    }

    /// Merge `patch` and overwrite the whole blob on disk. The in-memory
    /// settings only change once the write succeeded.
    pub fn update(&self, patch: SettingsPatch) -> Result<AppSettings> {
        let mut guard = self.current.write().expect("settings rwlock poisoned");
        let mut updated = guard.clone();
        patch.apply(&mut updated);
        if let Err(e) = save_settings(&self.path, &updated) {
            warn!(target: "settings", path = %self.path.display(), error = ?e, "failed to save settings");
            return Err(e);
        }
        *guard = updated.clone();
        Ok(updated)
    }
}

/// Write via a temp file + rename so a crash never leaves half a blob.
pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(settings).context("serializing settings")?;
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(json.as_bytes())?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
