use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::ai::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::provider::{uniform_safety, GenerationConfig, HarmThreshold, SessionOptions};
use crate::state::Theme;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "GEMINI_MODEL";

/// User-facing copy. Kept as data so the product can be rebranded or
/// localized without touching code.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Strings {
    pub title: String,
    pub assistant_name: String,
    pub user_label: String,
    pub placeholder: String,
    pub thinking: String,
    pub empty_input: String,
    pub session_failed: String,
    pub send_failed: String,
    pub unavailable: String,
}

impl Default for Strings {
    fn default() -> Self {
        Self {
            title: "Codex Chatbot".to_string(),
            assistant_name: "Codex".to_string(),
            user_label: "You".to_string(),
            placeholder: "Ask anything for Codex...".to_string(),
            thinking: "Thinking".to_string(),
            empty_input: "Please enter a message before sending.".to_string(),
            session_failed: "Failed to start chat. Please try again.".to_string(),
            send_failed: "Failed to send message. Please try again.".to_string(),
            unavailable: "Chat service unavailable. Press Ctrl+R to reconnect.".to_string(),
        }
    }
}

/// Colors for one theme, as ratatui color names or `#rrggbb`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ThemeColors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Palette {
    pub light: ThemeColors,
    pub dark: ThemeColors,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            light: ThemeColors {
                primary: "#ffffff".to_string(),
                secondary: "#f3f4f6".to_string(),
                accent: "#06b6d4".to_string(),
                text: "#1f2937".to_string(),
            },
            dark: ThemeColors {
                primary: "#111827".to_string(),
                secondary: "#1f2937".to_string(),
                accent: "#06b6d4".to_string(),
                text: "#f3f4f6".to_string(),
            },
        }
    }
}

impl Palette {
    pub fn colors(&self, theme: Theme) -> &ThemeColors {
        match theme {
            Theme::Light => &self.light,
            Theme::Dark => &self.dark,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub generation: GenerationConfig,
    pub safety_threshold: HarmThreshold,
    pub request_timeout_secs: u64,
    pub notice_duration_ms: u64,
    pub theme: Theme,
    pub strings: Strings,
    pub palette: Palette,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            generation: GenerationConfig::default(),
            safety_threshold: HarmThreshold::default(),
            request_timeout_secs: 60,
            notice_duration_ms: 3000,
            theme: Theme::default(),
            strings: Strings::default(),
            palette: Palette::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the user's config file, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Environment variables win over the file
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            generation: self.generation.clone(),
            safety: uniform_safety(self.safety_threshold),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("codex-chat").join("config.json"))
    }
}
