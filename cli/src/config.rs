use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clearplate_core::chat::ChatSettings;
use directories::ProjectDirs;
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Optional settings read from `config.json`. Environment variables win.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Read `path`; a missing file is an empty config.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub chat: ChatSettings,
    pub timeout: Duration,
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Read `config.json` from the platform config directory, then apply
    /// environment overrides. Call after `.env` has been loaded.
    pub fn load() -> Result<Self> {
        let config_path = ProjectDirs::from("", "", "clearplate")
            .map(|dirs| dirs.config_dir().join("config.json"));
        let file = match &config_path {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };

        let mut config = Self::from_sources(file, |key| std::env::var(key).ok())?;
        config.config_path = config_path;
        Ok(config)
    }

    /// Merge file settings with variables looked up through `env`.
    pub fn from_sources(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = env("CLEARPLATE_API_KEY")
            .or_else(|| env("OPENAI_API_KEY"))
            .or(file.api_key)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let model = env("CLEARPLATE_MODEL")
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let endpoint = env("CLEARPLATE_ENDPOINT")
            .or(file.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let max_tokens = match env("CLEARPLATE_MAX_TOKENS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("Invalid CLEARPLATE_MAX_TOKENS '{v}'"))?,
            None => file.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };
        let temperature = match env("CLEARPLATE_TEMPERATURE") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("Invalid CLEARPLATE_TEMPERATURE '{v}'"))?,
            None => file.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        };
        let timeout_secs = match env("CLEARPLATE_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("Invalid CLEARPLATE_TIMEOUT_SECS '{v}'"))?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Config {
            api_key,
            endpoint,
            chat: ChatSettings {
                model,
                max_tokens,
                temperature,
            },
            timeout: Duration::from_secs(timeout_secs),
            config_path: None,
        })
    }

    /// API key with everything but the first and last four characters hidden.
    pub fn redacted_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let chars: Vec<char> = key.chars().collect();
            if chars.len() <= 8 {
                "****".to_string()
            } else {
                let head: String = chars[..4].iter().collect();
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{head}...{tail}")
            }
        })
    }
}
