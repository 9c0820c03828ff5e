use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the server address
pub const URL_ENV: &str = "MEDASSIST_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_GREETING: &str = "Hello! I'm connected to the assistant server.";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base address of the assistant server
    pub base_url: String,

    /// Where the context and profile blobs live
    pub data_dir: PathBuf,

    /// Client-side request timeout; unset waits on the transport
    pub request_timeout_secs: Option<u64>,

    /// First bot message of every session
    pub greeting: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: default_home(),
            request_timeout_secs: None,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".medassist")
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        default_home().join("config.toml")
    }

    /// Load configuration from `path` and apply the environment override
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        if let Ok(url) = std::env::var(URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        Ok(config)
    }

    /// Read the file only, falling back to defaults when it does not exist
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    pub fn with_base_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.base_url = url;
        }
        self
    }

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.data_dir = dir;
        }
        self
    }
}
