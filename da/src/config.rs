//! deepagent configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::llm::LlmError;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Remote endpoint configuration
    pub llm: LlmConfig,

    /// Retry and backoff settings
    pub retry: RetryConfig,

    /// Session behaviour
    pub session: SessionConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key variable is set and the retry settings are
    /// usable. Call this early in startup to fail fast with clear messages.
    pub fn validate(&self) -> Result<()> {
        debug!("validate: called");
        if self.retry.max_retries == 0 {
            return Err(eyre::eyre!("retry.max-retries must be at least 1"));
        }
        self.llm.get_api_key()?;
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        debug!(?config_path, "load: called");
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => p.clone(),
            None => Self::search_paths().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        serde_yaml::from_str::<Self>(&content).ok()?.log_level
    }

    /// Project-local file first, then the user config directory
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".deepagent.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("deepagent").join("deepagent.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Per-attempt request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String, LlmError> {
        debug!(api_key_env = %self.api_key_env, "get_api_key: called");
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(LlmError::MissingApiKey(self.api_key_env.clone())),
        }
    }
}

/// Retry and backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Linear backoff base in milliseconds
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 2_000,
        }
    }
}

/// Session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pass earlier subtask results to the executor as prior context
    #[serde(rename = "share-context")]
    pub share_context: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { share_context: true }
    }
}
