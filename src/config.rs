//! Environment configuration

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "tinyllama";
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout { name: &'static str, value: String },
}

/// Settings read at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub base_url: String,
    /// Preselected model; replaced by the first listed one if the server lacks it
    pub default_model: String,
    pub system_prompt: Option<String>,
    /// Applies to the probe and the model listing, not to streaming
    pub probe_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let probe_timeout = match non_empty("OLLAMA_PROBE_TIMEOUT_SECS") {
            None => defaults.probe_timeout,
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        name: "OLLAMA_PROBE_TIMEOUT_SECS",
                        value,
                    })
                }
            },
        };

        Ok(Self {
            base_url: non_empty("OLLAMA_URL").unwrap_or(defaults.base_url),
            default_model: non_empty("OLLAMA_MODEL").unwrap_or(defaults.default_model),
            system_prompt: non_empty("OLLAMA_SYSTEM_PROMPT"),
            probe_timeout,
        })
    }
}
