use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bearer token for authentication (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_port() -> u16 {
    8000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            auth_token: None,
        }
    }
}

/// Reminder scheduler tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Dispatcher poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// How many times a reminder is spoken.
    #[serde(default = "default_speech_repeats")]
    pub speech_repeats: u32,
    /// Pause between speech rounds, in seconds.
    #[serde(default = "default_speech_pause")]
    pub speech_pause_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_speech_repeats() -> u32 {
    3
}

fn default_speech_pause() -> u64 {
    2
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            speech_repeats: default_speech_repeats(),
            speech_pause_secs: default_speech_pause(),
        }
    }
}

/// Local AI assistant (Ollama) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    /// Model to generate with.
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "phi3".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            model: default_model(),
        }
    }
}

/// Top-level routinely configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutinelyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// Resolve the routinely config directory (~/.routinely/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".routinely"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.routinely/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<RoutinelyConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<RoutinelyConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(RoutinelyConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: RoutinelyConfig = json5::from_str(&content)?;
    Ok(config)
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Save configuration to the default path.
pub fn save_config(config: &RoutinelyConfig) -> Result<(), ConfigError> {
    let dir = ensure_config_dir()?;
    let path = dir.join("config.json5");
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RoutinelyConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.scheduler.poll_interval_secs, 5);
        assert_eq!(config.scheduler.speech_repeats, 3);
        assert_eq!(config.assistant.model, "phi3");
    }

    #[test]
    fn test_json5_parse() {
        let json5_str = r#"{
            server: { port: 9000, auth_token: "secret" },
            scheduler: { poll_interval_secs: 30 },
        }"#;
        let config: RoutinelyConfig = json5::from_str(json5_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.auth_token, Some("secret".into()));
        assert_eq!(config.scheduler.poll_interval_secs, 30);
        // Untouched sections fall back to defaults
        assert_eq!(config.scheduler.speech_repeats, 3);
        assert_eq!(config.assistant.ollama_url, "http://localhost:11434");
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let config = load_config_from(Path::new("/nonexistent/config.json5")).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
