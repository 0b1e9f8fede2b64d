//! Studio configuration: `webcrafter.yaml` plus the API key from the environment.

use crate::error::StudioResult;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use webcrafter_core::PlaygroundSettings;

/// Environment variable holding the OpenRouter API key. The key is never read from the file.
pub const API_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "webcrafter.yaml";

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Free-tier models, tried in order.
pub const DEFAULT_MODELS: [&str; 3] = [
    "google/gemini-2.0-flash-exp:free",
    "google/gemini-2.0-pro-exp-02-05:free",
    "meta-llama/llama-3.3-70b-instruct:free",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub models: Vec<String>,
    pub timeout_secs: u64,
    /// Sent as `HTTP-Referer`.
    pub referer: String,
    /// Sent as `X-Title`.
    pub title: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout_secs: 60,
            referer: "https://webcrafter.ai".to_string(),
            title: "WebCrafter AI".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub store_path: PathBuf,
    pub history_limit: usize,
    pub history_debounce_ms: u64,
    pub autosave_debounce_ms: u64,
    pub notification_ttl_ms: u64,
    pub gateway: GatewayConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".webcrafter/store.json"),
            history_limit: 50,
            history_debounce_ms: 800,
            autosave_debounce_ms: 1000,
            notification_ttl_ms: 3000,
            gateway: GatewayConfig::default(),
        }
    }
}

impl StudioConfig {
    pub fn from_yaml(raw: &str) -> StudioResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Reads `path`, or [`DEFAULT_CONFIG_FILE`] when it exists. An explicit
    /// path that cannot be read is an error; a missing default file is not.
    pub async fn load(path: Option<&Path>) -> StudioResult<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let config = Self::from_yaml(&raw)?;
                tracing::debug!(path = %path.display(), "config: loaded");
                Ok(config)
            }
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }

    pub fn playground_settings(&self) -> PlaygroundSettings {
        PlaygroundSettings {
            history_limit: self.history_limit,
            history_debounce: Duration::from_millis(self.history_debounce_ms),
            autosave_debounce: Duration::from_millis(self.autosave_debounce_ms),
            ..PlaygroundSettings::default()
        }
    }
}

/// The API key, if set and non-blank.
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_VAR).ok().filter(|k| !k.trim().is_empty())
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = StudioConfig::from_yaml("").unwrap();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.gateway.models.len(), 3);
        assert_eq!(config.gateway.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.notification_ttl(), Duration::from_secs(3));
    }

    #[test]
    fn test_partial_override() {
        let config = StudioConfig::from_yaml(
            "history_debounce_ms: 200\ngateway:\n  models: [\"a/b\"]\n  timeout_secs: 5\n",
        )
        .unwrap();
        assert_eq!(config.history_debounce_ms, 200);
        assert_eq!(config.gateway.models, vec!["a/b".to_string()]);
        assert_eq!(config.gateway.title, "WebCrafter AI");

        let settings = config.playground_settings();
        assert_eq!(settings.history_debounce, Duration::from_millis(200));
        assert_eq!(settings.autosave_debounce, Duration::from_secs(1));
    }

    #[test]
    fn test_bad_yaml_is_an_error() {
        assert!(StudioConfig::from_yaml("history_limit: [oops").is_err());
    }

    #[tokio::test]
    async fn test_load_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(StudioConfig::load(Some(&missing)).await.is_err());

        let path = dir.path().join("webcrafter.yaml");
        tokio::fs::write(&path, "store_path: /tmp/x.json\n").await.unwrap();
        let config = StudioConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/x.json"));
    }
}
