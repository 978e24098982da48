//! Runtime configuration.
//!
//! Sources are merged in order, later ones winning: built-in defaults, the TOML file
//! (`config.toml` in the user config directory, or an explicit path), then
//! `PODSEARCH_*` environment variables with `__` between nested keys
//! (e.g. `PODSEARCH_BACKEND__BASE_URL`).

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::BackendVersion;

pub(crate) const ENV_PREFIX: &str = "PODSEARCH_";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("backend.base_url must start with http:// or https:// (got `{0}`)")]
    InvalidBaseUrl(String),
    #[error("backend.attempts must be at least 1")]
    NoAttempts,
    #[error("backend.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct BackendConfig {
    pub(crate) base_url: String,
    pub(crate) version: BackendVersion,
    pub(crate) connect_timeout_ms: u64,
    pub(crate) read_timeout_ms: u64,
    /// Upper bound for a whole search, retries included.
    pub(crate) request_timeout_ms: u64,
    pub(crate) attempts: usize,
    pub(crate) retry_delay_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            version: BackendVersion::default(),
            connect_timeout_ms: 3_000,
            read_timeout_ms: 20_000,
            request_timeout_ms: 30_000,
            attempts: 2,
            retry_delay_ms: 500,
        }
    }
}

impl BackendConfig {
    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub(crate) fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerConfig {
    pub(crate) command: String,
    /// `{source}` and `{start}` are substituted per cue.
    pub(crate) args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: "mpv".to_string(),
            args: vec![
                "--no-video".to_string(),
                "--really-quiet".to_string(),
                "--start={start}".to_string(),
                "{source}".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) backend: BackendConfig,
    pub(crate) player: PlayerConfig,
}

impl AppConfig {
    /// Loads and validates the layered configuration. A missing file is not an error.
    pub(crate) fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = config_file {
            debug!(
                "config file {} (exists: {})",
                path.display(),
                path.exists()
            );
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn with_base_url(mut self, base_url: Option<String>) -> Result<Self, ConfigError> {
        if let Some(base_url) = base_url {
            self.backend.base_url = base_url;
            self.validate()?;
        }
        Ok(self)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.backend.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.backend.base_url.clone()));
        }
        if self.backend.attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        for (name, value) in [
            ("connect_timeout_ms", self.backend.connect_timeout_ms),
            ("read_timeout_ms", self.backend.read_timeout_ms),
            ("request_timeout_ms", self.backend.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn temp_config(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "podsearch-config-test-{}-{name}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("config.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.backend.version, BackendVersion::V2);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("podsearch-definitely-missing/config.toml");
        let config = AppConfig::load(Some(&path)).expect("defaults load");
        assert_eq!(config.backend.attempts, AppConfig::default().backend.attempts);
    }

    #[test]
    fn file_values_override_defaults() {
        let path = temp_config(
            "override",
            r#"
            [backend]
            base_url = "https://search.example"
            version = "v1"
            attempts = 4

            [player]
            command = "ffplay"
            args = ["-nodisp", "-ss", "{start}", "{source}"]
            "#,
        );
        let config = AppConfig::load(Some(&path)).expect("load");
        assert_eq!(config.backend.base_url, "https://search.example");
        assert_eq!(config.backend.version, BackendVersion::V1);
        assert_eq!(config.backend.attempts, 4);
        assert_eq!(config.backend.read_timeout_ms, 20_000);
        assert_eq!(config.player.command, "ffplay");
        assert_eq!(config.player.args.len(), 4);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let path = temp_config("invalid", "[backend]\nbase_url = \"ftp://nope\"\n");
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::InvalidBaseUrl(_))
        ));

        let mut config = AppConfig::default();
        config.backend.attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoAttempts)));

        let mut config = AppConfig::default();
        config.backend.request_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroTimeout("request_timeout_ms"))
        ));
    }

    #[test]
    fn command_line_base_url_wins_and_is_validated() {
        let config = AppConfig::default()
            .with_base_url(Some("http://10.0.0.2:8080".to_string()))
            .expect("valid url");
        assert_eq!(config.backend.base_url, "http://10.0.0.2:8080");
        assert!(
            AppConfig::default()
                .with_base_url(Some("localhost".to_string()))
                .is_err()
        );
    }
}
