use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

static ENV_PREFIX: &str = "QUIZGEN";
static LEGACY_API_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub database_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Layers `quizgen.toml` (optional) under `QUIZGEN__*` environment variables.
    /// `GEMINI_API_KEY` is honoured when no prefixed key is set.
    pub fn load() -> Result<Self, ConfigError> {
        let legacy_key = env::var(LEGACY_API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty());

        let config = Self::defaults()?
            .add_source(File::with_name("quizgen").required(false))
            .set_default("gemini.api_key", legacy_key)?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.address", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("server.log_level", "debug")?
            .set_default("gemini.model", "gemini-2.5-flash")?
            .set_default("gemini.base_url", "https://generativelanguage.googleapis.com")?
            .set_default("gemini.timeout_secs", 60)
    }

    pub fn log_level(&self) -> LevelFilter {
        self.server
            .log_level
            .parse()
            .unwrap_or(LevelFilter::DEBUG)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_without_any_source() {
        let config: AppConfig = AppConfig::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert!(config.gemini.api_key.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn unknown_log_level_falls_back_to_debug() {
        let mut config: AppConfig = AppConfig::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        config.server.log_level = "loud".into();
        assert_eq!(config.log_level(), LevelFilter::DEBUG);

        config.server.log_level = "warn".into();
        assert_eq!(config.log_level(), LevelFilter::WARN);
    }
}
