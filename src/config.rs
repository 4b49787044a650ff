//! Client configuration
//!
//! Values come from serde defaults, an optional config file, `RECOGNITION__*`
//! environment variables (loaded through `config`), and finally the flat
//! override variables read by [`ClientConfig::from_env`].

use anyhow::Context;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Model name persisted when an inference result does not name its model
    #[serde(default = "default_model_name")]
    pub default_model_name: String,
}

/// Backend connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Bearer token (read from env RECOGNITION_API_KEY if not set)
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// History view settings
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u32,

    /// Upper bound on records pulled for stats and filtered scans
    #[serde(default = "default_population_cap")]
    pub population_cap: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_model_name() -> String { "unknown".to_string() }
fn default_service_url() -> String { "http://localhost:8080".to_string() }
fn default_timeout_ms() -> u64 { 30_000 }
fn default_page_limit() -> u32 { 10 }
fn default_population_cap() -> u32 { 1000 }
fn default_log_level() -> String { "info".to_string() }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_page_limit: default_page_limit(),
            population_cap: default_population_cap(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
            default_model_name: default_model_name(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from an optional file plus `RECOGNITION__*` variables
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        // A missing .env is normal outside development
        let _ = dotenvy::dotenv();

        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("RECOGNITION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let loaded: ClientConfig = settings
            .try_deserialize()
            .context("Failed to deserialize client configuration")?;

        Ok(loaded.from_env())
    }

    /// Override with flat environment variables if present
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("RECOGNITION_SERVICE_URL") {
            self.backend.service_url = val;
        }

        if let Ok(val) = std::env::var("RECOGNITION_API_KEY") {
            self.backend.api_key = Some(SecretString::new(val));
        }

        if let Ok(val) = std::env::var("RECOGNITION_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.backend.timeout_ms = timeout;
            }
        }

        if let Ok(val) = std::env::var("RECOGNITION_PAGE_LIMIT") {
            if let Ok(limit) = val.parse::<u32>() {
                if limit > 0 {
                    self.history.default_page_limit = limit;
                }
            }
        }

        if let Ok(val) = std::env::var("RECOGNITION_LOG_JSON") {
            self.logging.json = val.to_lowercase() == "true" || val == "1";
        }

        self
    }
}

impl BackendConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
