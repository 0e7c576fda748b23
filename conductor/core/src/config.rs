//! Application Configuration
//!
//! Settings come from four layers, later ones winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`<config_dir>/cyberdesk/config.toml` or an explicit path)
//! 3. Environment variables
//! 4. Command-line overrides ([`ConfigOverrides`])
//!
//! # Example file
//!
//! ```toml
//! [backend]
//! kind = "ollama"
//! host = "localhost"
//! model = "llama3"
//!
//! [generation]
//! temperature = 0.3
//! max_tokens = 1024
//!
//! [retry]
//! max_attempts = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{Backend, BackendSettings, RetryPolicy};
use crate::store::default_database_path;

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File exists but could not be read
    #[error("failed to read config {path:?}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`AppConfig`]
    #[error("invalid config {path:?}: {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },
}

/// Which server to talk to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Wire protocol
    pub kind: Backend,
    /// Hostname or IP
    pub host: String,
    /// Port; the backend's default when unset
    pub port: Option<u16>,
    /// Model identifier; first listed model when unset
    pub model: Option<String>,
    /// Timeout for a single generation request
    pub generation_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: Backend::Ollama,
            host: "localhost".to_string(),
            port: None,
            model: None,
            generation_timeout_secs: 300,
        }
    }
}

/// Sampling defaults
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Sampling temperature, 0.0 - 1.0
    pub temperature: f32,
    /// Completion token budget
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// Where data lives on disk
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; platform data dir when unset
    pub database_path: Option<PathBuf>,
    /// Directory for exports; working directory when unset
    pub export_dir: Option<PathBuf>,
}

/// Complete application configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend connection
    pub backend: BackendConfig,
    /// Sampling defaults
    pub generation: GenerationConfig,
    /// Retry policy for generation
    pub retry: RetryPolicy,
    /// Storage locations
    pub storage: StorageConfig,
}

/// Values supplied on the command line
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigOverrides {
    /// Backend kind
    pub backend: Option<Backend>,
    /// Hostname
    pub host: Option<String>,
    /// Port
    pub port: Option<u16>,
    /// Model identifier
    pub model: Option<String>,
    /// Database file
    pub database_path: Option<PathBuf>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Completion token budget
    pub max_tokens: Option<u32>,
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cyberdesk").join("config.toml"))
    }

    /// Load file and environment layers.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {:?}", path);
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment variables from the process environment
    ///
    /// Environment variables:
    /// - `CYBERDESK_BACKEND`: "ollama", "lmstudio"
    /// - `CYBERDESK_HOST` (or `OLLAMA_HOST`): server hostname
    /// - `CYBERDESK_PORT` (or `OLLAMA_PORT`): server port
    /// - `CYBERDESK_MODEL`: model identifier
    /// - `CYBERDESK_DB`: database file
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment variables read through `lookup`
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(k).filter(|v| !v.is_empty()));

        if let Some(kind) = first(&["CYBERDESK_BACKEND"]) {
            match kind.parse() {
                Ok(kind) => self.backend.kind = kind,
                Err(e) => warn!("Ignoring CYBERDESK_BACKEND: {}", e),
            }
        }
        if let Some(host) = first(&["CYBERDESK_HOST", "OLLAMA_HOST"]) {
            self.backend.host = host;
        }
        if let Some(port) = first(&["CYBERDESK_PORT", "OLLAMA_PORT"]) {
            match port.parse() {
                Ok(port) => self.backend.port = Some(port),
                Err(_) => warn!("Ignoring invalid port '{}'", port),
            }
        }
        if let Some(model) = first(&["CYBERDESK_MODEL"]) {
            self.backend.model = Some(model);
        }
        if let Some(db) = first(&["CYBERDESK_DB"]) {
            self.storage.database_path = Some(PathBuf::from(db));
        }
    }

    /// Apply command-line values
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(kind) = overrides.backend {
            // A port chosen for the previous kind no longer applies
            if kind != self.backend.kind && overrides.port.is_none() {
                self.backend.port = None;
            }
            self.backend.kind = kind;
        }
        if let Some(host) = overrides.host {
            self.backend.host = host;
        }
        if let Some(port) = overrides.port {
            self.backend.port = Some(port);
        }
        if let Some(model) = overrides.model {
            self.backend.model = Some(model);
        }
        if let Some(path) = overrides.database_path {
            self.storage.database_path = Some(path);
        }
        if let Some(temperature) = overrides.temperature {
            self.generation.temperature = temperature;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            self.generation.max_tokens = max_tokens;
        }
    }

    /// Effective port
    pub fn port(&self) -> u16 {
        self.backend.port.unwrap_or_else(|| self.backend.kind.default_port())
    }

    /// Connection settings for [`crate::backend::connect`]
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings::new(self.backend.host.clone(), self.port())
            .with_retry(self.retry.clone())
            .with_generation_timeout(Duration::from_secs(self.backend.generation_timeout_secs))
    }

    /// Effective database file
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Effective export directory
    pub fn export_dir(&self) -> PathBuf {
        self.storage
            .export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.backend.kind, Backend::Ollama);
        assert_eq!(config.port(), 11434);
        assert_eq!(config.generation.max_tokens, 2000);
        assert_eq!(config.retry, RetryPolicy::default());

        let settings = config.backend_settings();
        assert_eq!(settings.base_url(), "http://localhost:11434");
        assert_eq!(settings.generation_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [backend]
            kind = "lmstudio"
            model = "qwen2.5"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.kind, Backend::LmStudio);
        assert_eq!(config.backend.host, "localhost");
        assert_eq!(config.port(), 1234);
        assert_eq!(config.backend.model.as_deref(), Some("qwen2.5"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.connection_backoff_ms, 5_000);
        assert!((config.generation.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            AppConfig::from_file(&missing),
            Err(ConfigError::Io { .. })
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[backend]\nport = \"not a number\"\n").unwrap();
        assert!(matches!(
            AppConfig::from_file(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_layer() {
        let mut config = AppConfig::default();
        config.apply_env_from(env(&[
            ("CYBERDESK_BACKEND", "LM-Studio"),
            ("OLLAMA_HOST", "10.0.0.5"),
            ("CYBERDESK_PORT", "9999"),
            ("CYBERDESK_MODEL", "m1"),
            ("CYBERDESK_DB", "/tmp/x.db"),
        ]));

        assert_eq!(config.backend.kind, Backend::LmStudio);
        assert_eq!(config.backend.host, "10.0.0.5");
        assert_eq!(config.port(), 9999);
        assert_eq!(config.backend.model.as_deref(), Some("m1"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_env_prefers_cyberdesk_names_and_ignores_garbage() {
        let mut config = AppConfig::default();
        config.apply_env_from(env(&[
            ("CYBERDESK_HOST", "primary"),
            ("OLLAMA_HOST", "secondary"),
            ("CYBERDESK_PORT", "not-a-port"),
            ("CYBERDESK_BACKEND", "gopher"),
        ]));

        assert_eq!(config.backend.host, "primary");
        assert_eq!(config.backend.port, None);
        assert_eq!(config.backend.kind, Backend::Ollama);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::default();
        config.backend.port = Some(11500);
        config.apply_overrides(ConfigOverrides {
            backend: Some(Backend::LmStudio),
            temperature: Some(0.2),
            ..ConfigOverrides::default()
        });

        // switching kind without a port falls back to the new default
        assert_eq!(config.port(), 1234);
        assert!((config.generation.temperature - 0.2).abs() < f32::EPSILON);

        config.apply_overrides(ConfigOverrides {
            port: Some(8080),
            max_tokens: Some(64),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.port(), 8080);
        assert_eq!(config.generation.max_tokens, 64);
    }
}
