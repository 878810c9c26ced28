//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! Transport settings are read once at startup; the built [`Transport`]
//! keeps its own copy and cannot be reconfigured afterwards.
//!
//! [`Transport`]: crate::transport::Transport

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tracking::{SinkOptions, DEFAULT_MAX_LOGS};

/// Hardcoded backend address used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Build flavour; controls development-only behaviour such as mirroring
/// error records to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Environment::Development
        } else {
            Environment::Production
        }
    }
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }
}

/// Shared HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_headers")]
    pub default_headers: BTreeMap<String, String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_ms: default_timeout(),
            default_headers: default_headers(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Error tracking configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_max_logs")]
    pub max_logs: usize,

    /// Force console mirroring on or off; follows the environment when unset
    pub console_mirror: Option<bool>,
}

fn default_max_logs() -> usize {
    DEFAULT_MAX_LOGS
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_logs: default_max_logs(),
            console_mirror: None,
        }
    }
}

impl TrackingConfig {
    pub fn sink_options(&self, environment: Environment) -> SinkOptions {
        SinkOptions {
            capacity: self.max_logs,
            mirror_to_console: self
                .console_mirror
                .unwrap_or_else(|| environment.is_development()),
        }
    }
}

/// Persistent client storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("finboard").join("storage.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./finboard_storage.json".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("finboard").join("config.toml")),
            Some(PathBuf::from("./finboard.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the process environment in
    /// production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("FINBOARD_ENV") {
            match Environment::parse(&env) {
                Some(environment) => self.environment = environment,
                None => tracing::warn!("Ignoring unknown FINBOARD_ENV value {:?}", env),
            }
        }

        // Transport overrides
        if let Some(url) = lookup("FINBOARD_API_URL").filter(|u| !u.trim().is_empty()) {
            self.transport.base_url = url;
        }
        if let Some(timeout) = lookup("FINBOARD_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => self.transport.timeout_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid FINBOARD_TIMEOUT_MS value {:?}", timeout),
            }
        }

        // Tracking overrides
        if let Some(max_logs) = lookup("FINBOARD_MAX_LOGS") {
            match max_logs.parse() {
                Ok(n) => self.tracking.max_logs = n,
                Err(_) => tracing::warn!("Ignoring invalid FINBOARD_MAX_LOGS value {:?}", max_logs),
            }
        }

        // Storage overrides
        if let Some(path) = lookup("FINBOARD_STORAGE_PATH") {
            self.storage.path = path;
        }

        // Logging overrides
        if let Some(level) = lookup("FINBOARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("FINBOARD_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Error sink options derived from tracking settings and environment
    pub fn sink_options(&self) -> SinkOptions {
        self.tracking.sink_options(self.environment)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            transport: TransportConfig::default(),
            tracking: TrackingConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Finboard Configuration
#
# Environment variables override these settings:
# - FINBOARD_ENV
# - FINBOARD_API_URL
# - FINBOARD_TIMEOUT_MS
# - FINBOARD_MAX_LOGS
# - FINBOARD_STORAGE_PATH
# - FINBOARD_LOG_LEVEL
# - FINBOARD_LOG_FORMAT

# development mirrors every tracked error to the log output
environment = "development"

[transport]
# Backend base address
base_url = "http://localhost:8000"

# Per-call timeout (ms)
timeout_ms = 10000

# Headers sent with every request
[transport.default_headers]
"Content-Type" = "application/json"

[tracking]
# Number of error records kept in memory
max_logs = 100

# Force console mirroring on or off (defaults to on in development)
# console_mirror = true

[storage]
# File holding persistent client storage (bearer token)
# path = "~/.local/share/finboard/storage.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.transport.base_url, "http://localhost:8000");
        assert_eq!(config.transport.timeout_ms, 10_000);
        assert_eq!(
            config.transport.default_headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(config.tracking.max_logs, 100);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("FINBOARD_API_URL", "https://api.finboard.example"),
            ("FINBOARD_TIMEOUT_MS", "2500"),
            ("FINBOARD_ENV", "production"),
            ("FINBOARD_MAX_LOGS", "20"),
        ]));

        assert_eq!(config.transport.base_url, "https://api.finboard.example");
        assert_eq!(config.transport.timeout(), Duration::from_millis(2500));
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.tracking.max_logs, 20);
    }

    #[test]
    fn test_invalid_and_empty_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("FINBOARD_API_URL", ""),
            ("FINBOARD_TIMEOUT_MS", "soon"),
            ("FINBOARD_ENV", "staging"),
        ]));

        assert_eq!(config.transport.base_url, DEFAULT_API_URL);
        assert_eq!(config.transport.timeout_ms, 10_000);
    }

    #[test]
    fn test_sink_options_follow_environment() {
        let mut config = Config::default();

        config.environment = Environment::Development;
        assert!(config.sink_options().mirror_to_console);

        config.environment = Environment::Production;
        assert!(!config.sink_options().mirror_to_console);

        config.tracking.console_mirror = Some(true);
        assert!(config.sink_options().mirror_to_console);
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.transport.base_url, DEFAULT_API_URL);
        assert_eq!(config.transport.timeout_ms, 10_000);
        assert_eq!(config.tracking.max_logs, 100);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transport]\nbase_url = \"http://10.0.0.5:9000\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.transport.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.transport.timeout_ms, 10_000);
    }

    #[test]
    fn test_load_reports_parse_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[transport\n").unwrap();

        match Config::load(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
