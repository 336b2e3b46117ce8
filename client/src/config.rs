//! # Configuration Management
//!
//! Settings for a [`BoaClient`](crate::BoaClient): which endpoint to talk
//! to, how often `wait` polls, how many redirects an output download may
//! follow and how long a single HTTP request may take.
//!
//! ## Configuration File Location
//!
//! All platforms: `$HOME/.config/boa/config.json`, or
//! `$XDG_CONFIG_HOME/boa/config.json` when that variable is set.
//!
//! The `BOA_API_URL` environment variable overrides the stored endpoint.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Endpoint for the main Boa service
pub const BOA_API_ENDPOINT: &str = "https://boa.cs.iastate.edu/boa/?q=boa/api";

/// Endpoint for the Boa service for C/C++ datasets
pub const BOAC_API_ENDPOINT: &str = "https://boa.cs.iastate.edu/boac/?q=boa/api";

/// Environment variable for overriding the endpoint
const ENDPOINT_ENV_VAR: &str = "BOA_API_URL";

const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_MAX_REDIRECTS: usize = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Client configuration
///
/// # Example
///
/// ```rust
/// use boa_api::config::{BOAC_API_ENDPOINT, ClientConfig};
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_endpoint(BOAC_API_ENDPOINT)
///     .with_poll_interval(Duration::from_secs(5));
/// assert_eq!(config.poll_interval(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// RPC endpoint (stored in config file)
    #[serde(rename = "endpoint", default = "stored_default_endpoint")]
    stored_endpoint: String,
    /// Interval between status polls in `wait`, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Redirect hops an output download may follow
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Timeout for a single HTTP request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn stored_default_endpoint() -> String {
    BOA_API_ENDPOINT.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            stored_endpoint: stored_default_endpoint(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for a specific endpoint with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::default().with_endpoint(endpoint)
    }

    /// Get the effective endpoint
    ///
    /// Environment variable `BOA_API_URL` takes precedence over the stored value.
    pub fn endpoint(&self) -> String {
        std::env::var(ENDPOINT_ENV_VAR).unwrap_or_else(|_| self.stored_endpoint.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.stored_endpoint = endpoint.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Load configuration from a file
    ///
    /// # Returns
    ///
    /// * `Ok(ClientConfig)` - Successfully loaded configuration
    /// * `Err(_)` - File missing or invalid
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ClientConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default config file
    ///
    /// Falls back to the defaults when no config file exists.
    pub fn load_default() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Save configuration to a file
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

/// Get the path to the default configuration file
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs_config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("boa").join("config.json"))
}

/// Get the config directory
///
/// Uses `$HOME/.config` on all platforms for consistency.
fn dirs_config_dir() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .or_else(|| std::env::var("USERPROFILE").ok())
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_config_new_with_endpoint() {
        // SAFETY: env-mutating tests are serialized with serial_test
        unsafe { env::remove_var(ENDPOINT_ENV_VAR) };
        let config = ClientConfig::new(BOAC_API_ENDPOINT);
        assert_eq!(config.endpoint(), BOAC_API_ENDPOINT);
    }

    #[test]
    #[serial]
    fn test_default_endpoint_without_env() {
        // SAFETY: env-mutating tests are serialized with serial_test
        unsafe { env::remove_var(ENDPOINT_ENV_VAR) };
        assert_eq!(ClientConfig::default().endpoint(), BOA_API_ENDPOINT);
    }

    #[test]
    #[serial]
    fn test_env_var_takes_precedence() {
        let config = ClientConfig::new("http://stored.example.com/api");

        // SAFETY: env-mutating tests are serialized with serial_test
        unsafe { env::set_var(ENDPOINT_ENV_VAR, "http://env.example.com/api") };
        assert_eq!(config.endpoint(), "http://env.example.com/api");

        // SAFETY: env-mutating tests are serialized with serial_test
        unsafe { env::remove_var(ENDPOINT_ENV_VAR) };
        assert_eq!(config.endpoint(), "http://stored.example.com/api");
    }

    #[test]
    fn test_builder_setters() {
        let config = ClientConfig::default()
            .with_poll_interval(Duration::from_millis(250))
            .with_max_redirects(3)
            .with_request_timeout(Duration::from_secs(5));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.max_redirects, 3);
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_config_deserialization_partial() {
        let json = r#"{"endpoint":"http://localhost:8080/api","poll_interval_ms":50}"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.stored_endpoint, "http://localhost:8080/api");
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.max_redirects, 10);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("boa").join("config.json");

        let config = ClientConfig::new("http://test.example.com/api").with_max_redirects(2);
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ClientConfig::load(&temp_dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_config_load_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let err = ClientConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    #[serial]
    fn test_config_path_uses_xdg() {
        let temp_dir = TempDir::new().unwrap();
        let previous = env::var("XDG_CONFIG_HOME").ok();

        // SAFETY: env-mutating tests are serialized with serial_test
        unsafe { env::set_var("XDG_CONFIG_HOME", temp_dir.path()) };
        let path = config_path().unwrap();
        assert_eq!(path, temp_dir.path().join("boa").join("config.json"));

        let loaded = ClientConfig::load_default().unwrap();
        assert_eq!(loaded.max_redirects, 10);

        // SAFETY: env-mutating tests are serialized with serial_test
        unsafe {
            match previous {
                Some(value) => env::set_var("XDG_CONFIG_HOME", value),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }
    }
}
