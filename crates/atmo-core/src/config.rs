//! Configuration loading and typed config structures for the backend.
//!
//! The canonical configuration lives in `atmo-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty or missing file parses. The
//! database URL and the JWT secret have no usable default and must come
//! from the file or the environment.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level backend configuration.
///
/// Mirrors the structure of `atmo-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Notification relay settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Real-time fanout settings.
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Synthetic reading ingestion.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Bearer-token settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DATABASE_URL` overrides `database.url`
    /// - `PORT` overrides `server.port`
    /// - `JWT_SECRET` overrides `auth.jwt_secret`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without consulting the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml treats an empty document as null rather than an
        // empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PORT` is not a valid port.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = lookup("PORT") {
            self.server.port = val
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("invalid PORT {val:?}: {e}")))?;
        }
        if let Some(val) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = val;
        }
        Ok(())
    }

    /// Check the values the process cannot start without.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Invalid(
                "database.url is empty (set DATABASE_URL)".to_owned(),
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.jwt_secret is empty (set JWT_SECRET)".to_owned(),
            ));
        }
        if self.ingest.enabled && self.ingest.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "ingest.interval_secs must be positive".to_owned(),
            ));
        }
        if self.fanout.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "fanout.queue_capacity must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    5000
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    #[serde(default)]
    pub url: String,

    /// Shared pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Milliseconds to wait for a pooled connection.
    #[serde(default = "default_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Seconds an unused pooled connection is kept open.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_timeout_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    /// Pool acquire timeout as a [`Duration`].
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Pool idle timeout as a [`Duration`].
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

const fn default_idle_timeout_secs() -> u64 {
    300
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_timeout_ms() -> u64 {
    5000
}

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// Milliseconds allowed for a single lookup before the notification
    /// is dropped.
    #[serde(default = "default_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_timeout_ms(),
        }
    }
}

impl RelayConfig {
    /// Lookup timeout as a [`Duration`].
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// Real-time fanout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FanoutConfig {
    /// Events buffered per connection before new ones are dropped for it.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Milliseconds allowed for one `WebSocket` frame write.
    #[serde(default = "default_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            send_timeout_ms: default_timeout_ms(),
        }
    }
}

impl FanoutConfig {
    /// Send timeout as a [`Duration`].
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

const fn default_queue_capacity() -> usize {
    256
}

/// Synthetic ingestion configuration.
///
/// The ids identify the simulated sensor; they must exist in the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngestConfig {
    /// Whether the timer runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between synthetic readings.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Milliseconds allowed for the insert.
    #[serde(default = "default_timeout_ms")]
    pub query_timeout_ms: u64,

    /// `source_id` written on each reading.
    #[serde(default = "default_one")]
    pub source_id: i32,

    /// `sensor_id` written on each reading.
    #[serde(default = "default_one")]
    pub sensor_id: i32,

    /// `measurement_type_id` written on each reading.
    #[serde(default = "default_one")]
    pub measurement_type_id: i32,

    /// `unit_id` written on each reading.
    #[serde(default = "default_one")]
    pub unit_id: i32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            query_timeout_ms: default_timeout_ms(),
            source_id: 1,
            sensor_id: 1,
            measurement_type_id: 1,
            unit_id: 1,
        }
    }
}

impl IngestConfig {
    /// Tick period as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Insert timeout as a [`Duration`].
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

const fn default_true() -> bool {
    true
}

const fn default_interval_secs() -> u64 {
    300
}

const fn default_one() -> i32 {
    1
}

/// Bearer-token configuration.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens.
    #[serde(default)]
    pub jwt_secret: String,

    /// Token lifetime in hours.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

impl AuthConfig {
    /// Token lifetime as a [`Duration`].
    pub const fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours.saturating_mul(3600))
    }
}

const fn default_token_ttl_hours() -> u64 {
    24
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_original_schedule() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.ingest.interval(), Duration::from_secs(300));
        assert_eq!(config.relay.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.database.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.fanout.queue_capacity, 256);
        assert_eq!(config.auth.token_ttl(), Duration::from_secs(24 * 3600));
        assert!(config.ingest.enabled);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8081

database:
  url: "postgresql://atmo:atmo@db:5432/atmo"
  max_connections: 4
  idle_timeout_secs: 30

relay:
  query_timeout_ms: 2000

fanout:
  queue_capacity: 16
  send_timeout_ms: 1000

ingest:
  enabled: false
  interval_secs: 60
  sensor_id: 3

auth:
  jwt_secret: "dev-secret"
  token_ttl_hours: 1
"#;

        let config = AppConfig::parse_without_env(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.relay.query_timeout_ms, 2000);
        assert_eq!(config.fanout.queue_capacity, 16);
        assert!(!config.ingest.enabled);
        assert_eq!(config.ingest.sensor_id, 3);
        assert_eq!(config.ingest.source_id, 1);
        assert_eq!(config.auth.token_ttl_hours, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_empty_yaml() {
        let config = AppConfig::parse_without_env("");
        assert!(config.is_ok());
        assert_eq!(config.ok(), Some(AppConfig::default()));
    }

    #[test]
    fn env_overrides_win() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(env_from(&[
            ("DATABASE_URL", "postgresql://env/atmo"),
            ("PORT", "7000"),
            ("JWT_SECRET", "from-env"),
        ]));
        assert!(result.is_ok());
        assert_eq!(config.database.url, "postgresql://env/atmo");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.auth.jwt_secret, "from-env");
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(env_from(&[("PORT", "eighty")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_requires_secret_and_url() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.database.url = "postgresql://localhost/atmo".to_owned();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "s".to_owned();
        assert!(config.validate().is_ok());

        config.ingest.interval_secs = 0;
        assert!(config.validate().is_err());
        config.ingest.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_redacts_secret() {
        let auth = AuthConfig {
            jwt_secret: "super-secret".to_owned(),
            token_ttl_hours: 24,
        };
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("atmo-config.yaml");
        if path.exists() {
            let config = AppConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
