// ============================================
// File: crates/luminous-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the control plane. The file is
//! read once at startup and the resulting value is handed to each
//! component constructor; nothing reads configuration from a global.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//!
//! ## Configuration Sections
//! - top level: gRPC listen address, advertised API endpoint, connection params
//! - `tls`: server certificate/key and the CA certificate advertised to nodes
//! - `auth`: token secret and lifetime, CA material paths, rotation policy
//! - `limits`: session TTL, command queue sizing, housekeeping interval
//! - `plugins`: backends to load
//! - `logging`: Log level and optional log file
//! - `metrics`: optional Prometheus exporter address
//!
//! ## Example Configuration
//! ```toml
//! listen_addr = "0.0.0.0:50051"
//! api_endpoint = "cp.example.net:50051"
//!
//! [connection_params]
//! max_reconnect_delay = "60s"
//! keepalive_time = "30s"
//!
//! [tls]
//! cert_file = "/etc/luminous-mesh/certs/server.crt"
//! key_file = "/etc/luminous-mesh/certs/server.key"
//! ca_cert = "/etc/luminous-mesh/certs/ca.crt"
//!
//! [auth]
//! token_secret = "change-me"
//! token_duration_secs = 86400
//! ca_cert_path = "/etc/luminous-mesh/certs/ca.crt"
//! ca_key_path = "/etc/luminous-mesh/certs/ca.key"
//!
//! [plugins]
//! load = ["api-gateway", "data-store"]
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require server restart
//! - `auth.token_secret` is a secret; never log the config with it
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ServerError};
use crate::plugins::{PluginRegistry, API_GATEWAY, DATA_STORE};

/// Connection parameters every node must be told about.
pub const REQUIRED_CONNECTION_PARAMS: [&str; 2] = ["max_reconnect_delay", "keepalive_time"];

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Endpoint nodes should use to reach the control plane.
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    /// Free-form connection parameters forwarded to nodes.
    #[serde(default = "default_connection_params")]
    pub connection_params: HashMap<String, String>,

    /// TLS configuration.
    #[serde(default)]
    pub tls: TlsConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Plugin configuration.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics exporter configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the TOML is malformed or fails validation.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.api_endpoint.trim().is_empty() {
            return Err(ServerError::config_invalid("api_endpoint", "is required"));
        }

        for param in REQUIRED_CONNECTION_PARAMS {
            if !self.connection_params.contains_key(param) {
                return Err(ServerError::config_invalid(
                    format!("connection_params.{param}"),
                    "is required",
                ));
            }
        }

        self.tls.validate()?;
        self.auth.validate()?;
        self.limits.validate()?;
        self.plugins.validate()?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            api_endpoint: default_api_endpoint(),
            connection_params: default_connection_params(),
            tls: TlsConfig::default(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            plugins: PluginsConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 50051))
}

fn default_api_endpoint() -> String {
    "localhost:50051".to_string()
}

fn default_connection_params() -> HashMap<String, String> {
    HashMap::from([
        ("max_reconnect_delay".to_string(), "60s".to_string()),
        ("keepalive_time".to_string(), "30s".to_string()),
    ])
}

fn require_path(field: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ServerError::config_invalid(field, "is required"));
    }
    Ok(())
}

// ============================================
// TlsConfig
// ============================================

/// TLS configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Server certificate chain (PEM).
    #[serde(default = "default_cert_file")]
    pub cert_file: PathBuf,

    /// Server private key (PEM).
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,

    /// CA certificate advertised to nodes in `ControlPlaneInfo`.
    #[serde(default)]
    pub ca_cert: PathBuf,
}

fn default_cert_file() -> PathBuf {
    PathBuf::from("/etc/luminous-mesh/certs/server.crt")
}

fn default_key_file() -> PathBuf {
    PathBuf::from("/etc/luminous-mesh/certs/server.key")
}

impl TlsConfig {
    fn validate(&self) -> Result<()> {
        require_path("tls.cert_file", &self.cert_file)?;
        require_path("tls.key_file", &self.key_file)?;
        require_path("tls.ca_cert", &self.ca_cert)?;
        Ok(())
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_file: default_cert_file(),
            key_file: default_key_file(),
            ca_cert: PathBuf::new(),
        }
    }
}

// ============================================
// AuthConfig
// ============================================

/// Authentication configuration section.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens.
    #[serde(default)]
    pub token_secret: String,

    /// Bearer token lifetime in seconds.
    #[serde(default = "default_token_duration")]
    pub token_duration_secs: u64,

    /// CA certificate used to sign node certificates.
    #[serde(default = "default_ca_cert_path")]
    pub ca_cert_path: PathBuf,

    /// CA private key.
    #[serde(default = "default_ca_key_path")]
    pub ca_key_path: PathBuf,

    /// Revoke the superseded token on a successful rotation.
    #[serde(default)]
    pub revoke_on_rotate: bool,
}

fn default_token_duration() -> u64 {
    luminous_core::crypto::DEFAULT_TOKEN_LIFETIME_SECS
}

fn default_ca_cert_path() -> PathBuf {
    PathBuf::from("/etc/luminous-mesh/certs/ca.crt")
}

fn default_ca_key_path() -> PathBuf {
    PathBuf::from("/etc/luminous-mesh/certs/ca.key")
}

impl AuthConfig {
    fn validate(&self) -> Result<()> {
        if self.token_secret.is_empty() {
            return Err(ServerError::config_invalid("auth.token_secret", "is required"));
        }
        if self.token_duration_secs == 0 {
            return Err(ServerError::config_invalid(
                "auth.token_duration_secs",
                "must be greater than 0",
            ));
        }
        require_path("auth.ca_cert_path", &self.ca_cert_path)?;
        require_path("auth.ca_key_path", &self.ca_key_path)?;
        Ok(())
    }

    /// Returns the token lifetime.
    #[must_use]
    pub const fn token_duration(&self) -> Duration {
        Duration::from_secs(self.token_duration_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_duration_secs: default_token_duration(),
            ca_cert_path: default_ca_cert_path(),
            ca_key_path: default_ca_key_path(),
            revoke_on_rotate: false,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"<redacted>")
            .field("token_duration_secs", &self.token_duration_secs)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("ca_key_path", &self.ca_key_path)
            .field("revoke_on_rotate", &self.revoke_on_rotate)
            .finish()
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Inactivity after which a session is expired.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Outbound command queue capacity per stream.
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,

    /// How long `send_command` waits on a full queue.
    #[serde(default = "default_command_send_timeout")]
    pub command_send_timeout_ms: u64,

    /// Housekeeping interval.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

fn default_command_queue_capacity() -> usize {
    100
}

fn default_command_send_timeout() -> u64 {
    5000
}

fn default_cleanup_interval() -> u64 {
    60
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        let checks = [
            ("limits.session_ttl_secs", self.session_ttl_secs == 0),
            ("limits.command_queue_capacity", self.command_queue_capacity == 0),
            ("limits.command_send_timeout_ms", self.command_send_timeout_ms == 0),
            ("limits.cleanup_interval_secs", self.cleanup_interval_secs == 0),
        ];
        for (field, is_zero) in checks {
            if is_zero {
                return Err(ServerError::config_invalid(field, "must be greater than 0"));
            }
        }
        Ok(())
    }

    /// Returns the session TTL.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Returns the command send timeout.
    #[must_use]
    pub const fn command_send_timeout(&self) -> Duration {
        Duration::from_millis(self.command_send_timeout_ms)
    }

    /// Returns the housekeeping interval.
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            command_queue_capacity: default_command_queue_capacity(),
            command_send_timeout_ms: default_command_send_timeout(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

// ============================================
// PluginsConfig
// ============================================

/// Plugin configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Names of the plugins to load.
    #[serde(default)]
    pub load: Vec<String>,
}

impl PluginsConfig {
    fn validate(&self) -> Result<()> {
        if self.load.is_empty() {
            return Err(ServerError::config_invalid("plugins.load", "no plugins to load"));
        }

        let known = PluginRegistry::with_builtins();
        if let Some(unknown) = self.load.iter().find(|name| !known.contains(name)) {
            return Err(ServerError::config_invalid(
                "plugins.load",
                format!("unknown plugin '{unknown}'"),
            ));
        }

        for role in [API_GATEWAY, DATA_STORE] {
            if !self.load.iter().any(|name| name == role) {
                return Err(ServerError::config_invalid(
                    "plugins.load",
                    format!("'{role}' is required"),
                ));
            }
        }
        Ok(())
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file, written in addition to stdout.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

// ============================================
// MetricsConfig
// ============================================

/// Metrics exporter configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address of the Prometheus scrape endpoint; disabled when unset.
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [tls]
        ca_cert = "/etc/luminous-mesh/certs/ca.crt"

        [auth]
        token_secret = "s3cret"

        [plugins]
        load = ["api-gateway", "data-store"]
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ServerConfig::from_str(MINIMAL).unwrap();
        assert_eq!(config.listen_addr.port(), 50051);
        assert_eq!(config.api_endpoint, "localhost:50051");
        assert_eq!(config.connection_params["keepalive_time"], "30s");
        assert_eq!(config.auth.token_duration(), Duration::from_secs(86400));
        assert!(!config.auth.revoke_on_rotate);
        assert_eq!(config.limits.command_queue_capacity, 100);
        assert_eq!(config.limits.command_send_timeout(), Duration::from_secs(5));
        assert_eq!(config.limits.session_ttl(), Duration::from_secs(86400));
        assert_eq!(config.logging.level, "info");
        assert!(config.metrics.listen_addr.is_none());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = ServerConfig::load(&path).await.unwrap();
        assert_eq!(config.auth.token_secret, "s3cret");

        let err = ServerConfig::load(dir.path().join("missing.toml"))
            .await
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            listen_addr = "127.0.0.1:6000"
            api_endpoint = "cp.example.net:6000"

            [connection_params]
            max_reconnect_delay = "10s"
            keepalive_time = "5s"
            region = "eu-west"

            [tls]
            cert_file = "/srv/tls/server.crt"
            key_file = "/srv/tls/server.key"
            ca_cert = "/srv/tls/ca.crt"

            [auth]
            token_secret = "s3cret"
            token_duration_secs = 3600
            ca_cert_path = "/srv/ca/ca.crt"
            ca_key_path = "/srv/ca/ca.key"
            revoke_on_rotate = true

            [limits]
            session_ttl_secs = 600
            command_queue_capacity = 16
            command_send_timeout_ms = 250
            cleanup_interval_secs = 10

            [plugins]
            load = ["api-gateway", "data-store"]

            [logging]
            level = "debug"
            file = "/var/log/luminous-mesh/app.log"

            [metrics]
            listen_addr = "127.0.0.1:9100"
        "#;

        let config = ServerConfig::from_str(toml).unwrap();
        assert_eq!(config.listen_addr.port(), 6000);
        assert_eq!(config.connection_params.len(), 3);
        assert!(config.auth.revoke_on_rotate);
        assert_eq!(config.limits.command_queue_capacity, 16);
        assert_eq!(
            config.logging.file.as_deref(),
            Some(Path::new("/var/log/luminous-mesh/app.log"))
        );
        assert_eq!(config.metrics.listen_addr.unwrap().port(), 9100);
    }

    #[test]
    fn test_missing_secret_rejected() {
        let toml = r#"
            [tls]
            ca_cert = "/ca.crt"
            [plugins]
            load = ["api-gateway", "data-store"]
        "#;
        let err = ServerConfig::from_str(toml).unwrap_err();
        assert!(matches!(err, ServerError::ConfigInvalid { ref field, .. } if field == "auth.token_secret"));
    }

    #[test]
    fn test_missing_connection_param_rejected() {
        let toml = format!(
            "{MINIMAL}\n[connection_params]\nkeepalive_time = \"30s\"\n"
        );
        // [connection_params] after other tables is still the top-level key
        let err = ServerConfig::from_str(&toml).unwrap_err();
        assert!(err.to_string().contains("max_reconnect_delay"));
    }

    #[test]
    fn test_plugin_rules() {
        let only_gateway = MINIMAL.replace(r#"["api-gateway", "data-store"]"#, r#"["api-gateway"]"#);
        let err = ServerConfig::from_str(&only_gateway).unwrap_err();
        assert!(err.to_string().contains("data-store"));

        let unknown = MINIMAL.replace(
            r#"["api-gateway", "data-store"]"#,
            r#"["api-gateway", "data-store", "teleporter"]"#,
        );
        let err = ServerConfig::from_str(&unknown).unwrap_err();
        assert!(err.to_string().contains("teleporter"));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let toml = format!("{MINIMAL}\n[limits]\ncommand_queue_capacity = 0\n");
        let err = ServerConfig::from_str(&toml).unwrap_err();
        assert!(err.to_string().contains("limits.command_queue_capacity"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ServerConfig::from_str(MINIMAL).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
    }
}
