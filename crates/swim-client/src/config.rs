//! Controller client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::poller::PollPolicy;

/// Controller client configuration
///
/// Deserialized from the `[controller]` table of the CLI config file, or
/// constructed programmatically through [`ControllerConfig::builder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Connection settings
    pub connection: ConnectionConfig,

    /// TLS settings
    #[serde(default)]
    pub tls: TlsConfig,

    /// Per-request timeouts
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Default task polling cadence
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Controller host name or address
    pub host: String,

    /// Controller HTTPS port (default: 443)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for token issuance
    #[serde(default)]
    pub username: String,

    /// Password for token issuance
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    443
}

/// TLS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Skip certificate verification (default: false)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// General request timeout in milliseconds (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            connect_ms: default_connect_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

/// Task polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Give up on a task after this many seconds (default: 1 hour)
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Seconds to wait between status checks (default: 60)
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: default_task_timeout(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

fn default_task_timeout() -> u64 {
    3600
}

fn default_retry_interval() -> u64 {
    60
}

impl PollingConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.task_timeout_secs),
            Duration::from_secs(self.retry_interval_secs),
        )
    }
}

impl ControllerConfig {
    /// Create a builder for programmatic configuration
    pub fn builder(host: impl Into<String>) -> ControllerConfigBuilder {
        ControllerConfigBuilder::new(host)
    }

    /// Base URL of the controller.
    ///
    /// A host that already carries a scheme (`http://127.0.0.1:8080`) is used
    /// as-is; otherwise `https://{host}:{port}` is assumed.
    pub fn base_url(&self) -> String {
        let host = self.connection.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}:{}", host, self.connection.port)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.request_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.connect_ms)
    }
}

/// Builder for ControllerConfig
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    /// Create a new builder for the given controller host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: ControllerConfig {
                connection: ConnectionConfig {
                    host: host.into(),
                    port: default_port(),
                    username: String::new(),
                    password: String::new(),
                },
                tls: TlsConfig::default(),
                timeouts: TimeoutsConfig::default(),
                polling: PollingConfig::default(),
            },
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.connection.port = port;
        self
    }

    /// Set the credentials used for token issuance
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.connection.username = username.into();
        self.config.connection.password = password.into();
        self
    }

    /// Disable TLS certificate verification
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.tls.accept_invalid_certs = accept;
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.connect_ms = ms;
        self
    }

    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.config.polling.task_timeout_secs = secs;
        self
    }

    pub fn retry_interval_secs(mut self, secs: u64) -> Self {
        self.config.polling.retry_interval_secs = secs;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ControllerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let json = r#"{
            "connection": { "host": "10.1.1.10", "username": "admin", "password": "secret123" },
            "tls": { "accept_invalid_certs": true },
            "polling": { "task_timeout_secs": 1800 }
        }"#;

        let config: ControllerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.connection.host, "10.1.1.10");
        assert_eq!(config.connection.port, 443);
        assert_eq!(config.connection.username, "admin");
        assert!(config.tls.accept_invalid_certs);
        assert_eq!(config.polling.task_timeout_secs, 1800);
        assert_eq!(config.polling.retry_interval_secs, 60);
        assert_eq!(config.timeouts.request_ms, 30_000);
    }

    #[test]
    fn test_tls_verification_on_by_default() {
        let json = r#"{ "connection": { "host": "catc.example.com" } }"#;
        let config: ControllerConfig = serde_json::from_str(json).unwrap();
        assert!(!config.tls.accept_invalid_certs);

        let built = ControllerConfig::builder("catc.example.com").build();
        assert!(!built.tls.accept_invalid_certs);
    }

    #[test]
    fn test_builder() {
        let config = ControllerConfig::builder("catc.example.com")
            .port(8443)
            .credentials("admin", "pw")
            .request_timeout_ms(5_000)
            .task_timeout_secs(120)
            .retry_interval_secs(5)
            .build();

        assert_eq!(config.base_url(), "https://catc.example.com:8443");
        assert_eq!(config.connection.password, "pw");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));

        let policy = config.polling.policy();
        assert_eq!(policy.timeout, Duration::from_secs(120));
        assert_eq!(policy.retry_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_base_url_with_scheme() {
        let config = ControllerConfig::builder("http://127.0.0.1:9000/").build();
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }
}
