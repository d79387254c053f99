//! Configuration file handling for swim-cli

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use swim_client::ControllerConfig;

/// Configuration for the CLI tool
///
/// ```toml
/// output = "text"
///
/// [controller.connection]
/// host = "10.10.20.85"
/// username = "admin"
/// password = "secret"
///
/// [controller.polling]
/// task_timeout_secs = 3600
/// retry_interval_secs = 60
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Controller connection, TLS, and polling settings
    pub controller: Option<ControllerConfig>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

/// Controller settings given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ControllerOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure: bool,
    pub timeout_secs: Option<u64>,
    pub retry_interval_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("swim-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over the `[controller]` table
    pub fn controller_config(&self, args: &ControllerOverrides) -> Result<ControllerConfig> {
        let mut config = match (&self.controller, &args.host) {
            (_, Some(host)) => {
                let mut config = self
                    .controller
                    .clone()
                    .unwrap_or_else(|| ControllerConfig::builder(host.as_str()).build());
                config.connection.host = host.clone();
                config
            }
            (Some(config), None) => config.clone(),
            (None, None) => anyhow::bail!(
                "No controller configured: pass --controller or set [controller.connection] in the config file"
            ),
        };

        if let Some(port) = args.port {
            config.connection.port = port;
        }
        if let Some(username) = &args.username {
            config.connection.username = username.clone();
        }
        if let Some(password) = &args.password {
            config.connection.password = password.clone();
        }
        if args.insecure {
            config.tls.accept_invalid_certs = true;
        }
        if let Some(secs) = args.timeout_secs {
            config.polling.task_timeout_secs = secs;
        }
        if let Some(secs) = args.retry_interval_secs {
            config.polling.retry_interval_secs = secs;
        }

        Ok(config)
    }

    pub fn no_color(&self, flag: bool) -> bool {
        flag || self.no_color.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
output = "json"

[controller.connection]
host = "10.10.20.85"
username = "admin"
password = "from-file"

[controller.polling]
retry_interval_secs = 30
"#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load_from(&file.path().to_path_buf()).unwrap();
        let controller = config.controller.as_ref().unwrap();
        assert_eq!(controller.connection.host, "10.10.20.85");
        assert_eq!(controller.connection.port, 443);
        assert_eq!(controller.polling.retry_interval_secs, 30);
        assert_eq!(controller.polling.task_timeout_secs, 3600);
        assert!(!controller.tls.accept_invalid_certs);
        assert_eq!(config.output.as_deref(), Some("json"));
    }

    #[test]
    fn test_args_override_file() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let overrides = ControllerOverrides {
            password: Some("from-env".into()),
            insecure: true,
            timeout_secs: Some(600),
            ..Default::default()
        };

        let controller = config.controller_config(&overrides).unwrap();
        assert_eq!(controller.connection.host, "10.10.20.85");
        assert_eq!(controller.connection.username, "admin");
        assert_eq!(controller.connection.password, "from-env");
        assert!(controller.tls.accept_invalid_certs);
        assert_eq!(controller.polling.task_timeout_secs, 600);
        assert_eq!(controller.polling.retry_interval_secs, 30);
    }

    #[test]
    fn test_host_from_args_only() {
        let overrides = ControllerOverrides {
            host: Some("catc.example.com".into()),
            username: Some("admin".into()),
            ..Default::default()
        };

        let controller = Config::default().controller_config(&overrides).unwrap();
        assert_eq!(controller.base_url(), "https://catc.example.com:443");
        assert_eq!(controller.polling.retry_interval_secs, 60);
    }

    #[test]
    fn test_missing_controller() {
        let err = Config::default()
            .controller_config(&ControllerOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("No controller configured"));
    }
}
