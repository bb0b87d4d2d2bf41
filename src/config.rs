//! Configuration module for Netcommit
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/netcommit/netcommit.toml)
//! - User configuration (~/.netcommit.toml)
//! - Project configuration (./netcommit.toml)
//! - Environment variables
//!
//! Command-line flags are applied on top by the binary.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default prefix of every session name this tool creates.
pub const DEFAULT_SESSION_PREFIX: &str = "netcommit_";

/// Default flash location of the rollback snapshot.
pub const DEFAULT_SNAPSHOT_SLOT: &str = "flash:rollback-0";

/// Default flash location of the pending replace candidate.
pub const DEFAULT_CANDIDATE_FILE: &str = "flash:netcommit-candidate.cfg";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Device connection settings
    pub device: DeviceConfig,

    /// Session and snapshot naming
    pub session: SessionConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Device connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device hostname or address
    pub host: Option<String>,

    /// eAPI port (defaults to 443 or 80 depending on `use_ssl`)
    pub port: Option<u16>,

    /// Use HTTPS
    pub use_ssl: bool,

    /// Validate the device certificate
    pub validate_certs: bool,

    /// Username
    pub username: Option<String>,

    /// Password
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Enable password
    #[serde(skip_serializing)]
    pub enable_password: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            use_ssl: true,
            validate_certs: true,
            username: None,
            password: None,
            enable_password: None,
            timeout: 30,
        }
    }
}

/// Session and snapshot naming
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Prefix of every session name created by this tool
    pub prefix: String,

    /// Flash location holding the rollback snapshot
    pub snapshot_slot: String,

    /// Flash location holding the pending replace candidate
    pub candidate_file: String,

    /// Abort leftover sessions with our prefix when the driver opens
    pub cleanup_on_open: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_SESSION_PREFIX.to_string(),
            snapshot_slot: DEFAULT_SNAPSHOT_SLOT.to_string(),
            candidate_file: DEFAULT_CANDIDATE_FILE.to_string(),
            cleanup_on_open: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Log format (pretty, compact, json)
    pub format: String,

    /// Include the event target
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            with_target: false,
        }
    }
}

// ============================================================================
// File layers
// ============================================================================

/// One configuration file as written: only the keys it sets are `Some`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    device: DeviceLayer,
    session: SessionLayer,
    logging: LoggingLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeviceLayer {
    host: Option<String>,
    port: Option<u16>,
    use_ssl: Option<bool>,
    validate_certs: Option<bool>,
    username: Option<String>,
    password: Option<String>,
    enable_password: Option<String>,
    timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionLayer {
    prefix: Option<String>,
    snapshot_slot: Option<String>,
    candidate_file: Option<String>,
    cleanup_on_open: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingLayer {
    level: Option<String>,
    format: Option<String>,
    with_target: Option<bool>,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            } else if config_path == Some(&path) {
                return Err(Error::FileNotFound(path));
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Explicit path takes priority
        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        paths.push(PathBuf::from("/etc/netcommit/netcommit.toml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".netcommit.toml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("netcommit/config.toml"));
        }

        paths.push(PathBuf::from("netcommit.toml"));

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let layer: ConfigLayer = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };

        let mut merged = self.clone();
        merged.merge(layer);
        Ok(merged)
    }

    /// Apply every value present in `layer`; absent keys keep the current
    /// value, so a later file can also set a field back to its default.
    fn merge(&mut self, layer: ConfigLayer) {
        let ConfigLayer {
            device,
            session,
            logging,
        } = layer;

        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        if device.host.is_some() {
            self.device.host = device.host;
        }
        if device.port.is_some() {
            self.device.port = device.port;
        }
        set(&mut self.device.use_ssl, device.use_ssl);
        set(&mut self.device.validate_certs, device.validate_certs);
        if device.username.is_some() {
            self.device.username = device.username;
        }
        if device.password.is_some() {
            self.device.password = device.password;
        }
        if device.enable_password.is_some() {
            self.device.enable_password = device.enable_password;
        }
        set(&mut self.device.timeout, device.timeout);

        set(&mut self.session.prefix, session.prefix);
        set(&mut self.session.snapshot_slot, session.snapshot_slot);
        set(&mut self.session.candidate_file, session.candidate_file);
        set(&mut self.session.cleanup_on_open, session.cleanup_on_open);

        set(&mut self.logging.level, logging.level);
        set(&mut self.logging.format, logging.format);
        set(&mut self.logging.with_target, logging.with_target);
    }

    /// Apply `NETCOMMIT_*` environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("NETCOMMIT_HOST") {
            self.device.host = Some(host);
        }
        if let Ok(port) = std::env::var("NETCOMMIT_PORT") {
            let port = port.parse().map_err(|_| Error::InvalidConfig {
                key: "NETCOMMIT_PORT".to_string(),
                message: format!("'{}' is not a valid port", port),
            })?;
            self.device.port = Some(port);
        }
        if let Ok(username) = std::env::var("NETCOMMIT_USERNAME") {
            self.device.username = Some(username);
        }
        if let Ok(password) = std::env::var("NETCOMMIT_PASSWORD") {
            self.device.password = Some(password);
        }
        if let Ok(prefix) = std::env::var("NETCOMMIT_SESSION_PREFIX") {
            self.session.prefix = prefix;
        }
        if let Ok(level) = std::env::var("NETCOMMIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Reject values the device would refuse later.
    pub fn validate(&self) -> Result<()> {
        if self.session.prefix.is_empty()
            || !self
                .session
                .prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidConfig {
                key: "session.prefix".to_string(),
                message: format!(
                    "'{}' must be non-empty and contain only alphanumeric characters, underscores, and hyphens",
                    self.session.prefix
                ),
            });
        }

        for (key, value) in [
            ("session.snapshot_slot", &self.session.snapshot_slot),
            ("session.candidate_file", &self.session.candidate_file),
        ] {
            if value.is_empty() || value.contains(char::is_whitespace) {
                return Err(Error::InvalidConfig {
                    key: key.to_string(),
                    message: format!("'{}' is not a device file location", value),
                });
            }
        }

        if self.session.snapshot_slot == self.session.candidate_file {
            return Err(Error::InvalidConfig {
                key: "session.candidate_file".to_string(),
                message: "must differ from session.snapshot_slot".to_string(),
            });
        }

        Ok(())
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::default().merge_from_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}
