use super::types::*;
use crate::billing::RATE_PER_HOUR;
use crate::error_handling::types::ConfigError;
use crate::session_management::DEFAULT_STORAGE_KEY;
use log::{debug, info};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

/// Application configuration structure that defines all runtime parameters.
///
/// Values come from a TOML file (every field optional) and can then be
/// overridden from the command line through [`ConfigArgs`].
///
/// # Examples
///
/// ```toml
/// storage_backend = "file"
/// storage_path = "/var/lib/parkwatch"
/// storage_key = "veiculos"
/// rate_per_hour = 10.0
/// bind_address = "127.0.0.1"
/// web_ui_port = 8080
/// ```
///
/// # Fields Overview
///
/// - `storage_backend`: `file` or `memory`
/// - `storage_path`: directory for the file backend; when unset the
///   `PARKWATCH_STORAGE_DIR` variable, then the working directory, is used
/// - `storage_key`: key the session array is stored under
/// - `rate_per_hour`: hourly price used for receipts
/// - `bind_address` / `web_ui_port`: where the web interface listens
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub storage_path: Option<PathBuf>,
    pub storage_key: String,
    pub rate_per_hour: f64,
    pub bind_address: IpAddr,
    pub web_ui_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::File,
            storage_path: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            rate_per_hour: RATE_PER_HOUR,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            web_ui_port: 8080,
        }
    }
}

/// Command-line overrides for [`Config`], flattened into the binary's arguments.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(long, env = "PARKWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage backend
    #[arg(long, value_enum)]
    pub storage_backend: Option<StorageBackend>,

    /// Directory holding the stored sessions
    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Key the session list is stored under
    #[arg(long)]
    pub storage_key: Option<String>,

    /// Hourly rate
    #[arg(long)]
    pub rate: Option<f64>,

    /// Address the web interface binds to
    #[arg(long)]
    pub bind_address: Option<IpAddr>,

    /// Port of the web interface
    #[arg(long)]
    pub port: Option<u16>,
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the effective configuration: file (if any), then command-line
    /// overrides. Validation runs once, on the merged result.
    pub fn load(args: &ConfigArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::read_file(path)?,
            None => {
                debug!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply(args);
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse_toml(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    fn apply(&mut self, args: &ConfigArgs) {
        if let Some(backend) = args.storage_backend {
            self.storage_backend = backend;
        }
        if let Some(path) = &args.storage_path {
            self.storage_path = Some(path.clone());
        }
        if let Some(key) = &args.storage_key {
            self.storage_key = key.clone();
        }
        if let Some(rate) = args.rate {
            self.rate_per_hour = rate;
        }
        if let Some(addr) = args.bind_address {
            self.bind_address = addr;
        }
        if let Some(port) = args.port {
            self.web_ui_port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rate_per_hour.is_finite() || self.rate_per_hour < 0.0 {
            return Err(ConfigError::InvalidRate(self.rate_per_hour.to_string()));
        }
        let key_ok = !self.storage_key.is_empty()
            && self
                .storage_key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !key_ok {
            return Err(ConfigError::InvalidStorageKey(self.storage_key.clone()));
        }
        if let Some(path) = &self.storage_path {
            if path.exists() && !path.is_dir() {
                return Err(ConfigError::DirectoryDoesNotExist(format!(
                    "{} is not a directory",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}
