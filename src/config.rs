//! Configuration management with validation and defaults
//!
//! One `WalletConfig` is built at startup (defaults, then an optional TOML
//! file, then `GROOVE_*` environment overrides) and handed to the
//! constructors that need it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::currency;
use crate::errors::{ConfigurationError, WalletResult};
use crate::protocol::request::SignaturePolicy;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
}

/// HTTP listener configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Bets accepted in one wagerbybatch call
    pub max_batch_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            max_batch_size: 500,
        }
    }
}

/// Provider integration settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub signature_secret: String,
    pub signature_validation: bool,
    /// Echoed when a request carries no apiversion
    pub api_version: String,
    /// Whether the `request` parameter is part of the signed payload, per operation
    pub include_request_key: BTreeMap<String, bool>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            signature_secret: String::new(),
            signature_validation: true,
            api_version: "1.2".to_string(),
            include_request_key: SignaturePolicy::default_table(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Currency given to accounts created on first contact
    pub default_currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_currency: "USD".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    RocksDb,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "rocksdb" | "rocks" => Ok(StorageBackend::RocksDb),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    /// Whether to clear database on startup (testing only!)
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_directory: "./DB/wallet_data".to_string(),
            clear_on_start: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    /// Used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            log_filter: "groove_wallet=info,tower_http=info".to_string(),
        }
    }
}

impl WalletConfig {
    /// In-memory store and a fixed development secret
    pub fn development() -> Self {
        Self {
            provider: ProviderConfig {
                signature_secret: "development-secret".to_string(),
                ..Default::default()
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                clear_on_start: true,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_filter: "groove_wallet=debug,tower_http=debug".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Persistent RocksDB store; the secret must come from the file or environment
    pub fn production() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::RocksDb,
                data_directory: "./DB/wallet_data".to_string(),
                clear_on_start: false, // Production: preserve ledger data
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue("server.port must be > 0".to_string()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "server.request_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.server.max_batch_size == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "server.max_batch_size must be > 0".to_string(),
            ));
        }

        if self.provider.signature_validation && self.provider.signature_secret.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "provider.signature_secret is required when signature_validation is enabled".to_string(),
            ));
        }
        if self.provider.api_version.is_empty() {
            return Err(ConfigValidationError::MissingRequired("provider.api_version".to_string()));
        }
        SignaturePolicy::from_table(&self.provider.include_request_key)
            .map_err(ConfigValidationError::LogicalInconsistency)?;

        if currency::minor_units(&self.ledger.default_currency).is_none() {
            return Err(ConfigValidationError::InvalidValue(format!(
                "ledger.default_currency '{}' is not a known currency",
                self.ledger.default_currency
            )));
        }

        if self.storage.backend == StorageBackend::RocksDb && self.storage.data_directory.is_empty() {
            return Err(ConfigValidationError::MissingRequired("storage.data_directory".to_string()));
        }

        Ok(())
    }

    pub fn signature_policy(&self) -> Result<SignaturePolicy, ConfigValidationError> {
        SignaturePolicy::from_table(&self.provider.include_request_key)
            .map_err(ConfigValidationError::LogicalInconsistency)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    InvalidValue(String),
    LogicalInconsistency(String),
    MissingRequired(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigValidationError::LogicalInconsistency(msg) => {
                write!(f, "Configuration logical inconsistency: {}", msg)
            }
            ConfigValidationError::MissingRequired(msg) => write!(f, "Missing required configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

impl From<ConfigValidationError> for ConfigurationError {
    fn from(err: ConfigValidationError) -> Self {
        ConfigurationError::ValidationFailed(err.to_string())
    }
}

/// Loads `WalletConfig` from TOML plus `GROOVE_*` environment variables
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
    base: Option<WalletConfig>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Start from a preset instead of the defaults when no file is given
    pub fn with_base(mut self, config: WalletConfig) -> Self {
        self.base = Some(config);
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> WalletResult<WalletConfig> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as `load` with an explicit variable lookup
    pub fn load_with<F>(&self, lookup: F) -> WalletResult<WalletConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => self.base.clone().unwrap_or_default(),
        };

        Self::apply_overrides(&mut config, lookup)?;
        config.validate().map_err(ConfigurationError::from)?;
        Ok(config)
    }

    fn load_from_file(path: &str) -> WalletResult<WalletConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_overrides<F>(config: &mut WalletConfig, lookup: F) -> WalletResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GROOVE_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("GROOVE_PORT") {
            config.server.port = parse_override("GROOVE_PORT", port, "Invalid port number")?;
        }
        if let Some(secret) = lookup("GROOVE_SIGNATURE_SECRET") {
            config.provider.signature_secret = secret;
        }
        if let Some(enabled) = lookup("GROOVE_SIGNATURE_VALIDATION") {
            config.provider.signature_validation =
                parse_override("GROOVE_SIGNATURE_VALIDATION", enabled, "Invalid boolean value")?;
        }
        if let Some(version) = lookup("GROOVE_API_VERSION") {
            config.provider.api_version = version;
        }
        if let Some(data_dir) = lookup("GROOVE_DATA_DIR") {
            config.storage.data_directory = data_dir;
        }
        if let Some(backend) = lookup("GROOVE_STORAGE_BACKEND") {
            config.storage.backend = parse_override("GROOVE_STORAGE_BACKEND", backend, "Expected memory or rocksdb")?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(config: &WalletConfig, path: &str) -> WalletResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn parse_override<T: std::str::FromStr>(field: &str, value: String, reason: &str) -> WalletResult<T> {
    value.parse().map_err(|_| {
        ConfigurationError::InvalidValue {
            field: field.to_string(),
            value,
            reason: reason.to_string(),
        }
        .into()
    })
}
