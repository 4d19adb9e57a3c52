use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::storage::StorageConfig;

pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localstack:4566";
pub const DEFAULT_CLIENT_HOST: &str = "localhost:4566";

/// Process variable read by older deployments to pick the environment.
const LEGACY_ENVIRONMENT_VAR: &str = "Environment";

/// Deployment environment the adapter runs in.
///
/// Only `"local"` changes behaviour: the emulator endpoint is used and
/// generated URLs are rewritten for a browser on the host machine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Environment(String);

impl Environment {
    pub const LOCAL: &'static str = "local";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn local() -> Self {
        Self::new(Self::LOCAL)
    }

    pub fn is_local(&self) -> bool {
        self.0 == Self::LOCAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new("dev")
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from `CFM_CONFIG` (default `config.toml`) and environment.
    pub fn load() -> Result<Self> {
        let config_path = env::var("CFM_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(config_path)
    }

    /// Load configuration from the given file (if present), overridden by `CFM__*` variables.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut builder = config::Config::builder();

        if let Ok(legacy) = env::var(LEGACY_ENVIRONMENT_VAR) {
            builder = builder.set_default("environment", legacy)?;
        }

        if path.exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CFM")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let client_host = self.storage.client_host.trim();
        if client_host.is_empty() {
            bail!("storage.client_host must be specified");
        }
        if client_host.contains('/') {
            bail!(
                "storage.client_host must be a bare host[:port], got '{}'",
                client_host
            );
        }
        if self.storage.local_endpoint.trim().is_empty() {
            bail!("storage.local_endpoint must be specified");
        }
        Ok(())
    }

    /// Resolve the runtime storage configuration for the selected backend.
    pub fn storage_runtime(&self) -> Result<StorageConfig> {
        self.validate()?;
        Ok(self.storage.to_runtime(&self.environment))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackendKind,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub local_endpoint: String,
    pub client_host: String,
    pub url_expires_secs: u64,
}

impl StorageSection {
    pub fn to_runtime(&self, environment: &Environment) -> StorageConfig {
        match self.backend {
            StorageBackendKind::S3 => StorageConfig::S3 {
                environment: environment.clone(),
                region: non_empty(self.region.as_deref()),
                endpoint: non_empty(self.endpoint.as_deref()),
                local_endpoint: self.local_endpoint.trim().to_string(),
            },
            StorageBackendKind::Memory => StorageConfig::Memory {
                base_url: self.local_endpoint.trim().to_string(),
            },
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::S3,
            region: None,
            endpoint: None,
            local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            client_host: DEFAULT_CLIENT_HOST.to_string(),
            url_expires_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
