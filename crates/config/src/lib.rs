use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use dao_common::logging::is_valid_level;
use dao_common::Address;
use dao_governance::config::DEFAULT_MAX_DESCRIPTION_LEN;
use dao_governance::{FinalizePolicy, GovernanceConfig, DEFAULT_VOTING_DURATION_SECS};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "NATION_DAO_";

/// Errors that can occur in configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),

    #[error("Failed to write file: {0}")]
    FileWriteError(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Deployment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub credential_registry: Address,
    pub administrator: Address,
    #[serde(default = "default_voting_duration")]
    pub default_voting_duration: u64,
    #[serde(default)]
    pub max_voting_duration: Option<u64>,
    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,
    #[serde(default)]
    pub finalize_policy: FinalizePolicy,
    #[serde(default)]
    pub administrator_may_propose: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_voting_duration() -> u64 {
    DEFAULT_VOTING_DURATION_SECS
}

fn default_max_description_len() -> usize {
    DEFAULT_MAX_DESCRIPTION_LEN
}

fn default_log_level() -> String {
    "info".to_string()
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

impl DeploymentConfig {
    /// Create a configuration with default settings for the given addresses
    pub fn new(credential_registry: Address, administrator: Address) -> Self {
        Self {
            credential_registry,
            administrator,
            default_voting_duration: default_voting_duration(),
            max_voting_duration: None,
            max_description_len: default_max_description_len(),
            finalize_policy: FinalizePolicy::default(),
            administrator_may_propose: false,
            log_level: default_log_level(),
            log_dir: None,
        }
    }

    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::FileReadError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: DeploymentConfig = serde_yaml::from_str(&contents)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write configuration to file as YAML
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents).map_err(|e| {
            ConfigError::FileWriteError(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Load from file, then apply environment overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `NATION_DAO_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Apply overrides from a lookup keyed by the unprefixed variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| format!("{}{}", ENV_PREFIX, key);

        if let Some(value) = lookup("ADMINISTRATOR") {
            self.administrator = parse_env(&var("ADMINISTRATOR"), &value)?;
        }
        if let Some(value) = lookup("CREDENTIAL_REGISTRY") {
            self.credential_registry = parse_env(&var("CREDENTIAL_REGISTRY"), &value)?;
        }
        if let Some(value) = lookup("DEFAULT_VOTING_DURATION") {
            self.default_voting_duration = parse_env(&var("DEFAULT_VOTING_DURATION"), &value)?;
        }
        if let Some(value) = lookup("MAX_DESCRIPTION_LEN") {
            self.max_description_len = parse_env(&var("MAX_DESCRIPTION_LEN"), &value)?;
        }
        if let Some(value) = lookup("FINALIZE_POLICY") {
            self.finalize_policy = parse_env(&var("FINALIZE_POLICY"), &value)?;
        }
        if let Some(value) = lookup("LOG_LEVEL") {
            self.log_level = value.trim().to_string();
        }
        if let Some(value) = lookup("LOG_DIR") {
            let value = value.trim();
            self.log_dir = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_valid_level(&self.log_level) {
            return Err(ConfigError::Invalid(format!(
                "Unknown log level: {}",
                self.log_level
            )));
        }

        self.to_governance_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Governance settings for the engine
    pub fn to_governance_config(&self) -> GovernanceConfig {
        let mut config = GovernanceConfig::new(
            self.credential_registry,
            self.administrator,
            self.default_voting_duration,
        )
        .with_max_description_len(self.max_description_len)
        .with_finalize_policy(self.finalize_policy)
        .with_administrator_may_propose(self.administrator_may_propose);

        if let Some(max) = self.max_voting_duration {
            config = config.with_max_voting_duration(max);
        }
        config
    }
}
