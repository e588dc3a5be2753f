//! Configuration Storage
//!
//! This module handles persistent storage of configuration data: log level,
//! translator settings, disabled engines and the configured providers.

use crate::error::{ForgeError, Result};
use crate::provider::{EngineKind, ProviderDescriptor};
use crate::schema::IdentifierMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Directory under the platform config dir
const CONFIG_DIR: &str = "dbforge";

/// Translator settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub identifier_mode: IdentifierMode,
}

/// Runtime engine switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    pub disabled: Vec<EngineKind>,
}

/// Persistent configuration data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Default tracing filter when `DBFORGE_LOG` is not set
    pub log_level: String,
    /// Directory for new server-hosted database files
    pub data_directory: Option<PathBuf>,
    pub translator: TranslatorConfig,
    pub engines: EnginesConfig,
    pub providers: Vec<ProviderDescriptor>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_directory: None,
            translator: TranslatorConfig::default(),
            engines: EnginesConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl ForgeConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ForgeError::Config("Could not find configuration directory".into()))?
            .join(CONFIG_DIR);

        fs::create_dir_all(&config_dir)
            .map_err(|e| ForgeError::Config(format!("Failed to create config directory: {}", e)))?;

        Ok(config_dir)
    }

    /// Get the configuration file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    /// Load configuration from a file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ForgeError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ForgeConfig = toml::from_str(content)
            .map_err(|e| ForgeError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ForgeError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| ForgeError::Config(format!("Failed to write {}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Every configured provider must carry an engine and a mechanism
    pub fn validate(&self) -> Result<()> {
        for provider in &self.providers {
            provider.identity()?;
        }
        Ok(())
    }

    /// Whether the configuration disables an engine
    pub fn is_disabled(&self, engine: EngineKind) -> bool {
        self.engines.disabled.contains(&engine)
    }
}
