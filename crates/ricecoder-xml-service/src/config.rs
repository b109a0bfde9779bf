//! Engine configuration
//!
//! Loaded from an optional TOML file overlaid with `RICECODER_XML_*`
//! environment variables.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use ricecoder_xml::{OptimizationLevel, DEFAULT_MAX_ITERATIONS};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Default environment variable prefix
pub const ENV_PREFIX: &str = "RICECODER_XML";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Optimization iteration budget when a request does not give one
    pub max_iterations: usize,
    /// Validate in strict mode when a request does not say
    pub strict_validation: bool,
    /// Indentation width of generated documents
    pub indent: usize,
    /// Level assigned to templates created without one
    pub default_level: OptimizationLevel,
    /// Analytics window when a query does not give one
    pub analytics_window_days: i64,
    /// Number of templates reported as top templates
    pub top_templates: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            strict_validation: true,
            indent: ricecoder_xml::generator::DEFAULT_INDENT,
            default_level: OptimizationLevel::Standard,
            analytics_window_days: 30,
            top_templates: 5,
        }
    }
}

/// Loads, validates and saves [`EngineConfig`]
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a manager for the default configuration file
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Create with a custom config path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Configuration file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ricecoder")
            .join("xml.toml")
    }

    /// Load and validate the configuration
    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(Environment::with_prefix(&self.env_prefix).try_parsing(true))
            .build()?;

        let engine_config: EngineConfig = config.try_deserialize()?;
        self.validate(&engine_config)?;
        debug!("Loaded engine configuration from {}", self.config_path.display());
        Ok(engine_config)
    }

    /// Write the configuration as TOML
    pub fn save(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        self.validate(config)?;
        let toml = toml::to_string(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        if config.max_iterations == 0 {
            return Err(ConfigError::Validation(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if config.analytics_window_days <= 0 {
            return Err(ConfigError::Validation(
                "analytics_window_days must be greater than 0".to_string(),
            ));
        }
        if config.top_templates == 0 {
            return Err(ConfigError::Validation(
                "top_templates must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
