//! Error types for the prompt service

use ricecoder_xml::XmlError;
use thiserror::Error;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised by service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Core generation, parsing or optimization failure
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// No template with the given id
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// No optimization session with the given id
    #[error("Optimization session not found: {0}")]
    SessionNotFound(String),

    /// Registry backend failure
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration could not be loaded, saved or validated
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A sample in a batch failed to parse
    #[error("Sample {index} could not be analyzed: {source}")]
    Sample {
        /// Position of the sample in the batch
        index: usize,
        /// Underlying failure
        source: XmlError,
    },
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ServiceError {
    fn from(err: serde_yaml::Error) -> Self {
        ServiceError::Serialization(err.to_string())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the configuration file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration sources could not be merged or deserialized
    #[error("Load error: {0}")]
    Load(#[from] config::ConfigError),

    /// Configuration could not be written as TOML
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Configuration values are out of range
    #[error("Validation error: {0}")]
    Validation(String),
}
