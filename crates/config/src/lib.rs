pub mod credentials;
pub mod models;
pub mod validation;

pub use credentials::{Credentials, CREDENTIAL_DIR_ENV};
pub use models::{
    AppConfig, BrokerConfig, BrokerKind, ConsumerConfig, LogFormat, LogLevel, LoggingConfig,
};
pub use validation::{ConfigValidator, ValidationUtils};

use consumer_errors::ConsumerError;

/// Configuration error type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error enumeration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Security error: {0}")]
    Security(String),
}

impl From<anyhow::Error> for ConfigError {
    fn from(err: anyhow::Error) -> Self {
        ConfigError::Configuration(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<ConfigError> for ConsumerError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Security(msg) => ConsumerError::Credentials(msg),
            other => ConsumerError::Configuration(other.to_string()),
        }
    }
}
