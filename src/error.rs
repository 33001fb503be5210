use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown topic template: {0}")]
    UnknownTemplate(String),

    #[error("Unknown enumeration: {0}")]
    UnknownEnumeration(String),

    #[error("Cannot translate {details}: {reason}")]
    Translation { details: String, reason: String },

    #[error("Cluster error: {0}")]
    Cluster(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Unsupported run mode: {0}")]
    UnsupportedMode(String),
}

impl ProvisionError {
    /// Whether a failed cluster call is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProvisionError::Cluster(_) | ProvisionError::Timeout(_))
    }
}

impl From<config::ConfigError> for ProvisionError {
    fn from(e: config::ConfigError) -> Self {
        ProvisionError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for ProvisionError {
    fn from(e: toml::de::Error) -> Self {
        ProvisionError::Config(e.to_string())
    }
}
