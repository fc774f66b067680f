//! Error types for registry lookups

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Repository or tag does not exist
    #[error("Image not found: {repository}:{tag}")]
    ImageNotFound { repository: String, tag: String },
    /// Credentials missing, invalid or insufficient for the requested scope
    #[error("Authorization error: {0}")]
    Authorization(String),
    /// Any other non-success status from the registry or token service
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::ImageNotFound { .. })
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, RegistryError::Authorization(_))
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        RegistryError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Validation(err.to_string())
    }
}
