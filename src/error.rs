//! Unified error types for the application factory.

use thiserror::Error;

/// Unified error type returned by [`AppFactory::build`](crate::app::AppFactory::build).
#[derive(Error, Debug)]
pub enum AppError {
    /// Options could not be resolved into a configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The transformer failed; its error is kept as-is.
    #[error("transformer failed: {0}")]
    Transform(anyhow::Error),
}

impl AppError {
    /// Borrow the transformer's error, if this is a transformer failure.
    pub fn transform_error(&self) -> Option<&anyhow::Error> {
        match self {
            AppError::Transform(err) => Some(err),
            _ => None,
        }
    }
}

/// Configuration resolution errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variables could not be deserialized.
    #[error("environment variables: {0}")]
    Env(#[from] envy::Error),

    /// Unknown environment name.
    #[error("unknown environment {0:?}")]
    InvalidEnvironment(String),

    /// A CORS origin is not a valid header value.
    #[error("invalid CORS origin {0:?}")]
    InvalidOrigin(String),

    /// A CORS method is not a valid HTTP method.
    #[error("invalid CORS method {0:?}")]
    InvalidMethod(String),

    /// A header name is not valid.
    #[error("invalid header name {0:?}")]
    InvalidHeader(String),

    /// Credentials cannot be allowed for every origin.
    #[error("CORS credentials require an explicit origin list")]
    CredentialsWithWildcard,

    /// The body size limit must be positive.
    #[error("body parser limit must be greater than zero")]
    InvalidBodyLimit,

    /// Unknown request log format.
    #[error("unknown log format {0:?}")]
    InvalidLogFormat(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
