use std::io;

use thiserror::Error;

/// Result type used across the evacuation core crate.
pub type Result<T> = std::result::Result<T, EvacError>;

/// Canonical error representation shared by all services.
#[derive(Debug, Error)]
pub enum EvacError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("deserialization error: {0}")]
    DeserializationError(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("general error: {0}")]
    GeneralError(String),
}

impl From<serde_json::Error> for EvacError {
    fn from(err: serde_json::Error) -> Self {
        EvacError::DeserializationError(err.to_string())
    }
}

impl From<sqlx::Error> for EvacError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => EvacError::NotFound("row not found".into()),
            other => EvacError::StorageError(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for EvacError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        EvacError::StorageError(format!("migration failed: {err}"))
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl From<ConfigError> for EvacError {
    fn from(value: ConfigError) -> Self {
        EvacError::ConfigError(value.to_string())
    }
}
