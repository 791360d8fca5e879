use std::net::AddrParseError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use evac_core::errors::{ConfigError, EvacError};
use evac_protocol::feed::FeedError;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::ingest::IngestError;

pub type AppResult<T> = Result<T, AppError>;

/// Errors that stop the binary from serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] EvacError),
    #[error("invalid bind address: {0}")]
    Address(#[from] AddrParseError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error rendered to HTTP callers as `{"error": ..., "data": ...}`.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    data: Option<Value>,
}

impl AppError {
    pub fn bad_request<M: Into<String>>(message: M) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict<M: Into<String>>(message: M) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Attaches a hint, such as the expected request shape.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn new<M: Into<String>>(status: StatusCode, message: M) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self.data {
            Some(data) => json!({ "error": self.message, "data": data }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<EvacError> for AppError {
    fn from(err: EvacError) -> Self {
        match err {
            EvacError::NotFound(message) => AppError::not_found(message),
            EvacError::Conflict(message) => AppError::conflict(message),
            EvacError::DeserializationError(message) => AppError::bad_request(message),
            other => {
                error!(error = %other, "request failed on storage or internal fault");
                AppError::internal(other.to_string())
            }
        }
    }
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        let expected = err.expected_shape().clone();
        AppError::bad_request(err.to_string()).with_data(expected)
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Feed(feed) => feed.into(),
            IngestError::UnknownNetwork(network_id) => {
                AppError::bad_request(format!("unknown network: {network_id}"))
            }
            IngestError::Storage(storage) => storage.into(),
        }
    }
}
