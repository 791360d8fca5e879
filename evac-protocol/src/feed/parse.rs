use serde_json::Value;
use thiserror::Error;

use super::payload::FeedPayload;
use super::sanitize::sanitize_nan;

/// Rejections produced while decoding a feed callback body.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{message}")]
    Malformed { message: String, expected: Value },
    #[error("no networkId specified")]
    MissingNetworkId { expected: Value },
}

impl FeedError {
    /// Example of the envelope shape the decoder expects.
    pub fn expected_shape(&self) -> &Value {
        match self {
            FeedError::Malformed { expected, .. } | FeedError::MissingNetworkId { expected } => {
                expected
            }
        }
    }
}

/// JSON rendering of an empty envelope, echoed back to callers that send garbage.
pub fn expected_shape() -> Value {
    serde_json::to_value(FeedPayload::default()).unwrap_or(Value::Null)
}

/// Sanitizes, decodes and validates a raw feed body.
pub fn parse_feed(raw: &[u8]) -> Result<FeedPayload, FeedError> {
    let cleaned = sanitize_nan(raw);
    let payload: FeedPayload =
        serde_json::from_slice(&cleaned).map_err(|err| FeedError::Malformed {
            message: err.to_string(),
            expected: expected_shape(),
        })?;

    if payload.data.network_id.trim().is_empty() {
        return Err(FeedError::MissingNetworkId {
            expected: expected_shape(),
        });
    }

    Ok(payload)
}
