use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A coordinate as it arrives on the wire.
///
/// Resolved once at the boundary through [`Coordinate::normalize`]; nothing
/// downstream inspects the raw representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Number(f64),
    Text(String),
    Other(Value),
}

impl Default for Coordinate {
    fn default() -> Self {
        Coordinate::Other(Value::Null)
    }
}

impl Coordinate {
    /// Coerces the value into a float, returning `0.0` when it cannot be read.
    ///
    /// `0.0` means "unknown" and must never be taken as the origin.
    pub fn normalize(&self) -> f64 {
        match self {
            Coordinate::Number(value) if value.is_finite() => *value,
            Coordinate::Number(value) => {
                debug!(%value, "non-finite numeric coordinate");
                0.0
            }
            Coordinate::Text(raw) => match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => value,
                Ok(_) => {
                    debug!(raw = %raw, "non-finite textual coordinate");
                    0.0
                }
                Err(err) => {
                    debug!(raw = %raw, %err, "unparseable textual coordinate");
                    0.0
                }
            },
            Coordinate::Other(value) => {
                debug!(?value, "unsupported coordinate representation");
                0.0
            }
        }
    }

    /// Normalized value, or `None` when it resolves to the unknown sentinel.
    pub fn known(&self) -> Option<f64> {
        let value = self.normalize();
        (value != 0.0).then_some(value)
    }
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Coordinate::Number(value)
    }
}

impl From<&str> for Coordinate {
    fn from(value: &str) -> Self {
        Coordinate::Text(value.to_string())
    }
}
