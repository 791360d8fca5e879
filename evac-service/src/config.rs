use std::env;
use std::time::Duration;

use evac_core::config::{parse_or, CoreConfig};
use evac_core::errors::ConfigError;

pub const ENV_PREFIX: &str = "EVAC_";

const DEFAULT_BIND: &str = "0.0.0.0:8090";
const DEFAULT_SCAN_DEADLINE_MS: u64 = 10_000;
const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Request-path settings shared by every handler.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Static token echoed to the feed provider's validator handshake.
    pub validator_key: String,
    /// Upper bound on a single ingestion batch's fan-out.
    pub scan_deadline: Duration,
    pub max_body_bytes: usize,
}

impl ServiceSettings {
    pub fn new(validator_key: impl Into<String>) -> Self {
        Self {
            validator_key: validator_key.into(),
            scan_deadline: Duration::from_millis(DEFAULT_SCAN_DEADLINE_MS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_scan_deadline(mut self, deadline: Duration) -> Self {
        self.scan_deadline = deadline;
        self
    }
}

/// Full service configuration loaded from `EVAC_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub core: CoreConfig,
    pub settings: ServiceSettings,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let core = CoreConfig::from_lookup(ENV_PREFIX, &lookup)?;
        let key = |suffix: &str| format!("{ENV_PREFIX}{suffix}");

        let validator_key = lookup(&key("VALIDATOR_KEY"))
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(key("VALIDATOR_KEY")))?;

        let deadline_ms = parse_or(
            &key("SCAN_DEADLINE_MS"),
            lookup(&key("SCAN_DEADLINE_MS")),
            DEFAULT_SCAN_DEADLINE_MS,
        )?;
        if deadline_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: key("SCAN_DEADLINE_MS"),
                message: "deadline must be positive".into(),
            });
        }

        let max_body_bytes = parse_or(
            &key("MAX_BODY_BYTES"),
            lookup(&key("MAX_BODY_BYTES")),
            DEFAULT_MAX_BODY_BYTES,
        )?;

        Ok(Self {
            core,
            settings: ServiceSettings {
                validator_key,
                scan_deadline: Duration::from_millis(deadline_ms),
                max_body_bytes,
            },
        })
    }

    pub fn bind_address(&self) -> &str {
        self.core.http_bind.as_deref().unwrap_or(DEFAULT_BIND)
    }
}
