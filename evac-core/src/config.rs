use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5_000;
/// Conventional key honored when the prefixed database URL is absent.
const UNPREFIXED_DATABASE_URL: &str = "DATABASE_URL";

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Global configuration shared across the services.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    pub environment: Environment,
    pub node_name: String,
    pub http_bind: Option<String>,
    pub max_connections: u32,
    /// Server-side statement timeout; the only backstop for a write that hangs.
    pub statement_timeout: Duration,
}

impl CoreConfig {
    /// Loads configuration from the unprefixed process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix("")
    }

    /// Loads configuration from env vars prefixed with the provided value (e.g. `EVAC_`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(prefix, |key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);

        let db_key = key("DATABASE_URL");
        let non_blank = |value: &String| !value.trim().is_empty();
        let database_url = lookup(&db_key)
            .filter(non_blank)
            .or_else(|| lookup(UNPREFIXED_DATABASE_URL).filter(non_blank))
            .ok_or_else(|| ConfigError::MissingEnvVar(db_key.clone()))?;

        let environment = lookup(&key("ENV"))
            .map(|raw| Environment::parse(&raw))
            .unwrap_or_default();

        let node_name = lookup(&key("NODE_NAME")).unwrap_or_else(|| "evac-node".to_string());
        let http_bind = lookup(&key("HTTP_BIND"));

        let max_connections = parse_or(
            &key("DB_MAX_CONNECTIONS"),
            lookup(&key("DB_MAX_CONNECTIONS")),
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let statement_timeout_ms = parse_or(
            &key("DB_STATEMENT_TIMEOUT_MS"),
            lookup(&key("DB_STATEMENT_TIMEOUT_MS")),
            DEFAULT_STATEMENT_TIMEOUT_MS,
        )?;

        Ok(Self {
            database_url,
            environment,
            node_name,
            http_bind,
            max_connections,
            statement_timeout: Duration::from_millis(statement_timeout_ms),
        })
    }

    /// Returns the base Postgres URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Whether the service is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

/// Parses an optional raw value, falling back to `default` when it is absent.
pub fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: err.to_string(),
            }),
    }
}
