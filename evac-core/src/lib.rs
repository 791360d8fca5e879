//! Core shared library for the evacuation tracking services.
//!
//! This crate exposes the primitives every binary depends on: the
//! canonical error type, configuration loading, the Postgres pool
//! wrapper, JSON helpers and logging setup.

pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod serde_utils;

pub use config::{CoreConfig, Environment};
pub use db::DatabasePool;
pub use errors::{ConfigError, EvacError, Result as CoreResult};
