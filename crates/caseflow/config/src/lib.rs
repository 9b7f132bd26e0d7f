//! Configuration for caseflow
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then `CASEFLOW__*` environment variables
//! (e.g. `CASEFLOW__ENVIRONMENT__PROFILE=prod`).
//!
//! The environment profile decides the policies the session manager
//! applies: whether transactions are rolled back for test isolation,
//! whether lookups are cached, how many times handle acquisition is
//! retried and the default completion timeout.

#![deny(unsafe_code)]

mod connection;
mod environment;
mod settings;

pub use connection::{mask_connection_string, mask_url, ConnectionParams};
pub use environment::EnvironmentKind;
pub use settings::*;

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;
