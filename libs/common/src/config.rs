//! Environment configuration loading
//!
//! Every component configuration is a serde struct with field defaults,
//! filled from the environment variables sharing a component prefix.

use serde::de::DeserializeOwned;

pub use config::ConfigError;

/// Deserialize a configuration struct from environment variables
///
/// The prefix and the following underscore are stripped and the rest of the
/// name is lowercased, so with prefix `DATABASE` the variable
/// `DATABASE_MAX_CONNECTIONS` fills the field `max_connections`. Fields
/// without a matching variable take their serde default.
pub fn from_env<T: DeserializeOwned>(prefix: &str) -> Result<T, ConfigError> {
    config::Config::builder()
        .add_source(config::Environment::with_prefix(prefix))
        .build()?
        .try_deserialize()
}
