//! Error types for the simulation

use gpbus::config::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    /// Environment variable that does not parse
    #[error("invalid value {value:?} for {name}")]
    InvalidVariable { name: &'static str, value: String },

    /// Settings rejected by the master
    #[error("invalid master configuration: {0:?}")]
    Config(ConfigError),

    /// The scenario did not finish within the cycle limit
    #[error("simulation did not finish within {0} cycles")]
    Timeout(u64),
}

impl From<ConfigError> for SimError {
    fn from(err: ConfigError) -> Self {
        SimError::Config(err)
    }
}
