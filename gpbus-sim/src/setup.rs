//! Simulation settings

use std::str::FromStr;

use gpbus::config::{MasterConfig, SlaveConfig, TransferMode};
use gpbus::core::MAX_BURST_LENGTH;
use gpbus::ChunkPolicy;

use crate::error::{Result, SimError};

/// Size of the slave memory in bytes, a whole number of maximal bursts
pub const MEMORY_SIZE: usize = 1024 * MAX_BURST_LENGTH;
pub const DEFAULT_CYCLE_LIMIT: u64 = 10_000_000;

/// Settings shared by the master and the slave of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub burst_length: u32,
    pub loops: u32,
    pub chunk_policy: ChunkPolicy,
    pub response_required: bool,
    pub cycle_limit: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let master = MasterConfig::default();
        Self {
            burst_length: master.burst_length,
            loops: master.loops,
            chunk_policy: master.chunk_policy,
            response_required: master.response_required,
            cycle_limit: DEFAULT_CYCLE_LIMIT,
        }
    }
}

impl Settings {
    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from a variable lookup, keeping defaults for missing variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(value) = lookup("GPBUS_BURST_LENGTH") {
            settings.burst_length = parse("GPBUS_BURST_LENGTH", value)?;
        }

        if let Some(value) = lookup("GPBUS_LOOPS") {
            settings.loops = parse("GPBUS_LOOPS", value)?;
        }

        if let Some(value) = lookup("GPBUS_CHUNK") {
            let chunk: u32 = parse("GPBUS_CHUNK", value)?;
            settings.chunk_policy = ChunkPolicy::fixed(chunk).unwrap_or(ChunkPolicy::Unchunked);
        }

        if let Some(value) = lookup("GPBUS_RESPONSE") {
            settings.response_required = match value.trim() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => return Err(invalid("GPBUS_RESPONSE", value)),
            };
        }

        if let Some(value) = lookup("GPBUS_CYCLE_LIMIT") {
            settings.cycle_limit = parse("GPBUS_CYCLE_LIMIT", value)?;
        }

        Ok(settings)
    }

    pub fn master_config(&self, mode: TransferMode) -> Result<MasterConfig> {
        let mut config = MasterConfig::default();
        config.burst_length = self.burst_length;
        config.loops = self.loops;
        config.mode = mode;
        config.chunk_policy = self.chunk_policy;
        config.response_required = self.response_required;
        config.validate()?;
        Ok(config)
    }

    pub fn slave_config(&self) -> SlaveConfig {
        let mut config = SlaveConfig::default();
        config.chunk_policy = self.chunk_policy;
        config.response_required = self.response_required;
        config
    }
}

fn invalid(name: &'static str, value: String) -> SimError {
    SimError::InvalidVariable { name, value }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(name, value))
}
