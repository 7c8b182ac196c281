//! Master and slave configuration

use crate::burst::ChunkPolicy;
use crate::core::MAX_BURST_LENGTH;
use crate::time::Duration;

/// Period of the reference clock used to express delays
pub const CLOCK_CYCLE: Duration = Duration::from_micros(1);

/// How the master drives a transaction through the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferMode {
    /// The whole transaction is a single blocking transport call
    Atomic,
    /// Request, data and response phases are issued one by one
    Phased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Burst length is zero or exceeds `MAX_BURST_LENGTH`
    InvalidBurstLength,
}

/// Master configuration
///
/// Values are read once per transaction; the master never changes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct MasterConfig {
    /// Address of the first transaction of each loop
    pub target_address: u64,
    /// Burst length in bytes
    pub burst_length: u32,
    /// Settle time before the write loop and again before the read loop
    pub initial_delay: Duration,
    /// Transactions per loop; 0 runs forever
    pub loops: u32,
    pub mode: TransferMode,
    /// Data-phase segmentation of writes
    pub chunk_policy: ChunkPolicy,
    /// Await and acknowledge a response phase after the last write data phase
    pub response_required: bool,
}

impl MasterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.burst_length {
            0 => Err(ConfigError::InvalidBurstLength),
            len if len as usize > MAX_BURST_LENGTH => Err(ConfigError::InvalidBurstLength),
            _ => Ok(()),
        }
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            target_address: 0,
            burst_length: 20,
            initial_delay: Duration::from_micros(10),
            loops: 5,
            mode: TransferMode::Phased,
            chunk_policy: ChunkPolicy::Unchunked,
            response_required: false,
        }
    }
}

/// Memory slave configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct SlaveConfig {
    /// Segmentation of read data into response phases
    pub chunk_policy: ChunkPolicy,
    /// Send a response phase after the last write data phase
    pub response_required: bool,
    /// Delay between receiving a phase and the answer becoming visible to the master
    pub latency: Duration,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            chunk_policy: ChunkPolicy::Unchunked,
            response_required: false,
            latency: Duration::from_ticks(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(MasterConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_burst_length_bounds() {
        let mut config = MasterConfig::default();

        config.burst_length = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBurstLength));

        config.burst_length = MAX_BURST_LENGTH as u32;
        assert_eq!(config.validate(), Ok(()));

        config.burst_length = MAX_BURST_LENGTH as u32 + 1;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBurstLength));
    }
}
