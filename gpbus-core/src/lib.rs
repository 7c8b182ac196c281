//! gpbus protocol core data types
//!
//! This crate provides basic data type definitions used by other gpbus crates.
//! gpbus users should not depend on this crate directly. Use `gpbus::core` reexport instead.
#![no_std]

use heapless::Vec;

/// Largest burst a single transaction can carry, in bytes
pub const MAX_BURST_LENGTH: usize = 256;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BurstTooLong;

/// Transfer direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Read,
    Write,
}

/// Protocol state carried by a phase
///
/// `RequestValid`, `DataValid` and `ResponseAccepted` are driven by the initiator and travel
/// towards the target. The remaining states are the outcomes the target reports back.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PhaseState {
    RequestValid = 0,
    RequestAccepted = 1,
    RequestError = 2,
    DataValid = 3,
    DataAccepted = 4,
    DataError = 5,
    ResponseValid = 6,
    ResponseAccepted = 7,
    ResponseError = 8,
}

impl PhaseState {
    pub const MAX_VALUE: u8 = PhaseState::ResponseError.into_u8();

    pub const fn try_from_u8(code: u8) -> Option<PhaseState> {
        let state = match code {
            0 => PhaseState::RequestValid,
            1 => PhaseState::RequestAccepted,
            2 => PhaseState::RequestError,
            3 => PhaseState::DataValid,
            4 => PhaseState::DataAccepted,
            5 => PhaseState::DataError,
            6 => PhaseState::ResponseValid,
            7 => PhaseState::ResponseAccepted,
            8 => PhaseState::ResponseError,
            _ => return None,
        };
        Some(state)
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }

    pub const fn is_error(self) -> bool {
        matches!(
            self,
            PhaseState::RequestError | PhaseState::DataError | PhaseState::ResponseError
        )
    }

    /// Returns true for states issued by the initiator rather than reported by the target.
    pub const fn is_initiator_driven(self) -> bool {
        matches!(
            self,
            PhaseState::RequestValid | PhaseState::DataValid | PhaseState::ResponseAccepted
        )
    }
}

impl From<PhaseState> for u8 {
    fn from(value: PhaseState) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for PhaseState {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}

/// A single handshake step
///
/// `bytes_valid` is the cumulative number of payload bytes transferred so far. It is only
/// meaningful for data and response phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Phase {
    pub state: PhaseState,
    pub bytes_valid: u32,
}

impl Phase {
    pub const fn new(state: PhaseState) -> Self {
        Self {
            state,
            bytes_valid: 0,
        }
    }

    pub const fn with_bytes_valid(self, bytes_valid: u32) -> Self {
        Self {
            state: self.state,
            bytes_valid,
        }
    }

    pub fn set_bytes_valid(&mut self, bytes_valid: u32) {
        self.bytes_valid = bytes_valid;
    }
}

/// Index of a transaction slot in a transport's pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransactionHandle(u8);

impl TransactionHandle {
    pub const fn from_index(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Transaction record
///
/// The payload holds `burst_length` bytes once the transaction is built: the data to write,
/// or a zero-filled buffer the target populates on reads.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transaction {
    pub command: Command,
    pub address: u64,
    pub burst_length: u32,
    pub payload: Vec<u8, MAX_BURST_LENGTH>,
}

impl Transaction {
    pub const fn new() -> Self {
        Self {
            command: Command::Read,
            address: 0,
            burst_length: 0,
            payload: Vec::new(),
        }
    }

    /// Creates a write of `data` to `address`. The burst length equals the data length.
    pub fn write(address: u64, data: &[u8]) -> Result<Self, BurstTooLong> {
        let payload = Vec::from_slice(data).map_err(|_| BurstTooLong)?;
        Ok(Self {
            command: Command::Write,
            address,
            burst_length: payload.len() as u32,
            payload,
        })
    }

    /// Creates a read of `burst_length` bytes from `address` with a zero-filled payload.
    pub fn read(address: u64, burst_length: u32) -> Result<Self, BurstTooLong> {
        let mut payload = Vec::new();
        let length = usize::try_from(burst_length).map_err(|_| BurstTooLong)?;
        payload.resize(length, 0).map_err(|_| BurstTooLong)?;
        Ok(Self {
            command: Command::Read,
            address,
            burst_length,
            payload,
        })
    }

    /// First address past the burst, if it does not overflow the address space.
    pub fn end_address(&self) -> Option<u64> {
        self.address.checked_add(self.burst_length.into())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Transaction::new()
    }
}

/// Phase completion delivered from a transport to the initiator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Notification {
    pub handle: TransactionHandle,
    pub phase: Phase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_state_code() {
        for code in 0..=u8::MAX {
            match PhaseState::try_from(code) {
                Ok(state) => assert_eq!(u8::from(state), code),
                Err(InvalidValue) => assert!(code > PhaseState::MAX_VALUE),
            }
        }
    }

    #[test]
    fn test_phase_state_classes() {
        let initiator = [
            PhaseState::RequestValid,
            PhaseState::DataValid,
            PhaseState::ResponseAccepted,
        ];
        let errors = [
            PhaseState::RequestError,
            PhaseState::DataError,
            PhaseState::ResponseError,
        ];

        for code in 0..=PhaseState::MAX_VALUE {
            let state = PhaseState::try_from_u8(code).unwrap();
            assert_eq!(state.is_initiator_driven(), initiator.contains(&state));
            assert_eq!(state.is_error(), errors.contains(&state));
            assert!(!(state.is_error() && state.is_initiator_driven()));
        }
    }

    #[test]
    fn test_write_transaction() {
        let transaction = Transaction::write(0x100, &[1, 2, 3]).unwrap();
        assert_eq!(transaction.command, Command::Write);
        assert_eq!(transaction.burst_length, 3);
        assert_eq!(transaction.payload.as_slice(), [1, 2, 3]);
        assert_eq!(transaction.end_address(), Some(0x103));

        let data = [0u8; MAX_BURST_LENGTH + 1];
        assert_eq!(Transaction::write(0, &data), Err(BurstTooLong));
    }

    #[test]
    fn test_read_transaction() {
        let transaction = Transaction::read(0x40, 20).unwrap();
        assert_eq!(transaction.command, Command::Read);
        assert_eq!(transaction.payload.as_slice(), [0; 20]);

        assert_eq!(
            Transaction::read(0, MAX_BURST_LENGTH as u32 + 1),
            Err(BurstTooLong)
        );
    }

    #[test]
    fn test_end_address_overflow() {
        let transaction = Transaction::read(u64::MAX - 3, 4).unwrap();
        assert_eq!(transaction.end_address(), None);
    }
}
