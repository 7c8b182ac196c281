//! Read-back verification on the initiator side of the channel

use gpbus::core::{Command, Phase, PhaseState, Transaction, TransactionHandle};
use gpbus::pool::PoolExhausted;
use gpbus::port::Transport;

/// Byte the master main action writes at `offset` from its target address
fn pattern_byte(offset: u64) -> u8 {
    offset as u8
}

/// Returns true if `payload` read from `address` holds the write pattern that starts at `base`.
pub fn matches_pattern(base: u64, address: u64, payload: &[u8]) -> bool {
    let start = address.wrapping_sub(base);
    payload
        .iter()
        .zip(0u64..)
        .all(|(byte, i)| *byte == pattern_byte(start.wrapping_add(i)))
}

/// Transport wrapper checking every completed read against the write pattern
pub struct Monitor<T: Transport> {
    inner: T,
    base: u64,
    checked: u32,
    mismatched: u32,
}

impl<T: Transport> Monitor<T> {
    pub fn new(inner: T, base: u64) -> Self {
        Self {
            inner,
            base,
            checked: 0,
            mismatched: 0,
        }
    }

    /// Number of completed reads seen so far
    pub fn checked(&self) -> u32 {
        self.checked
    }

    /// Number of completed reads whose payload differs from the write pattern
    pub fn mismatched(&self) -> u32 {
        self.mismatched
    }

    fn check(&mut self, handle: TransactionHandle, bytes_valid: u32) {
        let base = self.base;
        let verdict = self.inner.with_transaction(handle, |t| {
            (t.command == Command::Read && bytes_valid == t.burst_length)
                .then(|| (t.address, matches_pattern(base, t.address, &t.payload)))
        });
        let Some((address, matches)) = verdict else {
            return;
        };

        self.checked += 1;
        if !matches {
            log::error!("read {:#x}: payload differs from written data", address);
            self.mismatched += 1;
        }
    }
}

impl<T: Transport> Transport for Monitor<T> {
    fn create_transaction(&mut self) -> Result<TransactionHandle, PoolExhausted> {
        self.inner.create_transaction()
    }

    fn release_transaction(&mut self, handle: TransactionHandle) {
        self.inner.release_transaction(handle)
    }

    fn with_transaction<R>(
        &mut self,
        handle: TransactionHandle,
        f: impl FnOnce(&mut Transaction) -> R,
    ) -> R {
        self.inner.with_transaction(handle, f)
    }

    fn issue_request(&mut self, handle: TransactionHandle) {
        self.inner.issue_request(handle)
    }

    fn issue_data(&mut self, handle: TransactionHandle, phase: Phase) {
        self.inner.issue_data(handle, phase)
    }

    fn issue_response_ack(&mut self, handle: TransactionHandle, phase: Phase) {
        self.check(handle, phase.bytes_valid);
        self.inner.issue_response_ack(handle, phase)
    }

    async fn transact(&mut self, handle: TransactionHandle) -> Phase {
        let phase = self.inner.transact(handle).await;
        if phase.state == PhaseState::ResponseValid {
            self.check(handle, phase.bytes_valid);
        }
        phase
    }
}
