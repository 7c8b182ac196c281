//! Calls crossing the initiator/transport boundary

use gpbus_core::{Notification, Phase, Transaction, TransactionHandle};

use crate::pool::PoolExhausted;
use crate::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull;

/// Posting side of an initiator notification queue
///
/// Entries become visible to the consumer at `at`. Entries due at the same instant are
/// delivered in posting order.
pub trait Notify {
    /// Enqueues a notification. Never blocks.
    fn post(&self, notification: Notification, at: Instant) -> Result<(), QueueFull>;
}

/// Initiator-facing transport
///
/// Each phase call is one-way: the transport eventually posts the target's answer into the
/// initiator's notification queue. The initiator must not touch the transaction through
/// `with_transaction` while an answer is pending.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Acquires a transaction slot from the transport pool.
    fn create_transaction(&mut self) -> Result<TransactionHandle, PoolExhausted>;

    /// Returns a transaction slot to the transport pool.
    fn release_transaction(&mut self, handle: TransactionHandle);

    /// Gives the closure exclusive access to the transaction record.
    ///
    /// The closure must not call back into the transport.
    fn with_transaction<R>(
        &mut self,
        handle: TransactionHandle,
        f: impl FnOnce(&mut Transaction) -> R,
    ) -> R;

    /// Starts the request phase (`RequestValid`).
    fn issue_request(&mut self, handle: TransactionHandle);

    /// Starts a data phase. `phase.bytes_valid` carries the cumulative valid byte count.
    fn issue_data(&mut self, handle: TransactionHandle, phase: Phase);

    /// Acknowledges a response phase (`ResponseAccepted`).
    fn issue_response_ack(&mut self, handle: TransactionHandle, phase: Phase);

    /// Executes the whole transaction in one call.
    ///
    /// Returns the terminal phase: an error state, or the last accepted/valid state on success.
    async fn transact(&mut self, handle: TransactionHandle) -> Phase;
}
