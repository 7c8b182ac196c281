//! Protocol driver
//!
//! The master drives one transaction at a time through the request, data and optional
//! response phases, consuming transport answers from its notification queue.

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Timer;
use heapless::Vec;

use crate::burst::next_chunk;
use crate::config::{ConfigError, MasterConfig, TransferMode};
use crate::core::{MAX_BURST_LENGTH, Phase, PhaseState, Transaction, TransactionHandle};
use crate::fmt::Bytes;
use crate::peq::NotificationQueue;
use crate::port::Transport;

/// Phase error that aborted a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    RequestError,
    DataError,
    ResponseError,
}

/// Outcome counts of one transaction loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopSummary {
    pub completed: u32,
    pub failed: u32,
}

impl LoopSummary {
    fn record(&mut self, result: Result<(), TransferError>) {
        match result {
            Ok(()) => self.completed = self.completed.saturating_add(1),
            Err(_) => self.failed = self.failed.saturating_add(1),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Summary {
    pub writes: LoopSummary,
    pub reads: LoopSummary,
}

/// Bus initiator
///
/// Owns the transport initiator side and borrows the notification queue the transport posts
/// into. At most one transaction is outstanding: every new request and every write data phase
/// asserts the queue is drained.
pub struct Master<'a, T: Transport, M: RawMutex, const N: usize> {
    port: T,
    peq: &'a NotificationQueue<M, N>,
    config: MasterConfig,
    data: Vec<u8, MAX_BURST_LENGTH>,
    data_cnt: u8,
}

impl<'a, T: Transport, M: RawMutex, const N: usize> Master<'a, T, M, N> {
    pub fn new(
        port: T,
        peq: &'a NotificationQueue<M, N>,
        config: MasterConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut data = Vec::new();
        unwrap!(data.resize(config.burst_length as usize, 0));

        Ok(Self {
            port,
            peq,
            config,
            data,
            data_cnt: 0,
        })
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// Scratch payload: the last written burst during the write loop, the last read burst
    /// after the read loop.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn port(&mut self) -> &mut T {
        &mut self.port
    }

    /// Runs the write loop and then the read loop over the same address range.
    ///
    /// Each loop waits `initial_delay` first. Never returns if `loops` is 0.
    pub async fn run(&mut self) -> Summary {
        Timer::after(self.config.initial_delay).await;
        let writes = self.perform_writes().await;

        self.data.fill(0);

        Timer::after(self.config.initial_delay).await;
        let reads = self.perform_reads().await;

        Summary { writes, reads }
    }

    fn loop_address(&self, index: u32) -> u64 {
        let offset = u64::from(index).wrapping_mul(self.config.burst_length.into());
        self.config.target_address.wrapping_add(offset)
    }

    fn loop_running(&self, index: u32) -> bool {
        self.config.loops == 0 || index < self.config.loops
    }

    async fn perform_writes(&mut self) -> LoopSummary {
        let mut summary = LoopSummary::default();
        let mut data = core::mem::take(&mut self.data);
        let burst_length = self.config.burst_length;

        let mut index = 0u32;
        while self.loop_running(index) {
            yield_now().await;

            for byte in data.iter_mut() {
                *byte = self.data_cnt;
                self.data_cnt = self.data_cnt.wrapping_add(1);
            }

            let address = self.loop_address(index);
            let result = self.perform_write(address, &data, burst_length).await;
            summary.record(result);
            index = index.wrapping_add(1);
        }

        self.data = data;
        summary
    }

    async fn perform_reads(&mut self) -> LoopSummary {
        let mut summary = LoopSummary::default();
        let mut data = core::mem::take(&mut self.data);
        let burst_length = self.config.burst_length;

        let mut index = 0u32;
        while self.loop_running(index) {
            yield_now().await;

            let address = self.loop_address(index);
            let result = self.perform_read(address, burst_length, &mut data).await;
            summary.record(result);
            index = index.wrapping_add(1);
        }

        self.data = data;
        summary
    }

    /// Writes the first `burst_length` bytes of `payload` to `address`.
    ///
    /// Panics if `payload` is shorter than the burst, the burst is empty or too long, or a
    /// notification is still pending.
    pub async fn perform_write(
        &mut self,
        address: u64,
        payload: &[u8],
        burst_length: u32,
    ) -> Result<(), TransferError> {
        let length = burst_length as usize;
        assert!(length > 0 && length <= MAX_BURST_LENGTH, "invalid burst length");
        assert!(payload.len() >= length, "payload shorter than burst");
        let payload = &payload[..length];
        info!("write {:#x}: data to send {}", address, Bytes(payload));

        let handle = self.begin(unwrap!(Transaction::write(address, payload)));
        let result = match self.config.mode {
            TransferMode::Atomic => self.write_atomic(handle, address).await,
            TransferMode::Phased => self.write_phased(handle, address, burst_length).await,
        };
        self.port.release_transaction(handle);

        if result.is_ok() {
            debug!("write {:#x}: done", address);
        }
        result
    }

    /// Reads `burst_length` bytes from `address` into the front of `buffer`.
    ///
    /// The buffer is left untouched on failure. Panics if `buffer` is shorter than the burst,
    /// the burst is empty or too long, or a notification is still pending.
    pub async fn perform_read(
        &mut self,
        address: u64,
        burst_length: u32,
        buffer: &mut [u8],
    ) -> Result<(), TransferError> {
        let length = burst_length as usize;
        assert!(length > 0 && length <= MAX_BURST_LENGTH, "invalid burst length");
        assert!(buffer.len() >= length, "buffer shorter than burst");

        let handle = self.begin(unwrap!(Transaction::read(address, burst_length)));
        let result = match self.config.mode {
            TransferMode::Atomic => self.read_atomic(handle, address).await,
            TransferMode::Phased => self.read_phased(handle, address, burst_length).await,
        };
        if result.is_ok() {
            let buffer = &mut buffer[..length];
            self.port
                .with_transaction(handle, |t| buffer.copy_from_slice(&t.payload[..length]));
            info!("read {:#x}: {}", address, Bytes(buffer));
        }
        self.port.release_transaction(handle);
        result
    }

    fn begin(&mut self, transaction: Transaction) -> TransactionHandle {
        assert!(
            self.peq.is_empty(),
            "notification outstanding before new transaction"
        );
        let handle = unwrap!(self.port.create_transaction());
        self.port.with_transaction(handle, |t| *t = transaction);
        handle
    }

    async fn write_phased(
        &mut self,
        handle: TransactionHandle,
        address: u64,
        burst_length: u32,
    ) -> Result<(), TransferError> {
        self.request(handle, address).await?;

        let mut bytes_valid = 0;
        while bytes_valid < burst_length {
            assert!(
                self.peq.is_empty(),
                "notification outstanding before data phase"
            );
            bytes_valid = next_chunk(burst_length, bytes_valid, self.config.chunk_policy);
            debug!("{:#x}: DataValid, {} bytes valid", address, bytes_valid);
            let phase = Phase::new(PhaseState::DataValid).with_bytes_valid(bytes_valid);
            self.port.issue_data(handle, phase);

            match self.wait_for_next(handle).await.state {
                PhaseState::DataAccepted => {}
                PhaseState::DataError => {
                    warn!("write {:#x}: data error, transaction aborted", address);
                    return Err(TransferError::DataError);
                }
                state => protocol_violation(state, address),
            }
        }

        if self.config.response_required {
            let phase = self.wait_for_next(handle).await;
            match phase.state {
                PhaseState::ResponseValid => {
                    debug!("{:#x}: ResponseAccepted", address);
                    let ack = Phase::new(PhaseState::ResponseAccepted)
                        .with_bytes_valid(phase.bytes_valid);
                    self.port.issue_response_ack(handle, ack);
                }
                PhaseState::ResponseError => {
                    warn!("write {:#x}: response error, transaction aborted", address);
                    return Err(TransferError::ResponseError);
                }
                state => protocol_violation(state, address),
            }
        }

        Ok(())
    }

    async fn read_phased(
        &mut self,
        handle: TransactionHandle,
        address: u64,
        burst_length: u32,
    ) -> Result<(), TransferError> {
        self.request(handle, address).await?;

        let mut bytes_valid = 0;
        while bytes_valid < burst_length {
            let phase = self.wait_for_next(handle).await;
            match phase.state {
                PhaseState::ResponseValid => {
                    if phase.bytes_valid <= bytes_valid || phase.bytes_valid > burst_length {
                        panic!(
                            "wrong bytes_valid {} in ResponseValid at {:#x}",
                            phase.bytes_valid, address
                        );
                    }
                    bytes_valid = phase.bytes_valid;
                    assert!(
                        self.peq.is_empty(),
                        "notification outstanding before response acknowledgement"
                    );
                    debug!("{:#x}: ResponseAccepted, {} bytes valid", address, bytes_valid);
                    let ack = Phase::new(PhaseState::ResponseAccepted).with_bytes_valid(bytes_valid);
                    self.port.issue_response_ack(handle, ack);
                }
                PhaseState::ResponseError => {
                    warn!("read {:#x}: response error, transaction aborted", address);
                    return Err(TransferError::ResponseError);
                }
                state => protocol_violation(state, address),
            }
        }

        Ok(())
    }

    async fn request(
        &mut self,
        handle: TransactionHandle,
        address: u64,
    ) -> Result<(), TransferError> {
        debug!("{:#x}: RequestValid", address);
        self.port.issue_request(handle);

        match self.wait_for_next(handle).await.state {
            PhaseState::RequestAccepted => Ok(()),
            PhaseState::RequestError => {
                warn!("{:#x}: request error", address);
                Err(TransferError::RequestError)
            }
            state => protocol_violation(state, address),
        }
    }

    async fn write_atomic(
        &mut self,
        handle: TransactionHandle,
        address: u64,
    ) -> Result<(), TransferError> {
        let phase = self.port.transact(handle).await;
        debug!("{:#x}: atomic write finished with {:?}", address, phase.state);
        match phase.state {
            PhaseState::DataAccepted | PhaseState::ResponseValid => Ok(()),
            state => Err(atomic_error(state, address)),
        }
    }

    async fn read_atomic(
        &mut self,
        handle: TransactionHandle,
        address: u64,
    ) -> Result<(), TransferError> {
        let phase = self.port.transact(handle).await;
        debug!("{:#x}: atomic read finished with {:?}", address, phase.state);
        match phase.state {
            PhaseState::ResponseValid => Ok(()),
            PhaseState::DataError => protocol_violation(phase.state, address),
            state => Err(atomic_error(state, address)),
        }
    }

    async fn wait_for_next(&mut self, handle: TransactionHandle) -> Phase {
        let notification = self.peq.take().await;
        if notification.handle != handle {
            panic!(
                "notification for {:?} while {:?} is outstanding",
                notification.handle, handle
            );
        }
        debug!(
            "{:?}: {:?}, {} bytes valid",
            handle, notification.phase.state, notification.phase.bytes_valid
        );
        notification.phase
    }
}

fn atomic_error(state: PhaseState, address: u64) -> TransferError {
    match state {
        PhaseState::RequestError => {
            warn!("{:#x}: request error", address);
            TransferError::RequestError
        }
        PhaseState::DataError => {
            warn!("write {:#x}: data error, transaction aborted", address);
            TransferError::DataError
        }
        PhaseState::ResponseError => {
            warn!("{:#x}: response error, transaction aborted", address);
            TransferError::ResponseError
        }
        state => protocol_violation(state, address),
    }
}

fn protocol_violation(state: PhaseState, address: u64) -> ! {
    panic!("wrong phase {:?} for transaction at {:#x}", state, address)
}
