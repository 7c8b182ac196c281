//! Memory-backed target

use core::ops::Range;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Timer;

use crate::burst::next_chunk;
use crate::channel::{TargetEvent, TargetPort};
use crate::config::SlaveConfig;
use crate::core::{Command, Notification, Phase, PhaseState, TransactionHandle};

#[derive(Debug, Clone)]
struct Session {
    handle: TransactionHandle,
    command: Command,
    range: Range<usize>,
    bytes_valid: u32,
}

impl Session {
    fn burst_length(&self) -> u32 {
        self.range.len() as u32
    }
}

/// Maps a burst onto a memory of `size` bytes. Empty bursts are rejected.
fn locate(size: usize, address: u64, burst_length: u32) -> Option<Range<usize>> {
    if burst_length == 0 {
        return None;
    }
    let start = usize::try_from(address).ok()?;
    let end = start.checked_add(usize::try_from(burst_length).ok()?)?;
    (end <= size).then_some(start..end)
}

/// Target serving transactions from a byte slice
///
/// Addresses are offsets into the slice. One transaction is served at a time; phases that do
/// not belong to the current transaction are answered with the error state of their phase.
pub struct MemorySlave<'a, M: RawMutex, const N: usize> {
    port: TargetPort<'a, M, N>,
    memory: &'a mut [u8],
    config: SlaveConfig,
    session: Option<Session>,
}

impl<'a, M: RawMutex + Sync, const N: usize> MemorySlave<'a, M, N> {
    pub fn new(port: TargetPort<'a, M, N>, memory: &'a mut [u8], config: SlaveConfig) -> Self {
        Self {
            port,
            memory,
            config,
            session: None,
        }
    }

    pub fn memory(&self) -> &[u8] {
        &*self.memory
    }

    /// Serves initiator calls forever.
    pub async fn run(&mut self) -> ! {
        loop {
            let event = self.port.next().await;
            self.process(event).await;
        }
    }

    /// Serves a single initiator call.
    pub async fn process(&mut self, event: TargetEvent) {
        match event {
            TargetEvent::Phase(Notification { handle, phase }) => match phase.state {
                PhaseState::RequestValid => self.on_request(handle),
                PhaseState::DataValid => self.on_data(handle, phase.bytes_valid),
                PhaseState::ResponseAccepted => self.on_response_ack(handle, phase.bytes_valid),
                state => panic!("target received {:?} for {:?}", state, handle),
            },
            TargetEvent::Transact(handle) => self.on_transact(handle).await,
        }
    }

    fn on_request(&mut self, handle: TransactionHandle) {
        let (command, address, burst_length) = self
            .port
            .with_transaction(handle, |t| (t.command, t.address, t.burst_length));

        let Some(range) = locate(self.memory.len(), address, burst_length) else {
            debug!("request {:#x}+{} out of range", address, burst_length);
            self.session = None;
            self.send(handle, Phase::new(PhaseState::RequestError));
            return;
        };

        self.session = Some(Session {
            handle,
            command,
            range,
            bytes_valid: 0,
        });
        self.send(handle, Phase::new(PhaseState::RequestAccepted));

        if command == Command::Read {
            self.send_read_chunk();
        }
    }

    fn on_data(&mut self, handle: TransactionHandle, bytes_valid: u32) {
        let current = self
            .session
            .as_ref()
            .is_some_and(|s| s.handle == handle && s.command == Command::Write);
        if !current {
            self.send(handle, Phase::new(PhaseState::DataError));
            return;
        }
        let session = unwrap!(self.session.as_mut());

        let burst_length = session.burst_length();
        if bytes_valid < session.bytes_valid || bytes_valid > burst_length {
            debug!(
                "data bytes_valid {} out of order ({} of {})",
                bytes_valid, session.bytes_valid, burst_length
            );
            self.session = None;
            self.send(handle, Phase::new(PhaseState::DataError));
            return;
        }

        let chunk = session.bytes_valid as usize..bytes_valid as usize;
        let target = &mut self.memory[session.range.start + chunk.start..][..chunk.len()];
        self.port
            .with_transaction(handle, |t| target.copy_from_slice(&t.payload[chunk]));
        session.bytes_valid = bytes_valid;

        let accepted = Phase::new(PhaseState::DataAccepted).with_bytes_valid(bytes_valid);
        if bytes_valid < burst_length {
            self.send(handle, accepted);
        } else if self.config.response_required {
            self.send(handle, accepted);
            self.send(
                handle,
                Phase::new(PhaseState::ResponseValid).with_bytes_valid(bytes_valid),
            );
        } else {
            self.session = None;
            self.send(handle, accepted);
        }
    }

    fn on_response_ack(&mut self, handle: TransactionHandle, bytes_valid: u32) {
        let Some(session) = self.session.as_ref() else {
            panic!("response acknowledged without transaction: {:?}", handle);
        };
        if session.handle != handle || bytes_valid != session.bytes_valid {
            panic!(
                "unexpected response acknowledgement: {:?}, {} bytes valid",
                handle, bytes_valid
            );
        }

        if session.command == Command::Read && bytes_valid < session.burst_length() {
            self.send_read_chunk();
        } else {
            self.session = None;
        }
    }

    /// Copies the next chunk of read data into the transaction and posts it.
    fn send_read_chunk(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let burst_length = session.burst_length();
        let start = session.bytes_valid as usize;
        let bytes_valid = next_chunk(burst_length, session.bytes_valid, self.config.chunk_policy);
        let source = &self.memory[session.range.clone()][start..bytes_valid as usize];
        self.port.with_transaction(session.handle, |t| {
            t.payload[start..bytes_valid as usize].copy_from_slice(source)
        });
        session.bytes_valid = bytes_valid;

        let handle = session.handle;
        self.send(
            handle,
            Phase::new(PhaseState::ResponseValid).with_bytes_valid(bytes_valid),
        );
    }

    async fn on_transact(&mut self, handle: TransactionHandle) {
        Timer::after(self.config.latency).await;

        let response_required = self.config.response_required;
        let memory = &mut *self.memory;
        let phase = self.port.with_transaction(handle, |t| {
            let Some(range) = locate(memory.len(), t.address, t.burst_length) else {
                return Phase::new(PhaseState::RequestError);
            };
            let burst_length = t.burst_length;
            match t.command {
                Command::Write => {
                    memory[range].copy_from_slice(&t.payload[..burst_length as usize]);
                    if response_required {
                        Phase::new(PhaseState::ResponseValid).with_bytes_valid(burst_length)
                    } else {
                        Phase::new(PhaseState::DataAccepted).with_bytes_valid(burst_length)
                    }
                }
                Command::Read => {
                    t.payload[..burst_length as usize].copy_from_slice(&memory[range]);
                    Phase::new(PhaseState::ResponseValid).with_bytes_valid(burst_length)
                }
            }
        });
        debug!("transact {:?} -> {:?}", handle, phase.state);
        self.port.complete(phase);
    }

    fn send(&self, handle: TransactionHandle, phase: Phase) {
        debug!("target {:?}: {:?}", handle, phase.state);
        unwrap!(self.port.notify(handle, phase, self.config.latency));
    }
}
