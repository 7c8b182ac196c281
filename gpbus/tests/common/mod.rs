#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::pin::pin;
use std::task::{Context, Poll};
use std::vec::Vec;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, MockDriver};
use futures_test::task::new_count_waker;
use gpbus::core::{Command, Notification, Phase, PhaseState, Transaction, TransactionHandle};
use gpbus::master::{Master, Summary};
use gpbus::peq::NotificationQueue;
use gpbus::pool::{PoolExhausted, TransactionPool};
use gpbus::port::Transport;
use gpbus::slave::MemorySlave;

pub type Mutex = CriticalSectionRawMutex;
pub const CAPACITY: usize = 8;
pub type Queue = NotificationQueue<Mutex, CAPACITY>;

pub const MEMORY_SIZE: usize = 1024;
const STEP_LIMIT: usize = 100_000;

pub fn phase(state: PhaseState) -> Phase {
    Phase::new(state)
}

pub fn phase_with(state: PhaseState, bytes_valid: u32) -> Phase {
    Phase::new(state).with_bytes_valid(bytes_valid)
}

/// Bursts the master main action writes: consecutive `burst_length` slices of `0, 1, 2, ...`
pub fn written_bursts(burst_length: usize, loops: usize) -> Vec<Vec<u8>> {
    (0..loops)
        .map(|n| (0..burst_length).map(|i| (n * burst_length + i) as u8).collect())
        .collect()
}

/// Polls the future to completion, advancing mock time by one tick while it is pending.
pub fn drive<F: Future>(fut: F) -> F::Output {
    let time = MockDriver::get();
    let (waker, _count) = new_count_waker();
    let mut cx = Context::from_waker(&waker);
    let mut fut = pin!(fut);

    for _ in 0..STEP_LIMIT {
        if let Poll::Ready(output) = fut.as_mut().poll(&mut cx) {
            return output;
        }
        time.advance(Duration::from_ticks(1));
    }
    panic!("future did not complete");
}

/// Runs the master main action against a memory slave.
pub async fn run_pair<T: Transport, const N: usize>(
    master: &mut Master<'_, T, Mutex, N>,
    slave: &mut MemorySlave<'_, Mutex, N>,
) -> Summary {
    match select(master.run(), slave.run()).await {
        Either::First(summary) => summary,
        Either::Second(_) => unreachable!(),
    }
}

/// Initiator call observed on a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issued {
    Request(u64),
    Data(u32),
    ResponseAck(u32),
    Transact(u64),
}

/// Transport wrapper recording every initiator call and the payload of every completed read
pub struct Recorder<'a, T: Transport> {
    inner: T,
    log: &'a RefCell<Vec<Issued>>,
    pub reads: Vec<Vec<u8>>,
}

impl<'a, T: Transport> Recorder<'a, T> {
    pub fn new(inner: T, log: &'a RefCell<Vec<Issued>>) -> Self {
        Self {
            inner,
            log,
            reads: Vec::new(),
        }
    }

    fn address(&mut self, handle: TransactionHandle) -> u64 {
        self.inner.with_transaction(handle, |t| t.address)
    }

    fn record_read(&mut self, handle: TransactionHandle, bytes_valid: u32) {
        let payload = self.inner.with_transaction(handle, |t| {
            (t.command == Command::Read && bytes_valid == t.burst_length)
                .then(|| t.payload.to_vec())
        });
        self.reads.extend(payload);
    }
}

impl<'a, T: Transport> Transport for Recorder<'a, T> {
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
        let address = self.address(handle);
        self.log.borrow_mut().push(Issued::Request(address));
        self.inner.issue_request(handle)
    }

    fn issue_data(&mut self, handle: TransactionHandle, phase: Phase) {
        assert_eq!(phase.state, PhaseState::DataValid);
        self.log.borrow_mut().push(Issued::Data(phase.bytes_valid));
        self.inner.issue_data(handle, phase)
    }

    fn issue_response_ack(&mut self, handle: TransactionHandle, phase: Phase) {
        assert_eq!(phase.state, PhaseState::ResponseAccepted);
        self.log.borrow_mut().push(Issued::ResponseAck(phase.bytes_valid));
        self.record_read(handle, phase.bytes_valid);
        self.inner.issue_response_ack(handle, phase)
    }

    async fn transact(&mut self, handle: TransactionHandle) -> Phase {
        let address = self.address(handle);
        self.log.borrow_mut().push(Issued::Transact(address));
        let phase = self.inner.transact(handle).await;
        if phase.state == PhaseState::ResponseValid {
            self.record_read(handle, phase.bytes_valid);
        }
        phase
    }
}

/// Transport answering each initiator call with a scripted list of notifications
///
/// Answers are posted immediately; an empty answer posts nothing. A `None` handle stands for
/// the handle of the call.
pub struct ScriptedTransport<'a> {
    pool: TransactionPool<2>,
    peq: &'a Queue,
    script: VecDeque<Vec<(Option<TransactionHandle>, Phase)>>,
    pub issued: Vec<Issued>,
}

impl<'a> ScriptedTransport<'a> {
    pub fn new(peq: &'a Queue) -> Self {
        Self {
            pool: TransactionPool::new(),
            peq,
            script: VecDeque::new(),
            issued: Vec::new(),
        }
    }

    /// Appends the answer to the next call.
    pub fn then(mut self, phases: &[Phase]) -> Self {
        self.script
            .push_back(phases.iter().map(|phase| (None, *phase)).collect());
        self
    }

    /// Appends an answer carrying a foreign transaction handle.
    pub fn then_foreign(mut self, handle: TransactionHandle, phase: Phase) -> Self {
        self.script.push_back(std::vec![(Some(handle), phase)]);
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }

    fn answer(&mut self, handle: TransactionHandle) {
        let answer = self.script.pop_front().expect("script exhausted");
        for (target, phase) in answer {
            let notification = Notification {
                handle: target.unwrap_or(handle),
                phase,
            };
            self.peq.post_now(notification).unwrap();
        }
    }

    fn address(&self, handle: TransactionHandle) -> u64 {
        self.pool.get(handle).unwrap().address
    }
}

impl<'a> Transport for ScriptedTransport<'a> {
    fn create_transaction(&mut self) -> Result<TransactionHandle, PoolExhausted> {
        self.pool.acquire()
    }

    fn release_transaction(&mut self, handle: TransactionHandle) {
        self.pool.release(handle)
    }

    fn with_transaction<R>(
        &mut self,
        handle: TransactionHandle,
        f: impl FnOnce(&mut Transaction) -> R,
    ) -> R {
        f(self.pool.get_mut(handle).unwrap())
    }

    fn issue_request(&mut self, handle: TransactionHandle) {
        let address = self.address(handle);
        self.issued.push(Issued::Request(address));
        self.answer(handle);
    }

    fn issue_data(&mut self, handle: TransactionHandle, phase: Phase) {
        self.issued.push(Issued::Data(phase.bytes_valid));
        self.answer(handle);
    }

    fn issue_response_ack(&mut self, handle: TransactionHandle, phase: Phase) {
        self.issued.push(Issued::ResponseAck(phase.bytes_valid));
        self.answer(handle);
    }

    async fn transact(&mut self, handle: TransactionHandle) -> Phase {
        let address = self.address(handle);
        self.issued.push(Issued::Transact(address));
        let answer = self.script.pop_front().expect("script exhausted");
        answer[0].1
    }
}
