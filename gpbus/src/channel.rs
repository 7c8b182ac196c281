//! In-process point-to-point interconnect between one initiator and one target

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_sync::waitqueue::WakerRegistration;
use heapless::Deque;

use crate::core::{Notification, Phase, PhaseState, Transaction, TransactionHandle};
use crate::peq::NotificationQueue;
use crate::pool::{PoolExhausted, TransactionPool};
use crate::port::{Notify, QueueFull, Transport};
use crate::time::{Duration, Instant};

/// Initiator call as seen by the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetEvent {
    /// A phase issued by the initiator
    Phase(Notification),
    /// A blocking transaction waiting for `TargetPort::complete`
    Transact(TransactionHandle),
}

struct State<const N: usize> {
    pool: TransactionPool<N>,
    inbox: Deque<TargetEvent, N>,
    inbox_waker: WakerRegistration,
}

impl<const N: usize> State<N> {
    fn transaction(&mut self, handle: TransactionHandle) -> &mut Transaction {
        unwrap!(self.pool.get_mut(handle), "foreign transaction handle")
    }
}

/// Point-to-point channel
///
/// Owns the initiator's notification queue, the target inbox, the transaction pool and the
/// completion signal of blocking transactions. `N` bounds the pool, the inbox and the queue.
pub struct Channel<M: RawMutex, const N: usize> {
    peq: NotificationQueue<M, N>,
    state: Mutex<M, RefCell<State<N>>>,
    completion: Signal<M, Phase>,
}

impl<M: RawMutex + Sync, const N: usize> Channel<M, N> {
    pub fn new() -> Self {
        Self {
            peq: NotificationQueue::new(),
            state: Mutex::new(RefCell::new(State {
                pool: TransactionPool::new(),
                inbox: Deque::new(),
                inbox_waker: WakerRegistration::new(),
            })),
            completion: Signal::new(),
        }
    }

    /// Splits the channel into the initiator transport, the initiator notification queue and
    /// the target port.
    pub fn split(&mut self) -> (Initiator<'_, M, N>, &NotificationQueue<M, N>, TargetPort<'_, M, N>) {
        let channel: &Self = self;
        let initiator = Initiator { channel };
        let target = TargetPort {
            channel,
            notify: &channel.peq,
        };
        (initiator, &channel.peq, target)
    }

    fn deliver(&self, event: TargetEvent) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            // The initiator waits for an answer before issuing the next call
            unwrap!(state.inbox.push_back(event), "target inbox overflow");
            state.inbox_waker.wake();
        })
    }

    fn with_transaction<R>(
        &self,
        handle: TransactionHandle,
        f: impl FnOnce(&mut Transaction) -> R,
    ) -> R {
        self.state
            .lock(|state| f(state.borrow_mut().transaction(handle)))
    }
}

impl<M: RawMutex + Sync, const N: usize> Default for Channel<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Initiator side of a channel
pub struct Initiator<'a, M: RawMutex, const N: usize> {
    channel: &'a Channel<M, N>,
}

impl<'a, M: RawMutex + Sync, const N: usize> Transport for Initiator<'a, M, N> {
    fn create_transaction(&mut self) -> Result<TransactionHandle, PoolExhausted> {
        self.channel
            .state
            .lock(|state| state.borrow_mut().pool.acquire())
    }

    fn release_transaction(&mut self, handle: TransactionHandle) {
        self.channel
            .state
            .lock(|state| state.borrow_mut().pool.release(handle))
    }

    fn with_transaction<R>(
        &mut self,
        handle: TransactionHandle,
        f: impl FnOnce(&mut Transaction) -> R,
    ) -> R {
        self.channel.with_transaction(handle, f)
    }

    fn issue_request(&mut self, handle: TransactionHandle) {
        self.channel.deliver(TargetEvent::Phase(Notification {
            handle,
            phase: Phase::new(PhaseState::RequestValid),
        }));
    }

    fn issue_data(&mut self, handle: TransactionHandle, phase: Phase) {
        self.channel
            .deliver(TargetEvent::Phase(Notification { handle, phase }));
    }

    fn issue_response_ack(&mut self, handle: TransactionHandle, phase: Phase) {
        self.channel
            .deliver(TargetEvent::Phase(Notification { handle, phase }));
    }

    async fn transact(&mut self, handle: TransactionHandle) -> Phase {
        self.channel.completion.reset();
        self.channel.deliver(TargetEvent::Transact(handle));
        self.channel.completion.wait().await
    }
}

/// Target side of a channel
pub struct TargetPort<'a, M: RawMutex, const N: usize> {
    channel: &'a Channel<M, N>,
    notify: &'a (dyn Notify + Sync),
}

impl<'a, M: RawMutex + Sync, const N: usize> TargetPort<'a, M, N> {
    /// Takes the next initiator call, if any.
    pub fn try_next(&self) -> Option<TargetEvent> {
        self.channel
            .state
            .lock(|state| state.borrow_mut().inbox.pop_front())
    }

    /// Waits for the next initiator call.
    pub async fn next(&self) -> TargetEvent {
        poll_fn(|cx| self.poll_next(cx)).await
    }

    fn poll_next(&self, cx: &mut Context<'_>) -> Poll<TargetEvent> {
        self.channel.state.lock(|state| {
            let mut state = state.borrow_mut();
            match state.inbox.pop_front() {
                Some(event) => Poll::Ready(event),
                None => {
                    state.inbox_waker.register(cx.waker());
                    Poll::Pending
                }
            }
        })
    }

    /// Gives the closure access to the transaction record while the initiator waits.
    pub fn with_transaction<R>(
        &self,
        handle: TransactionHandle,
        f: impl FnOnce(&mut Transaction) -> R,
    ) -> R {
        self.channel.with_transaction(handle, f)
    }

    /// Posts a phase outcome to the initiator, visible after `delay`.
    pub fn notify(
        &self,
        handle: TransactionHandle,
        phase: Phase,
        delay: Duration,
    ) -> Result<(), QueueFull> {
        let at = Instant::now().checked_add(delay).unwrap_or(Instant::MAX);
        self.notify.post(Notification { handle, phase }, at)
    }

    /// Completes the pending blocking transaction with its terminal phase.
    pub fn complete(&self, phase: Phase) {
        self.channel.completion.signal(phase);
    }
}
