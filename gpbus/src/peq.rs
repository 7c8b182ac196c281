//! Payload event queue: timed delivery of phase notifications to the initiator

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_futures::select::select;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::waitqueue::WakerRegistration;
use embassy_time::Timer;
use heapless::Vec;

use crate::core::Notification;
use crate::port::{Notify, QueueFull};
use crate::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Entry {
    notification: Notification,
    due: Instant,
}

struct Inner<const N: usize> {
    // Sorted by due time, posting order among equal due times
    entries: Vec<Entry, N>,
    generation: u32,
    waker: WakerRegistration,
}

impl<const N: usize> Inner<N> {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
            generation: 0,
            waker: WakerRegistration::new(),
        }
    }

    fn push(&mut self, entry: Entry) -> Result<(), QueueFull> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.due > entry.due)
            .unwrap_or(self.entries.len());
        self.entries.insert(idx, entry).map_err(|_| QueueFull)?;
        self.generation = self.generation.wrapping_add(1);
        self.waker.wake();
        Ok(())
    }

    fn pop_due(&mut self, now: Instant) -> Option<Notification> {
        let front_due = self.entries.first()?.due;
        if front_due <= now {
            Some(self.entries.remove(0).notification)
        } else {
            None
        }
    }
}

/// Notification queue of a single initiator
///
/// Transports post `(handle, phase)` pairs with a delivery instant; the initiator takes them in
/// due-time order, posting order among entries due at the same instant. Entries due in the
/// future stay invisible to `try_take` until their instant passes.
///
/// The queue supports a single consumer task.
pub struct NotificationQueue<M: RawMutex, const N: usize> {
    inner: Mutex<M, RefCell<Inner<N>>>,
}

impl<M: RawMutex, const N: usize> NotificationQueue<M, N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner::new())),
        }
    }

    /// Enqueues a notification to be delivered at `due`.
    pub fn post(&self, notification: Notification, due: Instant) -> Result<(), QueueFull> {
        self.inner.lock(|inner| {
            inner.borrow_mut().push(Entry {
                notification,
                due,
            })
        })
    }

    /// Enqueues a notification that is visible immediately.
    pub fn post_now(&self, notification: Notification) -> Result<(), QueueFull> {
        self.post(notification, Instant::now())
    }

    /// Takes the earliest notification that is already due.
    pub fn try_take(&self) -> Option<Notification> {
        self.try_take_at(Instant::now())
    }

    pub(crate) fn try_take_at(&self, now: Instant) -> Option<Notification> {
        self.inner.lock(|inner| inner.borrow_mut().pop_due(now))
    }

    /// Takes the earliest notification, waiting for it to be posted and become due.
    pub async fn take(&self) -> Notification {
        loop {
            let (due, generation) = match poll_fn(|cx| self.poll_take(cx)).await {
                Ok(notification) => return notification,
                Err(pending) => pending,
            };
            // An earlier entry may be posted while waiting for the front one
            select(
                Timer::at(due),
                poll_fn(|cx| self.poll_posted(cx, generation)),
            )
            .await;
        }
    }

    /// Returns a due notification, or the due time of the front entry along with the queue
    /// generation it was observed at.
    fn poll_take(&self, cx: &mut Context<'_>) -> Poll<Result<Notification, (Instant, u32)>> {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if let Some(notification) = inner.pop_due(Instant::now()) {
                return Poll::Ready(Ok(notification));
            }
            match inner.entries.first() {
                Some(entry) => Poll::Ready(Err((entry.due, inner.generation))),
                None => {
                    inner.waker.register(cx.waker());
                    Poll::Pending
                }
            }
        })
    }

    fn poll_posted(&self, cx: &mut Context<'_>, generation: u32) -> Poll<()> {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.generation != generation {
                Poll::Ready(())
            } else {
                inner.waker.register(cx.waker());
                Poll::Pending
            }
        })
    }

    /// Returns true if no notification is pending, due or not.
    pub fn is_empty(&self) -> bool {
        self.inner.lock(|inner| inner.borrow().entries.is_empty())
    }

    pub fn len(&self) -> usize {
        self.inner.lock(|inner| inner.borrow().entries.len())
    }
}

impl<M: RawMutex, const N: usize> Default for NotificationQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const N: usize> Notify for NotificationQueue<M, N> {
    fn post(&self, notification: Notification, at: Instant) -> Result<(), QueueFull> {
        NotificationQueue::post(self, notification, at)
    }
}
