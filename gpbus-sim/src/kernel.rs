//! Discrete-event kernel on top of the mock time driver

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use embassy_time::{Duration, Instant, MockDriver};
use futures_task::{ArcWake, waker};

use crate::error::{Result, SimError};

/// Polls at a single instant before time is forced forward
const MAX_POLLS_PER_CYCLE: u32 = 1000;

struct WakeFlag(AtomicBool);

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::SeqCst);
    }
}

/// Runs a simulation future on the virtual clock
///
/// The future is polled again at the same instant as long as it keeps waking itself. Once it
/// stalls, time advances by one cycle, firing every timer due by then. A future that never
/// stalls still sees time advance every `MAX_POLLS_PER_CYCLE` polls.
pub struct Kernel {
    time: &'static MockDriver,
    cycle: Duration,
}

impl Kernel {
    pub fn new(cycle: Duration) -> Self {
        Self {
            time: MockDriver::get(),
            cycle,
        }
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Polls `fut` to completion and returns its output with the elapsed simulated time.
    ///
    /// Fails if the future is still pending after `cycle_limit` cycles.
    pub fn run<F: Future>(&mut self, fut: F, cycle_limit: u64) -> Result<(F::Output, Duration)> {
        let flag = Arc::new(WakeFlag(AtomicBool::new(false)));
        let waker = waker(flag.clone());
        let mut cx = Context::from_waker(&waker);
        let mut fut = pin!(fut);

        let start = self.now();
        let mut cycles = 0;
        let mut polls = 0;
        loop {
            flag.0.store(false, Ordering::SeqCst);
            if let Poll::Ready(output) = fut.as_mut().poll(&mut cx) {
                return Ok((output, self.now() - start));
            }
            polls += 1;
            if flag.0.load(Ordering::SeqCst) && polls < MAX_POLLS_PER_CYCLE {
                continue;
            }
            polls = 0;

            if cycles == cycle_limit {
                return Err(SimError::Timeout(cycle_limit));
            }
            self.time.advance(self.cycle);
            cycles += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::yield_now;
    use embassy_time::Timer;

    #[test]
    fn test_timer_completes() {
        let mut kernel = Kernel::new(Duration::from_micros(1));
        let (value, elapsed) = kernel
            .run(
                async {
                    yield_now().await;
                    Timer::after(Duration::from_micros(25)).await;
                    7
                },
                1000,
            )
            .unwrap();
        assert_eq!(value, 7);
        assert!(elapsed >= Duration::from_micros(25));
    }

    #[test]
    fn test_cycle_limit() {
        let mut kernel = Kernel::new(Duration::from_micros(1));
        let result = kernel.run(core::future::pending::<()>(), 10);
        assert!(matches!(result, Err(SimError::Timeout(10))));
    }
}
