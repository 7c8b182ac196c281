//! Master main action against a memory slave

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Duration;
use gpbus::channel::Channel;
use gpbus::config::{CLOCK_CYCLE, TransferMode};
use gpbus::master::{Master, Summary};
use gpbus::slave::MemorySlave;

use crate::error::Result;
use crate::kernel::Kernel;
use crate::monitor::Monitor;
use crate::setup::{MEMORY_SIZE, Settings};

const QUEUE_CAPACITY: usize = 4;

type SimChannel = Channel<CriticalSectionRawMutex, QUEUE_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub summary: Summary,
    /// Simulated time from start to the end of the read loop
    pub elapsed: Duration,
    /// Reads that completed and had their payload compared with the written data
    pub reads_checked: u32,
    /// Checked reads whose payload differs from the written data
    pub read_mismatches: u32,
    /// The last burst read back equals the slave memory at its address
    pub read_back_matches: bool,
}

/// Runs the write loop and the read loop to completion.
pub fn run(settings: &Settings, mode: TransferMode) -> Result<Report> {
    let mut channel = SimChannel::new();
    let (initiator, peq, target) = channel.split();
    let mut memory = vec![0u8; MEMORY_SIZE];
    let mut slave = MemorySlave::new(target, &mut memory, settings.slave_config());
    let config = settings.master_config(mode)?;
    let monitor = Monitor::new(initiator, config.target_address);
    let mut master = Master::new(monitor, peq, config)?;

    log::info!(
        "{:?} scenario: {} loops of {} bytes, {:?}",
        mode,
        settings.loops,
        settings.burst_length,
        settings.chunk_policy
    );

    let mut kernel = Kernel::new(CLOCK_CYCLE);
    let fut = async {
        match select(master.run(), slave.run()).await {
            Either::First(summary) => summary,
            Either::Second(_) => unreachable!(),
        }
    };
    let (summary, elapsed) = kernel.run(fut, settings.cycle_limit)?;

    let read_back_matches = last_burst(settings)
        .and_then(|range| slave.memory().get(range))
        .is_some_and(|bytes| bytes == master.data());

    let monitor = master.port();
    Ok(Report {
        summary,
        elapsed,
        reads_checked: monitor.checked(),
        read_mismatches: monitor.mismatched(),
        read_back_matches,
    })
}

fn last_burst(settings: &Settings) -> Option<std::ops::Range<usize>> {
    let last = settings.loops.checked_sub(1)?;
    let burst_length = usize::try_from(settings.burst_length).ok()?;
    let start = usize::try_from(last).ok()?.checked_mul(burst_length)?;
    Some(start..start.checked_add(burst_length)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbus::ChunkPolicy;
    use gpbus::master::LoopSummary;

    const COMPLETE: LoopSummary = LoopSummary {
        completed: 5,
        failed: 0,
    };

    #[test]
    fn test_default_phased() {
        let report = run(&Settings::default(), TransferMode::Phased).unwrap();
        assert_eq!(report.summary.writes, COMPLETE);
        assert_eq!(report.summary.reads, COMPLETE);
        assert!(report.read_back_matches);
        assert!(report.elapsed >= CLOCK_CYCLE * 20);
        assert_eq!(report.reads_checked, 5);
        assert_eq!(report.read_mismatches, 0);
    }

    #[test]
    fn test_default_atomic() {
        let report = run(&Settings::default(), TransferMode::Atomic).unwrap();
        assert_eq!(report.summary.writes, COMPLETE);
        assert_eq!(report.summary.reads, COMPLETE);
        assert!(report.read_back_matches);
        assert_eq!(report.reads_checked, 5);
        assert_eq!(report.read_mismatches, 0);
    }

    #[test]
    fn test_chunked_with_response() {
        let mut settings = Settings::default();
        settings.chunk_policy = ChunkPolicy::fixed(8).unwrap();
        settings.response_required = true;

        let report = run(&settings, TransferMode::Phased).unwrap();
        assert_eq!(report.summary.writes, COMPLETE);
        assert_eq!(report.summary.reads, COMPLETE);
        assert!(report.read_back_matches);
        assert_eq!(report.reads_checked, 5);
        assert_eq!(report.read_mismatches, 0);
    }

    #[test]
    fn test_max_burst() {
        let mut settings = Settings::default();
        settings.burst_length = gpbus::core::MAX_BURST_LENGTH as u32;
        settings.chunk_policy = ChunkPolicy::fixed(100).unwrap();

        let report = run(&settings, TransferMode::Phased).unwrap();
        assert_eq!(report.summary.reads, COMPLETE);
        assert_eq!(report.reads_checked, 5);
        assert_eq!(report.read_mismatches, 0);
    }

    #[test]
    fn test_unbounded_loops_hit_cycle_limit() {
        let mut settings = Settings::default();
        settings.loops = 0;
        settings.cycle_limit = 200;

        let err = run(&settings, TransferMode::Phased).unwrap_err();
        assert!(matches!(err, crate::SimError::Timeout(200)));
    }
}
