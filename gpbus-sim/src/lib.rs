//! Host simulation of a gpbus master and memory slave.
//!
//! The embassy-time mock driver serves as a virtual clock. The kernel polls the simulated
//! components until they stall, then advances time by one clock cycle, so every delay in the
//! stack is measured in simulated cycles rather than wall-clock time.
//!
//! Settings are taken from environment variables:
//! * `GPBUS_BURST_LENGTH`: burst length in bytes, at most `MAX_BURST_LENGTH` (20)
//! * `GPBUS_LOOPS`: transactions per loop, 0 runs until the cycle limit (5)
//! * `GPBUS_CHUNK`: data chunk size in bytes, 0 transfers each burst at once (0)
//! * `GPBUS_RESPONSE`: `1` or `true` to require a write response (false)
//! * `GPBUS_CYCLE_LIMIT`: simulated cycles before giving up (10000000)

pub mod error;
pub mod kernel;
pub mod monitor;
pub mod scenario;
pub mod setup;

pub use error::{Result, SimError};

use anyhow::Context;
use gpbus::TransferMode;

use crate::setup::Settings;

/// Entry point shared by the simulation binaries.
pub fn main_with(mode: TransferMode) -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env().context("failed to read simulation settings")?;
    let report = scenario::run(&settings, mode).context("simulation failed")?;

    let summary = report.summary;
    log::info!(
        "writes: {} completed, {} failed; reads: {} completed, {} failed",
        summary.writes.completed,
        summary.writes.failed,
        summary.reads.completed,
        summary.reads.failed
    );
    log::info!("finished after {} us simulated", report.elapsed.as_micros());

    anyhow::ensure!(
        report.read_mismatches == 0,
        "{} of {} reads differ from the written data",
        report.read_mismatches,
        report.reads_checked
    );
    anyhow::ensure!(
        report.read_back_matches,
        "last burst read back differs from slave memory"
    );
    Ok(())
}
