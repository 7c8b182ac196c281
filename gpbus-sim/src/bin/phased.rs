//! Master and memory slave exchanging phase-by-phase transactions.

use gpbus::TransferMode;

fn main() -> anyhow::Result<()> {
    gpbus_sim::main_with(TransferMode::Phased)
}
