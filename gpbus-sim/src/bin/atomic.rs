//! Master and memory slave exchanging blocking single-call transactions.

use gpbus::TransferMode;

fn main() -> anyhow::Result<()> {
    gpbus_sim::main_with(TransferMode::Atomic)
}
