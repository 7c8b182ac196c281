//! gpbus transport interface
//!
//! The crate provides an interface between transport (interconnect) implementations and the
//! gpbus protocol stack. Limited scope facilitates compatibility across versions.
//! Transport crates should depend on this crate. gpbus users should depend on the `gpbus`
//! crate instead.
//!
//! A transport sits between one initiator and one target and carries a single outstanding
//! transaction at a time:
//! * `Transport` is the initiator-facing side: transaction pool access and one-way phase calls
//! * `Notify` is the posting side of the initiator's notification queue. Every phase outcome
//!   the transport learns about is posted there with a delivery instant
//!
//! Phase calls never block. The outcome of a call arrives later as a `Notification`, possibly
//! after a transport-controlled delay. Only the blocking `transact` call suspends the caller
//! until the whole transaction completes.

#![no_std]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod pool;
pub mod port;

pub mod time {
    pub use embassy_time::{Duration, Instant};
}
