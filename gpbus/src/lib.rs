//! # gpbus
//!
//! This library implements a split-phase burst transaction protocol between a bus initiator
//! (master) and a target (slave) in no_std environments. Transactions run through request,
//! data and optional response phases; data may move in several chunks of a burst. All storage
//! is bounded and statically sized, requiring no dynamic memory allocation.
//!
//! The library primarily targets the Embassy async framework. Time is taken from
//! `embassy-time`, so a mock time driver turns the stack into a discrete-event model.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌───────────────────────────────┐
//!                  │ Channel                       │
//! ┌────────┐       │ ┌───────────┐    ┌─────────┐  │   ┌─────────────┐
//! │ Master ├──────►├─┤ Initiator ├───►│  Inbox  ├──┼──►│ MemorySlave │
//! └────┬───┘       │ └───────────┘    └─────────┘  │   └──────┬──────┘
//!      │           │ ┌───────────────────────────┐ │          │
//!      └──────────◄┼─┤ Notification queue (PEQ)  │◄┼──────────┘
//!                  │ └───────────────────────────┘ │  TargetPort::notify
//!                  └───────────────────────────────┘
//! ```
//! Components:
//! * _Master_ is the protocol driver. It builds transactions, issues phases through a
//!   `Transport`, and consumes the answers from its notification queue. It supports a blocking
//!   single-call mode and a phase-by-phase mode.
//! * _Notification queue_ delivers `(handle, phase)` pairs in due-time order, posting order
//!   among entries due at the same instant.
//! * _Channel_ is an in-process interconnect. Its _Initiator_ side implements `Transport`,
//!   its _TargetPort_ side hands initiator calls to a target and posts the answers after a
//!   configurable latency.
//! * _MemorySlave_ is a target backed by a byte slice.
//! * _Burst segmenter_ decides how many bytes become valid at each data phase.
//!
//! ## Concurrency model
//!
//! A channel carries exactly one outstanding transaction. The master asserts its notification
//! queue is drained before each new request and each write data phase; a violation is a driver
//! bug and panics. Queue and channel state are guarded by a blocking mutex. Both
//! `CriticalSectionRawMutex` and `ThreadModeRawMutex` work; the channel requires a `Sync`
//! mutex since the target posts into the queue through a shared reference.
//!
//! ## Limitations
//!
//! * Multi-master arbitration is not supported.
//! * Transactions are never retried; a phase error aborts the current transaction only.
//! * A transaction carries at most `core::MAX_BURST_LENGTH` bytes. Larger regions take
//!   several bursts.
#![no_std]

pub use gpbus_core as core;
pub use gpbus_transport::{pool, port, time};

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod burst;
pub mod channel;
pub mod config;
pub mod master;
pub mod peq;
pub mod slave;

pub use burst::ChunkPolicy;
pub use config::{MasterConfig, SlaveConfig, TransferMode};
pub use master::{Master, Summary, TransferError};
