//! Flow Manager Core - event-driven pipeline engine
//!
//! This crate provides the orchestration logic behind the Flow Manager node:
//! - EventBus: named signals with per-run aggregate (join) signals
//! - JoinBarrier: per-run collection of aggregate constituents
//! - Orchestrator: the six-stage login pipeline wired onto the bus
//! - RunMonitor: broadcast of run lifecycle events and counters
//! - Shutdown: process signal handling for graceful stop

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod barrier;
pub mod error;
pub mod event_bus;
pub mod monitor;
pub mod orchestrator;
pub mod pipeline;
pub mod shutdown;

pub use barrier::JoinBarrier;
pub use error::{Error, Result};
pub use event_bus::{AggregateSpec, EventBus, Listener};
pub use monitor::{RunEvent, RunMonitor, RunStats};
pub use orchestrator::{DataSources, Orchestrator};
pub use pipeline::{signals, RunId, RunState, Stage};
pub use shutdown::wait_for_shutdown_signal;
