//! Day cycle test harness - replication and convergence testing
//!
//! This crate provides:
//! - Chaos links for snapshots (latency, jitter, loss, reordering)
//! - Reliable ordered links for explicit events
//! - A multi-node simulator sharing one manual clock
//! - Standard scenario fixtures

pub mod chaos;
pub mod link;
pub mod scenarios;
pub mod simulator;

pub use chaos::*;
pub use link::*;
pub use scenarios::*;
pub use simulator::*;
