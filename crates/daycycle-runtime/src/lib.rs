//! Day cycle runtime - hosting one node's day cycle
//!
//! This crate wires the engine crates together:
//! - Configuration loading and validation
//! - Logging setup
//! - Update interval gating
//! - The replication transport seam
//! - The [`DayCycle`] host loop

pub mod config;
pub mod daycycle;
pub mod interval;
pub mod logging;
pub mod transport;

pub use config::*;
pub use daycycle::*;
pub use interval::*;
pub use logging::*;
pub use transport::*;

pub use daycycle_compose::{AssetResolver, InMemoryAssets};
