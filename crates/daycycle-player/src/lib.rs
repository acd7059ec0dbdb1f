//! Day cycle playback
//!
//! - [`Player`]: transport state machine over a timeline's frame range
//! - Looping, finishing and trigger suppression
//! - Reconciliation of passive players against an authority through
//!   snapshots, serial-numbered events and smoothed server-time samples

pub mod controller;
pub mod error;
pub mod guard;
pub mod player;
pub mod position;
mod replication;
pub mod samples;
pub mod settings;
pub mod snapshot;

pub use controller::*;
pub use error::*;
pub use guard::*;
pub use player::*;
pub use position::*;
pub use samples::*;
pub use settings::*;
pub use snapshot::*;
