//! Day cycle timeline composition
//!
//! Builds one root timeline out of independently authored sub-timelines:
//! - Each entry is stretched to exactly one day
//! - Entries are switched on and off by boolean conditions
//! - Overlapping channels resolve by bias or weighted blend

pub mod asset;
pub mod condition;
pub mod entry;
pub mod error;
pub mod root;

pub use asset::*;
pub use condition::*;
pub use entry::*;
pub use error::*;
pub use root::*;
