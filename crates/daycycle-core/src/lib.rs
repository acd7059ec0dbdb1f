//! Day cycle core - fundamental types and primitives
//!
//! This crate defines the core types used throughout the day-cycle engine:
//! - Frame/time model (FrameRate, FrameTime, QualifiedFrameTime)
//! - Identifiers (NodeId, OwnerId, SerialNumber, named ids)
//! - Playback status and evaluation requests
//! - Wall clocks and the shared error type

pub mod id;
pub mod time;
pub mod status;
pub mod evaluation;
pub mod clock;
pub mod error;

pub use id::*;
pub use time::*;
pub use status::*;
pub use evaluation::*;
pub use clock::*;
pub use error::*;
