//! Day cycle static time blending
//!
//! Lets external contributors hold the apparent time of day at a fixed
//! hour, blending in and out without discontinuities.

pub mod blend;
pub mod contributor;

pub use blend::*;
pub use contributor::*;
