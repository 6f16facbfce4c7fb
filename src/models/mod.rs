//! Wire-format data models for the targeting console.
//!
//! These models match the backend JSON contract exactly; editable in-memory
//! shapes live in the `editor` module and are produced by the `transform`
//! module.

mod segment;
mod targeting;
mod version;

pub use segment::*;
pub use targeting::*;
pub use version::*;
