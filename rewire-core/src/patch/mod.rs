//! Wiring patch engine: scans migrated source for structural references to
//! unknown classes and rewires or ports them.

pub mod patterns;
pub mod wiring;

pub use wiring::{FixOutcome, WiringPatcher};
