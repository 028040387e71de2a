//! Core types and constants for the posture monitor

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
