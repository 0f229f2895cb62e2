//! Tracking control for omnidirectional robots
//!
//! This crate provides:
//! - Hexagonal fuzzy numbers and the fuzzy gain-scheduling engine
//! - A sliding-mode controller with fixed-gain (SMC) and fuzzy-adaptive (AFSMC) modes

pub mod fuzzy;
pub mod sliding_mode;

pub use fuzzy::*;
pub use sliding_mode::*;
