//! Core types shared by the omnidirectional tracking simulator
//!
//! This crate provides:
//! - Pose, velocity, wheel and tracking-error value types
//! - The simulation error taxonomy
//! - Explicit fixed-step integrators

pub mod error;
pub mod integrators;
pub mod types;

pub use error::{SimError, SimResult};
pub use integrators::{ForwardEuler, Integrator, IntegratorKind, RungeKutta4};
pub use types::*;
