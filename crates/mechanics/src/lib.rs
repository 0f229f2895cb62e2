//! Mechanics of a four-wheel omnidirectional robot
//!
//! This crate provides:
//! - Robot physical configuration (geometry, inertia, motor lag, limits)
//! - Wheel kinematics (body velocity <-> wheel speeds)
//! - Wheel friction models
//! - The pose/wheel dynamics step used by the simulator

pub mod dynamics;
pub mod friction;
pub mod kinematics;
pub mod robot;

pub use dynamics::{RobotDynamicsModel, RobotState};
pub use friction::FrictionModel;
pub use kinematics::WheelGeometry;
pub use robot::{DriveLayout, RobotConfig};
