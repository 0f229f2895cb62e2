//! Wheel geometry
//!
//! Maps body velocities to the four wheel speeds through a fixed 4×3 matrix
//! and back through its Moore–Penrose pseudo-inverse. Both directions are
//! pure linear algebra; nothing here depends on time.

use nalgebra::{Matrix3x4, Matrix4x3};
use simcore::{SimError, SimResult, Velocity, WheelState};

use crate::robot::{DriveLayout, RobotConfig};

/// Singular values below this are treated as zero by the pseudo-inverse.
const PINV_EPSILON: f64 = 1e-12;

/// Forward and inverse wheel kinematics for one robot geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelGeometry {
    forward: Matrix4x3<f64>,
    inverse: Matrix3x4<f64>,
}

impl WheelGeometry {
    pub fn new(config: &RobotConfig) -> SimResult<Self> {
        let r = config.wheel_radius;
        let (l, w) = (config.half_length, config.half_width);

        let forward = match config.layout {
            DriveLayout::Mecanum => {
                let k = l + w;
                Matrix4x3::new(
                    1.0, -1.0, -k, // front-left
                    1.0, 1.0, k, // front-right
                    1.0, 1.0, -k, // rear-left
                    1.0, -1.0, k, // rear-right
                ) / r
            }
            DriveLayout::Omni => {
                // Each wheel drives perpendicular to the ray from the centre
                let d = l.hypot(w);
                Matrix4x3::new(
                    -w / d, l / d, d, // front-left at (l, w)
                    w / d, l / d, d, // front-right at (l, -w)
                    -w / d, -l / d, d, // rear-left at (-l, w)
                    w / d, -l / d, d, // rear-right at (-l, -w)
                ) / r
            }
        };

        let inverse = forward
            .pseudo_inverse(PINV_EPSILON)
            .map_err(|reason| SimError::configuration("robot geometry", reason))?;

        Ok(Self { forward, inverse })
    }

    /// Wheel angular velocities that realise `body`.
    pub fn to_wheel_velocities(&self, body: &Velocity) -> WheelState {
        WheelState::from_vector(&(self.forward * body.to_vector()))
    }

    /// Least-squares body velocity produced by `wheels`.
    pub fn to_body_velocity(&self, wheels: &WheelState) -> Velocity {
        Velocity::from_vector(&(self.inverse * wheels.to_vector()))
    }

    pub fn forward_matrix(&self) -> &Matrix4x3<f64> {
        &self.forward
    }

    pub fn inverse_matrix(&self) -> &Matrix3x4<f64> {
        &self.inverse
    }
}
