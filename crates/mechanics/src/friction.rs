//! Wheel friction
//!
//! Friction acts on each wheel against its spin. Torques are in N·m at the
//! wheel axle; the dynamics model divides them by the load inertia seen by
//! one wheel to get a deceleration.

use serde::{Deserialize, Serialize};
use simcore::error::{require_non_negative, SimResult};

/// Below this wheel speed (rad/s) dry friction is treated as stiction and
/// produces no torque.
const STICTION_THRESHOLD: f64 = 1e-3;

/// Friction model for a driven wheel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum FrictionModel {
    /// No friction
    #[default]
    None,
    /// Coulomb (dry) friction with a constant opposing torque
    Coulomb {
        /// Kinetic friction torque (N·m)
        torque: f64,
    },
    /// Viscous friction (proportional to wheel speed)
    Viscous {
        /// Damping coefficient (N·m·s/rad)
        damping: f64,
    },
    /// Combined Coulomb + viscous friction
    Combined {
        /// Kinetic friction torque (N·m)
        torque: f64,
        /// Viscous damping coefficient (N·m·s/rad)
        damping: f64,
    },
}

impl FrictionModel {
    /// Friction torque on a wheel spinning at `wheel_speed`. Always opposes the spin.
    pub fn torque(&self, wheel_speed: f64) -> f64 {
        let dry = |torque: f64| {
            if wheel_speed.abs() < STICTION_THRESHOLD {
                0.0
            } else {
                -torque * wheel_speed.signum()
            }
        };

        match *self {
            FrictionModel::None => 0.0,
            FrictionModel::Coulomb { torque } => dry(torque),
            FrictionModel::Viscous { damping } => -damping * wheel_speed,
            FrictionModel::Combined { torque, damping } => dry(torque) - damping * wheel_speed,
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        match *self {
            FrictionModel::None => Ok(()),
            FrictionModel::Coulomb { torque } => require_non_negative("friction.torque", torque),
            FrictionModel::Viscous { damping } => {
                require_non_negative("friction.damping", damping)
            }
            FrictionModel::Combined { torque, damping } => {
                require_non_negative("friction.torque", torque)?;
                require_non_negative("friction.damping", damping)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friction_opposes_spin() {
        let combined = FrictionModel::Combined {
            torque: 0.02,
            damping: 0.001,
        };
        assert!(combined.torque(10.0) < 0.0);
        assert!(combined.torque(-10.0) > 0.0);
        assert!((combined.torque(10.0) + 0.02 + 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_coulomb_stiction_zone() {
        let coulomb = FrictionModel::Coulomb { torque: 0.05 };
        assert_eq!(coulomb.torque(0.0), 0.0);
        assert_eq!(coulomb.torque(5e-4), 0.0);
        assert!((coulomb.torque(1.0) + 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_negative_coefficients_rejected() {
        assert!(FrictionModel::Viscous { damping: -0.1 }.validate().is_err());
        assert!(FrictionModel::None.validate().is_ok());
    }
}
