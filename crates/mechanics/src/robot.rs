use serde::{Deserialize, Serialize};
use simcore::error::{require_non_negative, require_positive, SimResult};

use crate::friction::FrictionModel;

/// How the four wheels produce body motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DriveLayout {
    /// Mecanum wheels with rollers at 45° in an X pattern
    #[default]
    Mecanum,
    /// Omni wheels at the corners, each driving tangentially about the centre
    Omni,
}

/// Represents the physical configuration and properties of the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Mass of the robot without payload in kg.
    pub mass: f64,
    /// Moment of inertia about the vertical axis (yaw) in kg*m^2.
    pub inertia: f64,
    /// Wheel radius in m.
    pub wheel_radius: f64,
    /// Distance from the centre to the front axle in m.
    pub half_length: f64,
    /// Distance from the centre to the left wheels in m.
    pub half_width: f64,
    pub layout: DriveLayout,
    /// Wheel speed time constant at nominal mass in s. Zero means the
    /// wheels follow their commands instantly.
    pub motor_time_constant: f64,
    /// Largest wheel speed the motors can deliver in rad/s.
    pub max_wheel_speed: f64,
    pub friction: FrictionModel,
    /// Extra load carried, as a fraction of `mass`.
    pub payload_fraction: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            mass: 1.8,
            inertia: 1.35,
            wheel_radius: 0.066,
            half_length: 0.153,
            half_width: 0.1405,
            layout: DriveLayout::Mecanum,
            motor_time_constant: 0.005,
            max_wheel_speed: 80.0,
            friction: FrictionModel::None,
            payload_fraction: 0.0,
        }
    }
}

impl RobotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_inertia(mut self, inertia: f64) -> Self {
        self.inertia = inertia;
        self
    }

    pub fn with_wheel_radius(mut self, radius: f64) -> Self {
        self.wheel_radius = radius;
        self
    }

    /// Set half-length and half-width
    pub fn with_dimensions(mut self, half_length: f64, half_width: f64) -> Self {
        self.half_length = half_length;
        self.half_width = half_width;
        self
    }

    pub fn with_layout(mut self, layout: DriveLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_motor_time_constant(mut self, tau: f64) -> Self {
        self.motor_time_constant = tau;
        self
    }

    pub fn with_max_wheel_speed(mut self, limit: f64) -> Self {
        self.max_wheel_speed = limit;
        self
    }

    pub fn with_friction(mut self, friction: FrictionModel) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_payload_fraction(mut self, fraction: f64) -> Self {
        self.payload_fraction = fraction;
        self
    }

    /// Mass including payload.
    pub fn total_mass(&self) -> f64 {
        self.mass * (1.0 + self.payload_fraction)
    }

    /// Yaw inertia including payload, assuming the payload sits like the chassis.
    pub fn total_inertia(&self) -> f64 {
        self.inertia * (1.0 + self.payload_fraction)
    }

    /// Distance from the centre that converts yaw rate into wheel surface speed.
    pub fn yaw_lever_arm(&self) -> f64 {
        match self.layout {
            DriveLayout::Mecanum => self.half_length + self.half_width,
            DriveLayout::Omni => self.half_length.hypot(self.half_width),
        }
    }

    /// Load inertia seen by one wheel (kg*m^2): a quarter of the body's
    /// translational and yaw inertia reflected through the wheel radius.
    pub fn reflected_wheel_inertia(&self) -> f64 {
        let lever = self.yaw_lever_arm();
        let r2 = self.wheel_radius * self.wheel_radius;
        0.25 * r2 * (self.total_mass() + self.total_inertia() / (lever * lever))
    }

    /// Wheel time constant with the payload taken into account.
    pub fn effective_time_constant(&self) -> f64 {
        self.motor_time_constant * (1.0 + self.payload_fraction)
    }

    pub fn validate(&self) -> SimResult<()> {
        require_positive("robot.mass", self.mass)?;
        require_positive("robot.inertia", self.inertia)?;
        require_positive("robot.wheel_radius", self.wheel_radius)?;
        require_positive("robot.half_length", self.half_length)?;
        require_positive("robot.half_width", self.half_width)?;
        require_positive("robot.max_wheel_speed", self.max_wheel_speed)?;
        require_non_negative("robot.motor_time_constant", self.motor_time_constant)?;
        require_non_negative("robot.payload_fraction", self.payload_fraction)?;
        self.friction.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simcore::SimError;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RobotConfig::default().validate().is_ok());
    }

    #[test]
    fn test_non_positive_mass_and_radius_rejected() {
        let err = RobotConfig::new().with_mass(0.0).validate().unwrap_err();
        assert!(matches!(err, SimError::Configuration { ref field, .. } if field == "robot.mass"));

        let err = RobotConfig::new().with_wheel_radius(-0.05).validate().unwrap_err();
        assert!(matches!(
            err,
            SimError::Configuration { ref field, .. } if field == "robot.wheel_radius"
        ));
    }

    #[test]
    fn test_payload_scales_mass_and_lag() {
        let config = RobotConfig::new()
            .with_motor_time_constant(0.01)
            .with_payload_fraction(0.2);
        assert!((config.total_mass() - 2.16).abs() < 1e-12);
        assert!((config.effective_time_constant() - 0.012).abs() < 1e-12);
        let baseline = RobotConfig::default().reflected_wheel_inertia();
        assert!(config.reflected_wheel_inertia() > baseline);
    }
}
