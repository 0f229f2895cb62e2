//! Run configuration
//!
//! A [`SimulationConfig`] is the single immutable value a front end builds
//! and hands to the simulator. It is serde-serialisable and versioned so it
//! can be persisted outside the core; [`SimulationConfig::validate`] rejects
//! bad values before any step is taken.

use std::f64::consts::PI;

use control::{ControlMode, SlidingModeConfig};
use mechanics::RobotConfig;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use simcore::error::{require_non_negative, require_positive};
use simcore::{IntegratorKind, Pose, SimError, SimResult, Velocity};

/// Current configuration schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Longest run accepted, in steps.
pub const MAX_STEPS: usize = 10_000_000;

/// Shape of the reference trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseKind {
    /// Constant-velocity straight line
    Line,
    /// Constant-rate circle
    Circle,
}

/// Reference trajectory and starting conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseConfig {
    pub kind: CaseKind,
    /// Reference pose at t = 0
    pub reference_start: Pose,
    /// Reference velocity in its own frame. A line uses `vx` and `vy`; a
    /// circle uses the forward speed `vx` and the turn rate `omega`.
    pub commanded: Velocity,
    /// Robot pose at t = 0
    pub initial_pose: Pose,
}

impl CaseConfig {
    /// Case 1: straight line from the origin at 0.2 m/s, robot starting off the path.
    pub fn line() -> Self {
        Self {
            kind: CaseKind::Line,
            reference_start: Pose::new(0.0, 0.0, 0.0),
            commanded: Velocity::new(0.2, 0.0, 0.0),
            initial_pose: Pose::new(-0.05, 0.05, 0.05),
        }
    }

    /// Case 2: 4 m circle about the origin at 2.5 m/s, robot starting outside it.
    pub fn circle() -> Self {
        Self {
            kind: CaseKind::Circle,
            reference_start: Pose::new(4.0, 0.0, PI / 2.0),
            commanded: Velocity::new(2.5, 0.0, 2.5 / 4.0),
            initial_pose: Pose::new(4.2, -0.1, PI / 2.0 + 0.1),
        }
    }

    pub fn with_reference_start(mut self, pose: Pose) -> Self {
        self.reference_start = pose;
        self
    }

    pub fn with_commanded(mut self, velocity: Velocity) -> Self {
        self.commanded = velocity;
        self
    }

    pub fn with_initial_pose(mut self, pose: Pose) -> Self {
        self.initial_pose = pose;
        self
    }

    /// Radius of the reference circle, `None` for a line.
    pub fn radius(&self) -> Option<f64> {
        match self.kind {
            CaseKind::Line => None,
            CaseKind::Circle => Some((self.commanded.vx / self.commanded.omega).abs()),
        }
    }

    /// Centre of the reference circle, `None` for a line. Left of the start
    /// pose when turning counter-clockwise.
    pub fn circle_centre(&self) -> Option<Vector2<f64>> {
        let radius = self.radius()?;
        let side = self.commanded.omega.signum();
        let theta = self.reference_start.theta;
        let normal = Vector2::new(-theta.sin(), theta.cos());
        Some(self.reference_start.position() + normal * (radius * side))
    }

    pub fn validate(&self) -> SimResult<()> {
        if !self.reference_start.is_finite() || !self.initial_pose.is_finite() {
            return Err(SimError::configuration("case", "poses must be finite"));
        }
        if !self.commanded.is_finite() {
            return Err(SimError::configuration("case.commanded", "velocity must be finite"));
        }
        match self.kind {
            CaseKind::Line if self.commanded.omega != 0.0 => Err(SimError::configuration(
                "case.commanded.omega",
                "a line reference cannot turn",
            )),
            CaseKind::Line => Ok(()),
            CaseKind::Circle => {
                require_positive("case.commanded.vx", self.commanded.vx)?;
                if self.commanded.omega == 0.0 {
                    return Err(SimError::configuration(
                        "case.commanded.omega",
                        "a circle reference needs a non-zero turn rate",
                    ));
                }
                if self.commanded.vy != 0.0 {
                    return Err(SimError::configuration(
                        "case.commanded.vy",
                        "a circle reference moves along its heading only",
                    ));
                }
                Ok(())
            }
        }
    }
}

/// When a run ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Horizon {
    /// Fixed number of integration steps
    Steps(usize),
    /// Simulated duration in seconds, rounded to whole steps
    Duration(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Integration timestep (s)
    pub dt: f64,
    pub horizon: Horizon,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            horizon: Horizon::Duration(20.0),
        }
    }
}

impl TimingConfig {
    pub fn new(dt: f64, horizon: Horizon) -> Self {
        Self { dt, horizon }
    }

    /// Number of steps; the trace holds one more sample than this.
    /// Saturates for horizons that [`validate`](Self::validate) rejects.
    pub fn steps(&self) -> usize {
        match self.horizon {
            Horizon::Steps(n) => n,
            Horizon::Duration(t) => (t / self.dt).round() as usize,
        }
    }

    /// Number of steps, or `None` past [`MAX_STEPS`].
    pub fn step_count(&self) -> Option<usize> {
        let steps = match self.horizon {
            Horizon::Steps(n) => n,
            Horizon::Duration(t) => {
                let ratio = (t / self.dt).round();
                if !ratio.is_finite() || ratio > MAX_STEPS as f64 {
                    return None;
                }
                ratio as usize
            }
        };
        (steps <= MAX_STEPS).then_some(steps)
    }

    pub fn validate(&self) -> SimResult<()> {
        require_positive("timing.dt", self.dt)?;
        if let Horizon::Duration(t) = self.horizon {
            require_positive("timing.horizon", t)?;
        }
        match self.step_count() {
            None => Err(SimError::configuration(
                "timing.horizon",
                format!("run exceeds {MAX_STEPS} steps"),
            )),
            Some(0) => Err(SimError::configuration(
                "timing.horizon",
                "must cover at least one step",
            )),
            Some(_) => Ok(()),
        }
    }
}

/// Synthetic disturbances for robustness runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisturbanceConfig {
    /// Seed of the measurement-noise generator
    pub seed: u64,
    /// Std of the Gaussian noise on measured position (m)
    pub position_noise_std: f64,
    /// Std of the Gaussian noise on measured heading (rad)
    pub heading_noise_std: f64,
    /// Amplitude of the sinusoidal lateral push on the body (m/s)
    pub push_amplitude: f64,
    /// Period of the push (s)
    pub push_period: f64,
}

impl Default for DisturbanceConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            position_noise_std: 0.0,
            heading_noise_std: 0.0,
            push_amplitude: 0.0,
            push_period: 5.0,
        }
    }
}

impl DisturbanceConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set position noise; heading noise follows at a tenth of it.
    pub fn with_sensor_noise(mut self, position_std: f64) -> Self {
        self.position_noise_std = position_std;
        self.heading_noise_std = position_std / 10.0;
        self
    }

    pub fn with_push(mut self, amplitude: f64, period: f64) -> Self {
        self.push_amplitude = amplitude;
        self.push_period = period;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        require_non_negative("disturbance.position_noise_std", self.position_noise_std)?;
        require_non_negative("disturbance.heading_noise_std", self.heading_noise_std)?;
        require_non_negative("disturbance.push_amplitude", self.push_amplitude)?;
        require_positive("disturbance.push_period", self.push_period)
    }
}

/// What to do when a wheel command exceeds the motor limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaturationPolicy {
    /// Stop the run with a saturation error
    Abort,
    /// Scale the wheels down to the limit and flag the step in the trace
    #[default]
    Clamp,
}

/// Everything needed for one closed-loop run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub schema_version: u32,
    pub robot: RobotConfig,
    pub case: CaseConfig,
    pub controller: SlidingModeConfig,
    pub timing: TimingConfig,
    pub integrator: IntegratorKind,
    pub disturbance: DisturbanceConfig,
    pub saturation: SaturationPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            robot: RobotConfig::default(),
            case: CaseConfig::line(),
            controller: SlidingModeConfig::default(),
            timing: TimingConfig::default(),
            integrator: IntegratorKind::default(),
            disturbance: DisturbanceConfig::default(),
            saturation: SaturationPolicy::default(),
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_robot(mut self, robot: RobotConfig) -> Self {
        self.robot = robot;
        self
    }

    pub fn with_case(mut self, case: CaseConfig) -> Self {
        self.case = case;
        self
    }

    pub fn with_controller(mut self, controller: SlidingModeConfig) -> Self {
        self.controller = controller;
        self
    }

    /// Switch the controller mode, keeping every other gain
    pub fn with_mode(mut self, mode: ControlMode) -> Self {
        self.controller.mode = mode;
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_integrator(mut self, integrator: IntegratorKind) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_disturbance(mut self, disturbance: DisturbanceConfig) -> Self {
        self.disturbance = disturbance;
        self
    }

    pub fn with_saturation(mut self, policy: SaturationPolicy) -> Self {
        self.saturation = policy;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(SimError::configuration(
                "schema_version",
                format!(
                    "unsupported version {} (expected {SCHEMA_VERSION})",
                    self.schema_version
                ),
            ));
        }
        self.robot.validate()?;
        self.case.validate()?;
        self.controller.validate()?;
        self.timing.validate()?;
        self.controller.validate_for_timestep(self.timing.dt)?;
        self.disturbance.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_defaults_validate() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(SimulationConfig::default().with_case(CaseConfig::circle()).validate().is_ok());
    }

    #[test]
    fn test_circle_geometry() {
        let case = CaseConfig::circle();
        assert_abs_diff_eq!(case.radius().unwrap(), 4.0, epsilon = 1e-12);
        let centre = case.circle_centre().unwrap();
        assert_abs_diff_eq!(centre[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(centre[1], 0.0, epsilon = 1e-12);
        assert!(CaseConfig::line().radius().is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let negative_dt = SimulationConfig::default()
            .with_timing(TimingConfig::new(-0.01, Horizon::Steps(10)));
        assert!(matches!(negative_dt.validate(), Err(SimError::Configuration { .. })));

        let no_steps = SimulationConfig::default()
            .with_timing(TimingConfig::new(0.01, Horizon::Steps(0)));
        assert!(no_steps.validate().is_err());

        let heavy = SimulationConfig::default().with_robot(RobotConfig::new().with_mass(-1.0));
        assert!(heavy.validate().is_err());

        let straight_circle = SimulationConfig::default().with_case(
            CaseConfig::circle().with_commanded(Velocity::new(2.5, 0.0, 0.0)),
        );
        assert!(straight_circle.validate().is_err());

        let bad_sets = control::FuzzyAdaptationConfig::default()
            .with_sets(vec![[0.0, 0.1, 0.05, 0.2, 0.3, 0.4]]);
        let fuzzy = SimulationConfig::default()
            .with_controller(SlidingModeConfig::afsmc().with_adaptation(bad_sets));
        assert!(matches!(fuzzy.validate(), Err(SimError::InvalidFuzzySet { .. })));
    }

    #[test]
    fn test_unknown_schema_version_rejected() {
        let mut config = SimulationConfig::default();
        config.schema_version = SCHEMA_VERSION + 1;
        assert!(matches!(
            config.validate(),
            Err(SimError::Configuration { ref field, .. }) if field == "schema_version"
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = SimulationConfig::default()
            .with_mode(ControlMode::Afsmc)
            .with_disturbance(DisturbanceConfig::default().with_push(0.1, 5.0));
        let json = serde_json::to_string(&config).unwrap();
        let back: SimulationConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.schema_version, SCHEMA_VERSION);
        assert_eq!(back.controller, config.controller);
        assert_eq!(back.robot, config.robot);
        assert_eq!(back.timing, config.timing);
        assert_eq!(back.disturbance, config.disturbance);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_oversized_horizon_rejected() {
        let horizon_error = |timing: TimingConfig| {
            let config = SimulationConfig::default().with_timing(timing);
            matches!(
                config.validate(),
                Err(SimError::Configuration { ref field, .. }) if field == "timing.horizon"
            )
        };
        assert!(horizon_error(TimingConfig::new(1e-300, Horizon::Duration(20.0))));
        assert!(horizon_error(TimingConfig::new(0.01, Horizon::Steps(usize::MAX))));
        assert!(horizon_error(TimingConfig::new(0.01, Horizon::Steps(MAX_STEPS + 1))));
        assert_eq!(TimingConfig::new(1e-300, Horizon::Duration(20.0)).step_count(), None);
        let longest = TimingConfig::new(0.01, Horizon::Steps(MAX_STEPS));
        assert_eq!(longest.step_count(), Some(MAX_STEPS));
    }

    #[test]
    fn test_gains_checked_against_timestep() {
        let thin = SimulationConfig::default()
            .with_controller(SlidingModeConfig::smc().with_boundary_layer(0.002));
        assert!(matches!(
            thin.validate(),
            Err(SimError::Configuration { ref field, .. }) if field == "controller.boundary_layer"
        ));

        let coarse = SimulationConfig::default()
            .with_timing(TimingConfig::new(0.05, Horizon::Duration(20.0)));
        assert!(coarse.validate().is_err());
        let fine = SimulationConfig::default()
            .with_timing(TimingConfig::new(0.02, Horizon::Duration(20.0)));
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn test_duration_rounds_to_steps() {
        assert_eq!(TimingConfig::default().steps(), 2000);
        assert_eq!(TimingConfig::new(0.01, Horizon::Duration(0.014)).steps(), 1);
    }
}
