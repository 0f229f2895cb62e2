//! Sliding-mode trajectory tracking controller
//!
//! One controller with two modes sharing the same control law:
//! - `Smc`: fixed switching gain
//! - `Afsmc`: switching gain scaled each step by the hexagonal fuzzy engine
//!
//! Errors are resolved in the reference frame. Per axis the surface is
//! `s = w·e + c·ė + k_I·∫e` and the command is
//! `u = u_ff - k·s - β·tanh(s/Δ)`, then rotated into the robot's body frame.

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use simcore::error::{require_non_negative, require_positive};
use simcore::{SimContext, SimError, SimResult, TrackingError, Velocity};

use crate::fuzzy::{FuzzyAdaptationConfig, HexagonalFuzzyInferenceEngine};

/// Upper limit on the per-step loop gain, see [`SlidingModeConfig::step_gain`].
/// At or above it the discrete loop rings at half the sample rate instead of
/// settling, for any first-order wheel lag.
pub const MAX_STEP_GAIN: f64 = 2.0;

/// Controller operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlMode {
    /// Sliding mode control with a fixed switching gain
    #[default]
    Smc,
    /// Adaptive fuzzy sliding mode control
    Afsmc,
}

impl ControlMode {
    pub fn label(&self) -> &'static str {
        match self {
            ControlMode::Smc => "SMC",
            ControlMode::Afsmc => "AFSMC",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Configuration for the sliding-mode controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlidingModeConfig {
    pub mode: ControlMode,
    /// Surface weight on the error for each axis (x, y, θ)
    pub surface_weights: [f64; 3],
    /// Surface weight on the error rate (s)
    pub rate_weight: f64,
    /// Surface weight on the integrated error (1/s)
    pub integral_weight: f64,
    /// Proportional reaching gain (1/s)
    pub reaching_gain: f64,
    /// Switching gain β, in m/s for the planar axes and rad/s for heading
    pub switching_gain: f64,
    /// Boundary layer width Δ of the tanh switching function
    pub boundary_layer: f64,
    /// Error norm at or below which the switching term is off
    pub dead_zone: f64,
    /// Largest believable |s| on any axis
    pub divergence_bound: f64,
    /// Consecutive steps above `divergence_bound` before the run is abandoned
    pub divergence_patience: usize,
    /// Gain scheduling used in `Afsmc` mode
    pub adaptation: FuzzyAdaptationConfig,
}

impl Default for SlidingModeConfig {
    fn default() -> Self {
        Self {
            mode: ControlMode::Smc,
            surface_weights: [1.0, 1.0, 1.0],
            rate_weight: 0.0005,
            integral_weight: 0.0,
            reaching_gain: 1.0,
            switching_gain: 0.8,
            boundary_layer: 0.01,
            dead_zone: 5e-4,
            divergence_bound: 1e3,
            divergence_patience: 3,
            adaptation: FuzzyAdaptationConfig::default(),
        }
    }
}

impl SlidingModeConfig {
    pub fn new(mode: ControlMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn smc() -> Self {
        Self::new(ControlMode::Smc)
    }

    pub fn afsmc() -> Self {
        Self::new(ControlMode::Afsmc)
    }

    pub fn with_mode(mut self, mode: ControlMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_surface_weights(mut self, weights: [f64; 3]) -> Self {
        self.surface_weights = weights;
        self
    }

    pub fn with_rate_weight(mut self, weight: f64) -> Self {
        self.rate_weight = weight;
        self
    }

    pub fn with_integral_weight(mut self, weight: f64) -> Self {
        self.integral_weight = weight;
        self
    }

    pub fn with_reaching_gain(mut self, gain: f64) -> Self {
        self.reaching_gain = gain;
        self
    }

    pub fn with_switching_gain(mut self, gain: f64) -> Self {
        self.switching_gain = gain;
        self
    }

    pub fn with_boundary_layer(mut self, width: f64) -> Self {
        self.boundary_layer = width;
        self
    }

    pub fn with_dead_zone(mut self, radius: f64) -> Self {
        self.dead_zone = radius;
        self
    }

    /// Set the divergence bound and how many consecutive violations are tolerated
    pub fn with_divergence_limit(mut self, bound: f64, patience: usize) -> Self {
        self.divergence_bound = bound;
        self.divergence_patience = patience;
        self
    }

    pub fn with_adaptation(mut self, adaptation: FuzzyAdaptationConfig) -> Self {
        self.adaptation = adaptation;
        self
    }

    /// Largest multiplier the switching gain can take in this mode.
    pub fn peak_multiplier(&self) -> f64 {
        match self.mode {
            ControlMode::Smc => 1.0,
            ControlMode::Afsmc => self.adaptation.gain_max,
        }
    }

    /// Loop gain over one step of length `dt` at the highest frequency the
    /// sampled loop can carry.
    ///
    /// Inside the boundary layer the command slope is `k + β/Δ` per unit of
    /// surface. For an error alternating in sign every step the backward
    /// difference doubles the rate term and the integral halves, hence
    /// `(k + β/Δ)·(w·dt + 2c + k_I·dt²/2)`.
    pub fn step_gain(&self, dt: f64) -> f64 {
        let slope =
            self.reaching_gain + self.switching_gain * self.peak_multiplier() / self.boundary_layer;
        let weight = self.surface_weights.iter().fold(0.0_f64, |m, w| m.max(*w));
        slope * (weight * dt + 2.0 * self.rate_weight + 0.5 * self.integral_weight * dt * dt)
    }

    /// Rejects gains that cannot settle when sampled every `dt` seconds.
    pub fn validate_for_timestep(&self, dt: f64) -> SimResult<()> {
        self.validate()?;
        require_positive("timing.dt", dt)?;
        let gain = self.step_gain(dt);
        if gain >= MAX_STEP_GAIN {
            return Err(SimError::configuration(
                "controller.boundary_layer",
                format!(
                    "per-step loop gain {gain:.3} at dt = {dt} must stay below {MAX_STEP_GAIN}; \
                     widen the boundary layer or lower the gains"
                ),
            ));
        }
        Ok(())
    }

    pub fn validate(&self) -> SimResult<()> {
        for (axis, w) in ["x", "y", "theta"].iter().zip(self.surface_weights) {
            require_positive(&format!("controller.surface_weights.{axis}"), w)?;
        }
        require_non_negative("controller.rate_weight", self.rate_weight)?;
        require_non_negative("controller.integral_weight", self.integral_weight)?;
        require_non_negative("controller.reaching_gain", self.reaching_gain)?;
        require_non_negative("controller.switching_gain", self.switching_gain)?;
        require_positive("controller.boundary_layer", self.boundary_layer)?;
        require_non_negative("controller.dead_zone", self.dead_zone)?;
        require_positive("controller.divergence_bound", self.divergence_bound)?;
        if self.divergence_patience == 0 {
            return Err(SimError::configuration(
                "controller.divergence_patience",
                "must be at least 1",
            ));
        }
        self.adaptation.validate()
    }
}

/// Result of one control evaluation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlOutput {
    /// Body-frame velocity command
    pub command: Velocity,
    /// Sliding surface per axis (x, y, θ)
    pub surface: [f64; 3],
    /// Switching gain actually applied (zero inside the dead zone)
    pub switching_gain: f64,
    /// Fuzzy multiplier; always 1 in `Smc` mode
    pub multiplier: f64,
    pub in_dead_zone: bool,
}

impl ControlOutput {
    /// Largest surface magnitude over the three axes.
    pub fn peak_surface(&self) -> f64 {
        self.surface.iter().fold(0.0_f64, |m, s| m.max(s.abs()))
    }
}

/// Sliding-mode controller with its step-to-step memory
#[derive(Debug, Clone)]
pub struct SlidingModeController {
    config: SlidingModeConfig,
    engine: Option<HexagonalFuzzyInferenceEngine>,
    integral: [f64; 3],
    prev_error: Option<TrackingError>,
    divergence_streak: usize,
}

impl SlidingModeController {
    pub fn new(config: SlidingModeConfig) -> SimResult<Self> {
        config.validate()?;
        let engine = match config.mode {
            ControlMode::Smc => None,
            ControlMode::Afsmc => Some(HexagonalFuzzyInferenceEngine::new(&config.adaptation)?),
        };
        Ok(Self {
            config,
            engine,
            integral: [0.0; 3],
            prev_error: None,
            divergence_streak: 0,
        })
    }

    pub fn mode(&self) -> ControlMode {
        self.config.mode
    }

    pub fn config(&self) -> &SlidingModeConfig {
        &self.config
    }

    /// Integrated error per axis
    pub fn integral(&self) -> [f64; 3] {
        self.integral
    }

    /// Reset the controller memory (integral, previous error, divergence count)
    pub fn reset(&mut self) {
        self.integral = [0.0; 3];
        self.prev_error = None;
        self.divergence_streak = 0;
    }

    /// Evaluates the control law without touching the controller memory.
    ///
    /// `feedforward` is the reference velocity in the reference frame.
    pub fn control(
        &self,
        error: &TrackingError,
        error_rate: &TrackingError,
        integral: &[f64; 3],
        feedforward: &Velocity,
    ) -> SimResult<ControlOutput> {
        let cfg = &self.config;

        let multiplier = match &self.engine {
            None => 1.0,
            Some(engine) => {
                let input = cfg.adaptation.input_signal(error.norm(), error_rate.norm());
                engine.adapt(input)?
            }
        };
        let in_dead_zone = error.norm() <= cfg.dead_zone;
        let beta = if in_dead_zone {
            0.0
        } else {
            cfg.switching_gain * multiplier
        };

        let e = error.as_array();
        let de = error_rate.as_array();
        let ff = feedforward.as_array();
        let mut surface = [0.0; 3];
        let mut u = [0.0; 3];
        for i in 0..3 {
            surface[i] = cfg.surface_weights[i] * e[i]
                + cfg.rate_weight * de[i]
                + cfg.integral_weight * integral[i];
            let switching = beta * (surface[i] / cfg.boundary_layer).tanh();
            u[i] = ff[i] - cfg.reaching_gain * surface[i] - switching;
        }

        // Reference frame -> body frame
        let command = Velocity::new(u[0], u[1], u[2]).rotated(-error.e_theta);

        Ok(ControlOutput {
            command,
            surface,
            switching_gain: beta,
            multiplier,
            in_dead_zone,
        })
    }

    /// Update the controller with a new tracking error and return the command.
    ///
    /// The error rate is a backward difference against the previous call.
    pub fn update(
        &mut self,
        error: &TrackingError,
        feedforward: &Velocity,
        ctx: &SimContext,
    ) -> SimResult<ControlOutput> {
        if let Some(bad) = error.as_array().into_iter().find(|e| !e.is_finite()) {
            return Err(SimError::NumericalInstability {
                step: ctx.step,
                quantity: "tracking error",
                value: bad,
            });
        }

        let e = error.as_array();
        let rate = match self.prev_error {
            Some(prev) if ctx.dt > 0.0 => {
                let p = prev.as_array();
                TrackingError::from_array([0usize, 1, 2].map(|i| (e[i] - p[i]) / ctx.dt))
            }
            _ => TrackingError::default(),
        };
        self.prev_error = Some(*error);
        for (acc, ei) in self.integral.iter_mut().zip(e) {
            *acc += ei * ctx.dt;
        }

        let output = self
            .control(error, &rate, &self.integral, feedforward)
            .map_err(|err| match err {
                SimError::NumericalInstability { quantity, value, .. } => {
                    SimError::NumericalInstability {
                        step: ctx.step,
                        quantity,
                        value,
                    }
                }
                other => other,
            })?;

        if let Some(bad) = output.command.as_array().into_iter().find(|c| !c.is_finite()) {
            return Err(SimError::NumericalInstability {
                step: ctx.step,
                quantity: "velocity command",
                value: bad,
            });
        }

        let peak = output.peak_surface();
        if peak > self.config.divergence_bound {
            self.divergence_streak += 1;
            debug!(
                "surface {peak:.3e} above bound at step {} ({} in a row)",
                ctx.step, self.divergence_streak
            );
            if self.divergence_streak >= self.config.divergence_patience {
                warn!("{} controller diverged at step {}", self.config.mode, ctx.step);
                return Err(SimError::ControllerDivergence {
                    step: ctx.step,
                    surface: peak,
                });
            }
        } else {
            self.divergence_streak = 0;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn controller(config: SlidingModeConfig) -> SlidingModeController {
        SlidingModeController::new(config).unwrap()
    }

    #[test]
    fn test_zero_error_passes_feedforward() {
        let ctrl = controller(SlidingModeConfig::smc());
        let ff = Velocity::new(0.2, 0.0, 0.05);
        let out = ctrl
            .control(&TrackingError::default(), &TrackingError::default(), &[0.0; 3], &ff)
            .unwrap();
        assert_eq!(out.command, ff);
        assert_eq!(out.surface, [0.0; 3]);
        assert!(out.in_dead_zone);
    }

    #[test]
    fn test_switching_opposes_error() {
        let ctrl = controller(SlidingModeConfig::smc());
        let err = TrackingError::new(0.0, 0.1, 0.0);
        let out = ctrl
            .control(&err, &TrackingError::default(), &[0.0; 3], &Velocity::default())
            .unwrap();
        // u_y = -k·s - β·tanh(s/Δ), with the tanh all but saturated
        let expected = -0.1 - 0.8 * (0.1_f64 / 0.01).tanh();
        assert_abs_diff_eq!(out.command.vy, expected, epsilon = 1e-12);
        assert!(out.command.vy < -0.899);
        assert_abs_diff_eq!(out.command.vx, 0.0, epsilon = 1e-12);
        assert_eq!(out.multiplier, 1.0);
    }

    #[test]
    fn test_dead_zone_disables_switching() {
        let ctrl = controller(SlidingModeConfig::smc().with_dead_zone(1e-3));
        let err = TrackingError::new(5e-4, 0.0, 0.0);
        let out = ctrl
            .control(&err, &TrackingError::default(), &[0.0; 3], &Velocity::default())
            .unwrap();
        assert!(out.in_dead_zone);
        assert_eq!(out.switching_gain, 0.0);
        assert_abs_diff_eq!(out.command.vx, -5e-4, epsilon = 1e-12);
    }

    #[test]
    fn test_afsmc_lowers_gain_for_small_errors() {
        let smc = controller(SlidingModeConfig::smc());
        let afsmc = controller(SlidingModeConfig::afsmc());
        let err = TrackingError::new(0.01, -0.01, 0.005);
        let rate = TrackingError::default();

        let a = smc.control(&err, &rate, &[0.0; 3], &Velocity::default()).unwrap();
        let b = afsmc.control(&err, &rate, &[0.0; 3], &Velocity::default()).unwrap();
        assert!(b.multiplier < 0.3);
        assert!(b.switching_gain < a.switching_gain);

        let large = TrackingError::new(0.5, 0.5, 0.5);
        let c = afsmc.control(&large, &rate, &[0.0; 3], &Velocity::default()).unwrap();
        assert_abs_diff_eq!(c.switching_gain, a.switching_gain, epsilon = 1e-12);
    }

    #[test]
    fn test_command_rotated_into_body_frame() {
        let ctrl = controller(SlidingModeConfig::smc());
        // Robot turned +90° from the reference but otherwise on it
        let err = TrackingError::new(0.0, 0.0, PI / 2.0);
        let out = ctrl
            .control(&err, &TrackingError::default(), &[0.0; 3], &Velocity::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_abs_diff_eq!(out.command.vx, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.command.vy, -1.0, epsilon = 1e-12);
        assert!(out.command.omega < 0.0);
    }

    #[test]
    fn test_update_uses_backward_difference() {
        let mut ctrl = controller(
            SlidingModeConfig::smc()
                .with_rate_weight(0.1)
                .with_switching_gain(0.0),
        );
        let ff = Velocity::default();
        let first = ctrl
            .update(&TrackingError::new(0.1, 0.0, 0.0), &ff, &SimContext::at_step(0.01, 0))
            .unwrap();
        assert_abs_diff_eq!(first.surface[0], 0.1, epsilon = 1e-12);

        let second = ctrl
            .update(&TrackingError::new(0.08, 0.0, 0.0), &ff, &SimContext::at_step(0.01, 1))
            .unwrap();
        assert_abs_diff_eq!(second.surface[0], 0.08 + 0.1 * -2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ctrl.integral()[0], 0.0018, epsilon = 1e-12);

        ctrl.reset();
        assert_eq!(ctrl.integral(), [0.0; 3]);
    }

    #[test]
    fn test_divergence_after_patience() {
        let mut ctrl = controller(SlidingModeConfig::smc().with_divergence_limit(100.0, 3));
        let err = TrackingError::new(1e4, 0.0, 0.0);
        for step in 0..2 {
            let ctx = SimContext::at_step(0.01, step);
            assert!(ctrl.update(&err, &Velocity::default(), &ctx).is_ok());
        }
        let result = ctrl.update(&err, &Velocity::default(), &SimContext::at_step(0.01, 2));
        assert!(matches!(result, Err(SimError::ControllerDivergence { step: 2, .. })));
    }

    #[test]
    fn test_non_finite_error_reported_with_step() {
        let mut ctrl = controller(SlidingModeConfig::afsmc());
        let err = TrackingError::new(f64::NAN, 0.0, 0.0);
        let result = ctrl.update(&err, &Velocity::default(), &SimContext::at_step(0.01, 42));
        assert!(matches!(result, Err(SimError::NumericalInstability { step: 42, .. })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = SlidingModeController::new(SlidingModeConfig::smc().with_boundary_layer(0.0));
        assert!(matches!(result, Err(SimError::Configuration { .. })));

        let bad_sets = crate::fuzzy::FuzzyAdaptationConfig::default()
            .with_sets(vec![[0.3, 0.2, 0.1, 0.0, 0.0, 0.0]]);
        let config = SlidingModeConfig::afsmc().with_adaptation(bad_sets);
        let result = SlidingModeController::new(config);
        assert!(matches!(result, Err(SimError::InvalidFuzzySet { .. })));
    }

    #[test]
    fn test_default_gains_settle_at_default_timestep() {
        let smc = SlidingModeConfig::smc();
        assert!(smc.step_gain(0.01) < MAX_STEP_GAIN);
        assert!(smc.validate_for_timestep(0.01).is_ok());
        assert!(SlidingModeConfig::afsmc().validate_for_timestep(0.01).is_ok());
        // (1 + 0.8/0.01)·(0.01 + 2·0.0005)
        assert_abs_diff_eq!(smc.step_gain(0.01), 81.0 * 0.011, epsilon = 1e-12);
    }

    #[test]
    fn test_thin_boundary_layer_rejected_for_timestep() {
        let thin = SlidingModeConfig::smc().with_boundary_layer(0.002);
        assert!(thin.step_gain(0.01) > MAX_STEP_GAIN);
        let err = thin.validate_for_timestep(0.01).unwrap_err();
        assert!(matches!(
            err,
            SimError::Configuration { ref field, .. } if field == "controller.boundary_layer"
        ));
        // The same layer is fine with a finer step
        assert!(thin.validate_for_timestep(0.001).is_ok());
    }

    #[test]
    fn test_afsmc_step_gain_uses_peak_multiplier() {
        let adaptation = FuzzyAdaptationConfig::default().with_gain_range(0.25, 2.0);
        let afsmc = SlidingModeConfig::afsmc().with_adaptation(adaptation.clone());
        let smc = SlidingModeConfig::smc().with_adaptation(adaptation);
        assert!(afsmc.step_gain(0.01) > smc.step_gain(0.01));
    }
}
