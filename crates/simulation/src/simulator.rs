//! Closed-loop simulator
//!
//! One step, in order:
//! 1. sample the reference at `t`
//! 2. compute the true tracking error and add measurement noise
//! 3. let the controller turn the measured error into a body command
//! 4. map the command to wheel speeds and apply the saturation policy
//! 5. record the step
//! 6. advance the robot to `t + dt` (skipped after the last sample)
//!
//! A run of `n` steps therefore yields `n + 1` records, starting at t = 0.

use std::sync::atomic::{AtomicBool, Ordering};

use control::{ControlMode, SlidingModeController};
use log::{debug, info, warn};
use mechanics::{RobotDynamicsModel, RobotState};
use serde::{Deserialize, Serialize};
use simcore::{SimContext, SimError, SimResult, TrackingError, WheelState};

use crate::config::{MAX_STEPS, SaturationPolicy, SimulationConfig};
use crate::metrics::{MetricsEngine, MetricsSummary};
use crate::noise::DisturbanceSource;
use crate::trace::{SimulationTrace, TraceRecord};
use crate::trajectory::TrajectoryGenerator;

/// Trace and metrics of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub trace: SimulationTrace,
    pub metrics: MetricsSummary,
}

/// SMC and AFSMC runs of the same configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub smc: RunResult,
    pub afsmc: RunResult,
}

impl ComparisonResult {
    pub fn get(&self, mode: ControlMode) -> &RunResult {
        match mode {
            ControlMode::Smc => &self.smc,
            ControlMode::Afsmc => &self.afsmc,
        }
    }
}

/// A validated configuration ready to run. Holds no per-run state, so the
/// same simulator can run any number of times with identical results.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulationConfig,
    model: RobotDynamicsModel,
    trajectory: TrajectoryGenerator,
    metrics: MetricsEngine,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let model =
            RobotDynamicsModel::new(config.robot.clone())?.with_integrator(config.integrator);
        let trajectory = TrajectoryGenerator::new(&config.case)?;
        Ok(Self {
            config,
            model,
            trajectory,
            metrics: MetricsEngine::default(),
        })
    }

    pub fn with_metrics(mut self, metrics: MetricsEngine) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn model(&self) -> &RobotDynamicsModel {
        &self.model
    }

    /// Runs to the horizon and returns the trace.
    pub fn simulate(&self) -> SimResult<SimulationTrace> {
        self.simulate_until(&AtomicBool::new(false))
    }

    /// Like [`Simulator::simulate`], but stops with [`SimError::Cancelled`]
    /// once `cancel` is set. The flag is checked before every step.
    pub fn simulate_until(&self, cancel: &AtomicBool) -> SimResult<SimulationTrace> {
        let cfg = &self.config;
        let dt = cfg.timing.dt;
        let steps = cfg.timing.step_count().ok_or_else(|| {
            SimError::configuration("timing.horizon", format!("run exceeds {MAX_STEPS} steps"))
        })?;
        let samples = steps.checked_add(1).ok_or_else(|| {
            SimError::configuration("timing.horizon", "sample count overflows")
        })?;
        let mode = cfg.controller.mode;

        info!(
            "{} run on {:?} case: {steps} steps of {dt} s",
            mode, cfg.case.kind
        );

        let mut controller = SlidingModeController::new(cfg.controller.clone())?;
        let mut disturbance = DisturbanceSource::new(&cfg.disturbance);
        let mut state = RobotState::at_rest(cfg.case.initial_pose);
        let mut trace = SimulationTrace::with_capacity(cfg.case.clone(), mode, dt, samples);
        let mut warned_saturation = false;

        for step in 0..=steps {
            if cancel.load(Ordering::Relaxed) {
                info!("{mode} run cancelled at step {step}");
                return Err(SimError::Cancelled);
            }

            let ctx = SimContext::at_step(dt, step);
            let reference = self.trajectory.reference(ctx.t);
            let error = state.pose.tracking_error(&reference.pose);
            let noise = disturbance.measurement_noise();
            let measured = TrackingError::new(
                error.e_x + noise.e_x,
                error.e_y + noise.e_y,
                simcore::wrap_angle(error.e_theta + noise.e_theta),
            );

            let output = controller.update(&measured, &reference.velocity, &ctx)?;
            let requested = self.model.to_wheel_velocities(&output.command);
            let (wheel_command, saturated) = self.apply_saturation(&requested, step)?;
            if saturated && !warned_saturation {
                warn!(
                    "{mode}: wheel command clamped to {} rad/s at step {step}",
                    self.model.config().max_wheel_speed
                );
                warned_saturation = true;
            }

            trace.push(TraceRecord {
                step,
                time: ctx.t,
                reference: reference.pose,
                pose: state.pose,
                error,
                command: output.command,
                wheel_command,
                surface: output.surface,
                switching_gain: output.switching_gain,
                saturated,
            });

            if step < steps {
                let push = disturbance.push(ctx.t);
                state = self.model.advance(&state, &wheel_command, &push, &ctx)?;
            }

            if step > 0 && step % 500 == 0 {
                debug!("{mode} step {step}: |e| = {:.3e}", error.norm());
            }
        }

        if let Some(last) = trace.last() {
            info!(
                "{mode} run finished: final |e| = {:.3e}, {} clamped steps",
                last.error.norm(),
                trace.saturated_steps()
            );
        }
        Ok(trace)
    }

    /// Runs and summarises.
    pub fn run(&self) -> SimResult<RunResult> {
        self.run_until(&AtomicBool::new(false))
    }

    pub fn run_until(&self, cancel: &AtomicBool) -> SimResult<RunResult> {
        let trace = self.simulate_until(cancel)?;
        let metrics = self.metrics.summarize(&trace)?;
        Ok(RunResult { trace, metrics })
    }

    fn apply_saturation(
        &self,
        requested: &WheelState,
        step: usize,
    ) -> SimResult<(WheelState, bool)> {
        match self.config.saturation {
            SaturationPolicy::Abort => {
                self.model.check_saturation(requested, step)?;
                Ok((*requested, false))
            }
            SaturationPolicy::Clamp => match self.model.check_saturation(requested, step) {
                Ok(()) => Ok((*requested, false)),
                Err(SimError::WheelSaturation { .. }) => {
                    Ok((self.model.clamp_wheels(requested), true))
                }
                Err(other) => Err(other),
            },
        }
    }
}

/// Validates `config` and runs it once.
pub fn run(config: &SimulationConfig) -> SimResult<RunResult> {
    Simulator::new(config.clone())?.run()
}

/// Runs `config` under both controllers with identical disturbances.
pub fn run_comparison(config: &SimulationConfig) -> SimResult<ComparisonResult> {
    let smc = run(&config.clone().with_mode(ControlMode::Smc))?;
    let afsmc = run(&config.clone().with_mode(ControlMode::Afsmc))?;
    Ok(ComparisonResult { smc, afsmc })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaseConfig, DisturbanceConfig, Horizon, TimingConfig};
    use approx::assert_abs_diff_eq;
    use mechanics::RobotConfig;
    use simcore::Pose;

    fn short(config: SimulationConfig) -> SimulationConfig {
        config.with_timing(TimingConfig::new(0.01, Horizon::Steps(200)))
    }

    #[test]
    fn test_trace_covers_horizon() {
        let trace = Simulator::new(short(SimulationConfig::default()))
            .unwrap()
            .simulate()
            .unwrap();
        assert_eq!(trace.len(), 201);
        let first = &trace.records()[0];
        assert_eq!(first.step, 0);
        assert_eq!(first.time, 0.0);
        assert_eq!(first.pose, CaseConfig::line().initial_pose);
        assert_abs_diff_eq!(trace.last().unwrap().time, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_repeated_runs_identical() {
        let config = short(SimulationConfig::default())
            .with_mode(ControlMode::Afsmc)
            .with_disturbance(
                DisturbanceConfig::default().with_sensor_noise(0.01).with_push(0.1, 5.0),
            );
        let sim = Simulator::new(config).unwrap();
        assert_eq!(sim.run().unwrap(), sim.run().unwrap());
    }

    #[test]
    fn test_noise_seed_changes_run() {
        let noisy = short(SimulationConfig::default())
            .with_disturbance(DisturbanceConfig::default().with_sensor_noise(0.01));
        let a = run(&noisy).unwrap();
        let reseeded = noisy.disturbance.clone().with_seed(9);
        let b = run(&noisy.clone().with_disturbance(reseeded)).unwrap();
        assert_ne!(a.trace, b.trace);
        // Recorded errors are true errors, so the first sample is noise-free
        assert_eq!(a.trace.records()[0].error, b.trace.records()[0].error);
    }

    #[test]
    fn test_invalid_config_rejected_before_running() {
        let bad = SimulationConfig::default()
            .with_timing(TimingConfig::new(0.0, Horizon::Steps(10)));
        assert!(matches!(Simulator::new(bad), Err(SimError::Configuration { .. })));

        let endless = SimulationConfig::default()
            .with_timing(TimingConfig::new(1e-300, Horizon::Duration(20.0)));
        assert!(matches!(
            Simulator::new(endless),
            Err(SimError::Configuration { ref field, .. }) if field == "timing.horizon"
        ));
        let unbounded = SimulationConfig::default()
            .with_timing(TimingConfig::new(0.01, Horizon::Steps(usize::MAX)));
        assert!(Simulator::new(unbounded).is_err());
    }

    #[test]
    fn test_saturation_policies() {
        let slow = RobotConfig::new().with_max_wheel_speed(2.0);
        let clamp = short(SimulationConfig::default().with_robot(slow.clone()));
        let trace = Simulator::new(clamp).unwrap().simulate().unwrap();
        assert!(trace.saturated_steps() > 0);
        for r in trace.records() {
            assert!(r.wheel_command.fastest().1 <= 2.0);
        }

        let abort = short(
            SimulationConfig::default()
                .with_robot(slow)
                .with_saturation(SaturationPolicy::Abort),
        );
        let err = Simulator::new(abort).unwrap().simulate().unwrap_err();
        assert!(matches!(err, SimError::WheelSaturation { step: 0, .. }));
    }

    #[test]
    fn test_cancel_flag_stops_run() {
        let sim = Simulator::new(short(SimulationConfig::default())).unwrap();
        let cancel = AtomicBool::new(true);
        assert_eq!(sim.simulate_until(&cancel).unwrap_err(), SimError::Cancelled);
    }

    #[test]
    fn test_starting_on_reference_stays_on_it() {
        let case = CaseConfig::line().with_initial_pose(Pose::new(0.0, 0.0, 0.0));
        let result = run(&short(SimulationConfig::default().with_case(case))).unwrap();
        // Only the wheel spin-up lag pulls it off the path
        assert!(result.metrics.peak_position_error < 0.01);
        assert!(result.metrics.overshoot.is_none());
        assert_eq!(result.trace.saturated_steps(), 0);
    }

    #[test]
    fn test_comparison_uses_both_modes() {
        let result = run_comparison(&short(SimulationConfig::default())).unwrap();
        assert_eq!(result.smc.trace.mode(), ControlMode::Smc);
        assert_eq!(result.get(ControlMode::Afsmc).trace.mode(), ControlMode::Afsmc);
        assert_eq!(result.smc.trace.len(), result.afsmc.trace.len());
    }
}
