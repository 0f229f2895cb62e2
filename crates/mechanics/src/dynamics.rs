//! Robot dynamics
//!
//! Turns wheel commands into pose evolution. Two entry points:
//! - [`RobotDynamicsModel::step`]: ideal wheels, pose only
//! - [`RobotDynamicsModel::advance`]: first-order wheel lag with friction and
//!   an optional body-velocity disturbance
//!
//! The model keeps no state between calls; everything that evolves lives in
//! [`RobotState`].

use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use simcore::{
    Integrator, IntegratorKind, Pose, SimContext, SimError, SimResult, Velocity, WheelState,
};

use crate::kinematics::WheelGeometry;
use crate::robot::RobotConfig;

/// Pose plus the wheel speeds actually reached by the motors.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotState {
    pub pose: Pose,
    pub wheels: WheelState,
}

impl RobotState {
    /// A robot at rest at `pose`.
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            pose,
            wheels: WheelState::default(),
        }
    }
}

/// Four-wheel omnidirectional robot model.
#[derive(Debug, Clone)]
pub struct RobotDynamicsModel {
    config: RobotConfig,
    geometry: WheelGeometry,
    integrator: IntegratorKind,
}

impl RobotDynamicsModel {
    pub fn new(config: RobotConfig) -> SimResult<Self> {
        config.validate()?;
        let geometry = WheelGeometry::new(&config)?;
        Ok(Self {
            config,
            geometry,
            integrator: IntegratorKind::default(),
        })
    }

    /// Set the pose integration scheme
    pub fn with_integrator(mut self, integrator: IntegratorKind) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn integrator(&self) -> IntegratorKind {
        self.integrator
    }

    pub fn to_wheel_velocities(&self, body: &Velocity) -> WheelState {
        self.geometry.to_wheel_velocities(body)
    }

    pub fn to_body_velocity(&self, wheels: &WheelState) -> Velocity {
        self.geometry.to_body_velocity(wheels)
    }

    /// Fails if any wheel command is non-finite or above the speed limit.
    pub fn check_saturation(&self, wheels: &WheelState, step: usize) -> SimResult<()> {
        if let Some(bad) = wheels.speeds.iter().find(|s| !s.is_finite()) {
            return Err(SimError::NumericalInstability {
                step,
                quantity: "wheel command",
                value: *bad,
            });
        }
        let (wheel, speed) = wheels.fastest();
        if speed > self.config.max_wheel_speed {
            return Err(SimError::WheelSaturation {
                step,
                wheel,
                speed,
                limit: self.config.max_wheel_speed,
            });
        }
        Ok(())
    }

    /// Scales all four wheels by the same factor so the fastest one sits at
    /// the limit. The direction of body motion is preserved.
    pub fn clamp_wheels(&self, wheels: &WheelState) -> WheelState {
        let (_, fastest) = wheels.fastest();
        if fastest <= self.config.max_wheel_speed {
            return *wheels;
        }
        let limit = self.config.max_wheel_speed;
        let scale = limit / fastest;
        WheelState::new(wheels.speeds.map(|s| (s * scale).clamp(-limit, limit)))
    }

    /// Advances `pose` by one step assuming the wheels turn exactly at `wheel_command`.
    pub fn step(
        &self,
        pose: &Pose,
        wheel_command: &WheelState,
        ctx: &SimContext,
    ) -> SimResult<Pose> {
        self.check_saturation(wheel_command, ctx.step)?;
        let body = self.to_body_velocity(wheel_command);
        self.integrate_pose(pose, &body, ctx)
    }

    /// Advances the full robot state: wheel lag first, then the pose with the
    /// new wheel speeds plus `disturbance`.
    pub fn advance(
        &self,
        state: &RobotState,
        wheel_command: &WheelState,
        disturbance: &Velocity,
        ctx: &SimContext,
    ) -> SimResult<RobotState> {
        self.check_saturation(wheel_command, ctx.step)?;

        let wheels = self.lag_wheels(&state.wheels, wheel_command, ctx.dt);
        let body = self.to_body_velocity(&wheels) + *disturbance;
        let pose = self.integrate_pose(&state.pose, &body, ctx)?;

        Ok(RobotState { pose, wheels })
    }

    /// Exact discretisation of tau·dω/dt = ω_cmd - ω + tau·T_f(ω)/J, with the
    /// friction torque held at its start-of-step value.
    fn lag_wheels(&self, current: &WheelState, command: &WheelState, dt: f64) -> WheelState {
        let tau = self.config.effective_time_constant();
        if tau <= 0.0 {
            return *command;
        }
        let inertia = self.config.reflected_wheel_inertia();
        let decay = (-dt / tau).exp();

        let mut next = *command;
        for (i, speed) in next.speeds.iter_mut().enumerate() {
            let now = current.speeds[i];
            let steady = command.speeds[i] + tau * self.config.friction.torque(now) / inertia;
            *speed = steady + (now - steady) * decay;
        }
        next
    }

    fn integrate_pose(&self, pose: &Pose, body: &Velocity, ctx: &SimContext) -> SimResult<Pose> {
        let v = *body;
        let next = self.integrator.step(ctx, &pose.to_vector(), |_, s| {
            let world = v.to_world(s[2]);
            Vector3::new(world[0], world[1], v.omega)
        });

        let pose = Pose::from_vector(&next);
        if let Some(bad) = [pose.x, pose.y, pose.theta].into_iter().find(|c| !c.is_finite()) {
            debug!("pose integration produced {bad} at step {}", ctx.step);
            return Err(SimError::NumericalInstability {
                step: ctx.step,
                quantity: "pose",
                value: bad,
            });
        }
        Ok(pose)
    }
}
