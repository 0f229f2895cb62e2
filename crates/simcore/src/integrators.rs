use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::SimContext;

/// A generic explicit integration strategy.
///
/// `f(t, state)` returns the time derivative of the state; the integrator
/// evaluates it as many times as the scheme needs.
pub trait Integrator {
    /// Advances the state by one timestep.
    fn step<F>(&self, ctx: &SimContext, state: &Vector3<f64>, f: F) -> Vector3<f64>
    where
        F: Fn(f64, &Vector3<f64>) -> Vector3<f64>;
}

/// Explicit (forward) Euler integrator.
/// First-order accurate; the derivative is sampled once at the start of the step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn step<F>(&self, ctx: &SimContext, state: &Vector3<f64>, f: F) -> Vector3<f64>
    where
        F: Fn(f64, &Vector3<f64>) -> Vector3<f64>,
    {
        state + f(ctx.t, state) * ctx.dt
    }
}

/// Classic fourth-order Runge-Kutta integrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RungeKutta4;

impl Integrator for RungeKutta4 {
    fn step<F>(&self, ctx: &SimContext, state: &Vector3<f64>, f: F) -> Vector3<f64>
    where
        F: Fn(f64, &Vector3<f64>) -> Vector3<f64>,
    {
        let h = ctx.dt;
        let t = ctx.t;

        let k1 = f(t, state);
        let k2 = f(t + 0.5 * h, &(state + k1 * (0.5 * h)));
        let k3 = f(t + 0.5 * h, &(state + k2 * (0.5 * h)));
        let k4 = f(t + h, &(state + k3 * h));

        state + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
    }
}

/// Serializable selector for the integration scheme used by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegratorKind {
    ForwardEuler,
    #[default]
    RungeKutta4,
}

impl Integrator for IntegratorKind {
    fn step<F>(&self, ctx: &SimContext, state: &Vector3<f64>, f: F) -> Vector3<f64>
    where
        F: Fn(f64, &Vector3<f64>) -> Vector3<f64>,
    {
        match self {
            IntegratorKind::ForwardEuler => ForwardEuler.step(ctx, state, f),
            IntegratorKind::RungeKutta4 => RungeKutta4.step(ctx, state, f),
        }
    }
}
