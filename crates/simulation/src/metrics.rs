//! Performance metrics
//!
//! Reduces a finished trace to scalar scores. Definitions:
//! - RMSE: per error axis over every sample
//! - Overshoot: ratio, see [`overshoot`]
//! - Chattering index: mean L1 norm of consecutive body-command increments,
//!   `(1/(N-1)) Σ ‖u[k+1] - u[k]‖₁`
//! - Energy: trapezoidal integral of `‖u‖²` over time
//! - Settling time: first time after which the position error stays within
//!   the tolerance for the rest of the run

use serde::{Deserialize, Serialize};
use simcore::{SimError, SimResult, TrackingError, Velocity};

use crate::config::CaseKind;
use crate::trace::SimulationTrace;

/// Below this the initial offset is treated as zero and overshoot is undefined.
const MIN_STEP_SIZE: f64 = 1e-9;

/// Scalar scores of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Root-mean-square error per axis
    pub rmse: TrackingError,
    /// Overshoot as a ratio of the reference step, when defined
    pub overshoot: Option<f64>,
    pub chattering: f64,
    pub energy: f64,
    /// `None` if the error never settles
    pub settling_time: Option<f64>,
    /// Largest position error over the run (m)
    pub peak_position_error: f64,
    pub final_error: TrackingError,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsEngine {
    /// Position-error band for the settling time (m)
    pub settling_tolerance: f64,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self {
            settling_tolerance: 0.05,
        }
    }
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settling_tolerance(mut self, tolerance: f64) -> Self {
        self.settling_tolerance = tolerance;
        self
    }

    pub fn summarize(&self, trace: &SimulationTrace) -> SimResult<MetricsSummary> {
        let len = trace.len();
        let last = match trace.last() {
            Some(last) if len >= 2 => last,
            _ => return Err(SimError::InsufficientTrace { len }),
        };

        let times = trace.times();
        let errors = trace.errors();
        let commands = trace.commands();

        let axis = |f: fn(&TrackingError) -> f64| errors.iter().map(f).collect::<Vec<_>>();
        let rmse = TrackingError::new(
            rmse(&axis(|e| e.e_x)),
            rmse(&axis(|e| e.e_y)),
            rmse(&axis(|e| e.e_theta)),
        );

        Ok(MetricsSummary {
            rmse,
            overshoot: overshoot(trace),
            chattering: chattering_index(&commands),
            energy: control_energy(&times, &commands),
            settling_time: settling_time(&times, &errors, self.settling_tolerance),
            peak_position_error: errors.iter().map(|e| e.planar_norm()).fold(0.0, f64::max),
            final_error: last.error,
            samples: len,
        })
    }
}

/// Summarises a trace with the default engine.
pub fn summarize(trace: &SimulationTrace) -> SimResult<MetricsSummary> {
    MetricsEngine::default().summarize(trace)
}

pub fn rmse(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Mean L1 norm of consecutive command increments.
pub fn chattering_index(commands: &[Velocity]) -> f64 {
    if commands.len() < 2 {
        return 0.0;
    }
    let total: f64 = commands
        .windows(2)
        .map(|w| {
            (w[1].vx - w[0].vx).abs() + (w[1].vy - w[0].vy).abs() + (w[1].omega - w[0].omega).abs()
        })
        .sum();
    total / (commands.len() - 1) as f64
}

/// Trapezoidal integral of the squared command norm.
pub fn control_energy(times: &[f64], commands: &[Velocity]) -> f64 {
    times
        .windows(2)
        .zip(commands.windows(2))
        .map(|(t, u)| 0.5 * (t[1] - t[0]) * (u[0].norm_squared() + u[1].norm_squared()))
        .sum()
}

/// First time after which the position error stays within `tolerance`.
pub fn settling_time(times: &[f64], errors: &[TrackingError], tolerance: f64) -> Option<f64> {
    match errors.iter().rposition(|e| e.planar_norm() > tolerance) {
        None => times.first().copied(),
        Some(i) => times.get(i + 1).copied(),
    }
}

/// Largest excursion past the steady target, normalised.
///
/// Circle: distance from the centre overshooting the radius on the side
/// opposite the start, divided by the radius. Line: cross-track error
/// crossing past zero, divided by the initial cross-track offset; `None`
/// when the robot starts on the line.
pub fn overshoot(trace: &SimulationTrace) -> Option<f64> {
    let records = trace.records();
    let first = records.first()?;

    match trace.case().kind {
        CaseKind::Circle => {
            let centre = trace.case().circle_centre()?;
            let radius = trace.case().radius()?;
            let distances: Vec<f64> = records
                .iter()
                .map(|r| (r.pose.position() - centre).norm())
                .collect();
            let start = distances[0] - radius;
            let excursion = distances
                .iter()
                .map(|d| {
                    let offset = d - radius;
                    if start > MIN_STEP_SIZE {
                        -offset
                    } else if start < -MIN_STEP_SIZE {
                        offset
                    } else {
                        offset.abs()
                    }
                })
                .fold(0.0, f64::max);
            Some(excursion / radius)
        }
        CaseKind::Line => {
            let step = first.error.e_y;
            if step.abs() < MIN_STEP_SIZE {
                return None;
            }
            let excursion = records
                .iter()
                .map(|r| -step.signum() * r.error.e_y)
                .fold(0.0, f64::max);
            Some(excursion / step.abs())
        }
    }
}
