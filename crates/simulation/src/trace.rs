//! Time series produced by a run
//!
//! Records are appended once per step and never modified afterwards. Single
//! and comparison runs share the same column set.

use control::ControlMode;
use serde::{Deserialize, Serialize};
use simcore::{Pose, TrackingError, Velocity, WheelState};

use crate::config::CaseConfig;

/// Everything observed and commanded at one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub step: usize,
    /// Simulation time (s)
    pub time: f64,
    pub reference: Pose,
    pub pose: Pose,
    /// True tracking error, before any measurement noise
    pub error: TrackingError,
    /// Body-frame velocity requested by the controller
    pub command: Velocity,
    /// Wheel speeds sent to the motors (after clamping, if any)
    pub wheel_command: WheelState,
    /// Sliding surface per axis (x, y, θ)
    pub surface: [f64; 3],
    /// Switching gain applied at this step
    pub switching_gain: f64,
    /// The wheel command had to be clamped
    pub saturated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrace {
    case: CaseConfig,
    mode: ControlMode,
    dt: f64,
    records: Vec<TraceRecord>,
}

impl SimulationTrace {
    pub fn new(case: CaseConfig, mode: ControlMode, dt: f64) -> Self {
        Self::with_capacity(case, mode, dt, 0)
    }

    pub fn with_capacity(case: CaseConfig, mode: ControlMode, dt: f64, capacity: usize) -> Self {
        Self {
            case,
            mode,
            dt,
            records: Vec::with_capacity(capacity),
        }
    }

    /// Append the next record
    pub fn push(&mut self, record: TraceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn case(&self) -> &CaseConfig {
        &self.case
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn last(&self) -> Option<&TraceRecord> {
        self.records.last()
    }

    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.time).collect()
    }

    pub fn errors(&self) -> Vec<TrackingError> {
        self.records.iter().map(|r| r.error).collect()
    }

    pub fn commands(&self) -> Vec<Velocity> {
        self.records.iter().map(|r| r.command).collect()
    }

    pub fn poses(&self) -> Vec<Pose> {
        self.records.iter().map(|r| r.pose).collect()
    }

    /// Number of steps whose wheel command was clamped
    pub fn saturated_steps(&self) -> usize {
        self.records.iter().filter(|r| r.saturated).count()
    }
}
