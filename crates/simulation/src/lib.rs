//! Closed-loop trajectory-tracking simulation
//!
//! Ties the robot model and the sliding-mode controllers together:
//! - `config`: the serialisable run description
//! - `trajectory`: line and circle references
//! - `simulator`: the fixed-step control loop and SMC/AFSMC comparisons
//! - `metrics`: RMSE, chattering, energy, overshoot and settling time
//! - `batch`: serial and parallel scenario runs, robustness suite

pub mod batch;
pub mod config;
pub mod metrics;
pub mod noise;
pub mod simulator;
pub mod trace;
pub mod trajectory;

pub use batch::{
    Scenario, ScenarioOutcome, ScenarioReport, robustness_suite, run_batch, run_batch_parallel,
};
pub use config::{
    CaseConfig, CaseKind, DisturbanceConfig, Horizon, MAX_STEPS, SCHEMA_VERSION,
    SaturationPolicy, SimulationConfig, TimingConfig,
};
pub use metrics::{MetricsEngine, MetricsSummary};
pub use noise::DisturbanceSource;
pub use simulator::{ComparisonResult, RunResult, Simulator, run, run_comparison};
pub use trace::{SimulationTrace, TraceRecord};
pub use trajectory::{Reference, TrajectoryGenerator};
