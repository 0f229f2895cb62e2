//! Batch runs
//!
//! Independent scenarios run serially or on a scoped worker pool. Every
//! scenario gets its own outcome; one failing configuration never stops the
//! others. Results come back in input order regardless of which worker ran
//! them.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use control::ControlMode;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use simcore::{SimError, SimResult};

use crate::config::SimulationConfig;
use crate::metrics::MetricsSummary;
use crate::simulator::Simulator;

/// A named configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub config: SimulationConfig,
}

impl Scenario {
    pub fn new(name: impl Into<String>, config: SimulationConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub name: String,
    pub result: SimResult<MetricsSummary>,
}

impl ScenarioOutcome {
    pub fn report(&self) -> ScenarioReport {
        ScenarioReport::from(self)
    }
}

/// Serialisable form of a [`ScenarioOutcome`], the error kept as its message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub metrics: Option<MetricsSummary>,
    pub error: Option<String>,
}

impl From<&ScenarioOutcome> for ScenarioReport {
    fn from(outcome: &ScenarioOutcome) -> Self {
        let (metrics, error) = match &outcome.result {
            Ok(metrics) => (Some(metrics.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            name: outcome.name.clone(),
            metrics,
            error,
        }
    }
}

fn run_scenario(scenario: &Scenario, cancel: &AtomicBool) -> ScenarioOutcome {
    let result = if cancel.load(Ordering::Relaxed) {
        Err(SimError::Cancelled)
    } else {
        Simulator::new(scenario.config.clone())
            .and_then(|sim| sim.run_until(cancel))
            .map(|run| run.metrics)
    };
    if let Err(e) = &result {
        warn!("scenario {} failed: {e}", scenario.name);
    }
    ScenarioOutcome {
        name: scenario.name.clone(),
        result,
    }
}

/// Runs every scenario in order on the calling thread.
pub fn run_batch(scenarios: &[Scenario]) -> Vec<ScenarioOutcome> {
    let cancel = AtomicBool::new(false);
    scenarios.iter().map(|s| run_scenario(s, &cancel)).collect()
}

/// Runs scenarios on `workers` threads (0 picks the available parallelism).
///
/// Setting `cancel` stops in-flight runs at their next step and marks every
/// scenario not yet finished as [`SimError::Cancelled`].
pub fn run_batch_parallel(
    scenarios: &[Scenario],
    workers: usize,
    cancel: &AtomicBool,
) -> Vec<ScenarioOutcome> {
    let workers = match workers {
        0 => thread::available_parallelism().map_or(1, NonZeroUsize::get),
        n => n,
    }
    .min(scenarios.len().max(1));

    info!("running {} scenarios on {workers} workers", scenarios.len());

    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<ScenarioOutcome>>> =
        scenarios.iter().map(|_| Mutex::new(None)).collect();

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(scenario) = scenarios.get(i) else {
                        break;
                    };
                    let outcome = run_scenario(scenario, cancel);
                    if let Ok(mut slot) = slots[i].lock() {
                        *slot = Some(outcome);
                    }
                }
            });
        }
    });

    slots
        .into_iter()
        .zip(scenarios)
        .map(|(slot, scenario)| {
            slot.into_inner().ok().flatten().unwrap_or_else(|| ScenarioOutcome {
                name: scenario.name.clone(),
                result: Err(SimError::Cancelled),
            })
        })
        .collect()
}

/// The robustness set: nominal, sensor noise, +20 % payload and an external
/// push, each under both controllers. Names read `"<condition>/<MODE>"`.
pub fn robustness_suite(base: &SimulationConfig) -> Vec<Scenario> {
    let conditions: [(&str, SimulationConfig); 4] = [
        ("nominal", base.clone()),
        (
            "sensor_noise",
            base.clone()
                .with_disturbance(base.disturbance.clone().with_sensor_noise(0.01)),
        ),
        (
            "payload_20",
            base.clone()
                .with_robot(base.robot.clone().with_payload_fraction(0.2)),
        ),
        (
            "external_dist",
            base.clone()
                .with_disturbance(base.disturbance.clone().with_push(0.1, 5.0)),
        ),
    ];

    conditions
        .into_iter()
        .flat_map(|(name, config)| {
            [ControlMode::Smc, ControlMode::Afsmc].map(|mode| {
                Scenario::new(format!("{name}/{}", mode.label()), config.clone().with_mode(mode))
            })
        })
        .collect()
}
