//! Runs both reference cases under SMC and AFSMC, then the robustness suite,
//! and prints a JSON report on stdout. Logs go to stderr.

use std::error::Error;
use std::sync::atomic::AtomicBool;

use log::{LevelFilter, info, warn};
use serde::Serialize;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use simulation::{
    CaseConfig, MetricsSummary, ScenarioReport, SimulationConfig, robustness_suite,
    run_batch_parallel, run_comparison,
};

#[derive(Debug, Serialize)]
struct CaseReport {
    case: &'static str,
    smc: MetricsSummary,
    afsmc: MetricsSummary,
}

#[derive(Debug, Serialize)]
struct Report {
    cases: Vec<CaseReport>,
    robustness: Vec<ScenarioReport>,
}

fn log_row(label: &str, m: &MetricsSummary) {
    info!(
        "{label:<24} rmse=({:.4}, {:.4}, {:.4}) chatter={:.4} energy={:.3} settle={}",
        m.rmse.e_x,
        m.rmse.e_y,
        m.rmse.e_theta,
        m.chattering,
        m.energy,
        m.settling_time
            .map_or_else(|| "-".to_string(), |t| format!("{t:.2}s")),
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    TermLogger::init(
        LevelFilter::Info,
        log_config,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let mut cases = Vec::new();
    for (name, case) in [("line", CaseConfig::line()), ("circle", CaseConfig::circle())] {
        let config = SimulationConfig::default().with_case(case);
        let result = run_comparison(&config)?;
        log_row(&format!("{name}/SMC"), &result.smc.metrics);
        log_row(&format!("{name}/AFSMC"), &result.afsmc.metrics);
        cases.push(CaseReport {
            case: name,
            smc: result.smc.metrics,
            afsmc: result.afsmc.metrics,
        });
    }

    let scenarios = robustness_suite(&SimulationConfig::default());
    let outcomes = run_batch_parallel(&scenarios, 0, &AtomicBool::new(false));
    let robustness = outcomes
        .iter()
        .map(|outcome| {
            match &outcome.result {
                Ok(metrics) => log_row(&outcome.name, metrics),
                Err(e) => warn!("{}: {e}", outcome.name),
            }
            outcome.report()
        })
        .collect();

    let report = Report { cases, robustness };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
