//! `season-sim`: run one simulated season and print the JSON report.
//!
//! ```text
//! season-sim [config.yaml] [--seed N]
//! ```
//!
//! Reads `economy-config.yaml` when no path is given (defaults if it does
//! not exist). Exits non-zero when any report assertion fails.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use economy_core::config::{ConfigError, EconomyConfig};
use economy_sim::{SimulationError, run_with_seed};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "economy-config.yaml";

/// Errors surfaced by the binary.
#[derive(Debug, thiserror::Error)]
enum SimCliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("report serialization error: {0}")]
    Report(#[from] serde_json::Error),

    #[error("usage: season-sim [config.yaml] [--seed N] ({0})")]
    Usage(String),
}

struct Args {
    config: PathBuf,
    seed: Option<u64>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, SimCliError> {
    let mut config = None;
    let mut seed = None;
    while let Some(arg) = args.next() {
        if arg == "--seed" {
            let value = args
                .next()
                .ok_or_else(|| SimCliError::Usage("--seed needs a value".to_owned()))?;
            let parsed = value
                .parse::<u64>()
                .map_err(|e| SimCliError::Usage(format!("bad seed {value}: {e}")))?;
            seed = Some(parsed);
        } else if config.is_none() {
            config = Some(PathBuf::from(arg));
        } else {
            return Err(SimCliError::Usage(format!("unexpected argument {arg}")));
        }
    }
    Ok(Args {
        config: config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG)),
        seed,
    })
}

fn load_config(path: &Path) -> Result<EconomyConfig, ConfigError> {
    if path.exists() {
        EconomyConfig::from_file(path)
    } else {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
        Ok(EconomyConfig::default())
    }
}

fn run() -> Result<bool, SimCliError> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config(&args.config)?;
    let seed = args.seed.unwrap_or(config.calibration.seed);

    let report = run_with_seed(&config.calibration, &config.simulation, seed)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.assertions.all_passed())
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::warn!("simulation assertions failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "season-sim failed");
            ExitCode::from(2)
        }
    }
}
