mod cli;
mod config;
mod errors;
mod models;
mod output;
mod services;

use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::Level;

use crate::cli::Cli;
use crate::config::{Config, Settings};
use crate::errors::PvResult;
use crate::models::production::{ResultSet, TimeSpec};
use crate::services::production_service::ProductionCalculator;
use crate::services::solar_algorithm::ClearSkyModel;
use crate::services::time_range::build_time_range;

const NO_PRODUCTION_MESSAGE: &str = "No significant production values in the specified timeframe.";

#[derive(Debug, PartialEq)]
enum Outcome {
    Rendered(String),
    /// Valid range with nothing above the negligible threshold
    NoProduction,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 if cfg!(feature = "verbose_log") => Level::DEBUG,
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {e}");
    }
}

fn run(cli: &Cli, now: DateTime<Utc>) -> PvResult<Outcome> {
    // 1. Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let settings = Settings::resolve(cli, &config)?;
    let tz = settings.location.timezone;

    // 2. Compute
    let calculator = ProductionCalculator::new(
        ClearSkyModel::new(settings.model),
        settings.location,
        settings.system,
    );
    let results = match settings.time {
        TimeSpec::Now => ResultSet::Single(calculator.at(now.with_timezone(&tz))?),
        TimeSpec::At(naive) => ResultSet::Single(calculator.at_local(naive)?),
        TimeSpec::Range {
            start,
            end,
            resolution,
        } => {
            let times = build_time_range(start, end, resolution, tz)?;
            ResultSet::Series(calculator.over(&times)?)
        }
    };

    if results.is_empty() {
        return Ok(Outcome::NoProduction);
    }

    // 3. Render
    let text = settings
        .format
        .render(&results, calculator.location(), calculator.system())?;
    Ok(Outcome::Rendered(text))
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let message = e.to_string();
            eprintln!("Error: {}", message.trim_start_matches("error: ").trim_end());
            return ExitCode::FAILURE;
        }
    };
    init_tracing(cli.verbose);

    match run(&cli, Utc::now()) {
        Ok(Outcome::Rendered(text)) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Ok(Outcome::NoProduction) => {
            println!("{NO_PRODUCTION_MESSAGE}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
