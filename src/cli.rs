use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{ArgAction, Args, Parser};

use crate::errors::{PvError, PvResult};
use crate::models::production::TimeSpec;
use crate::output::OutputFormat;
use crate::services::time_range::{Resolution, parse_timeframe};

const TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pvcalc",
    version,
    about = "Calculate theoretical PV DC production under clear sky conditions"
)]
pub struct Cli {
    /// Location latitude
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: Option<f64>,
    /// Location longitude
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: Option<f64>,
    /// System capacity in kW
    #[arg(long, allow_hyphen_values = true)]
    pub system_capacity: Option<f64>,
    /// Panel tilt angle in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub panel_tilt: Option<f64>,
    /// Panel azimuth angle in degrees (180=South)
    #[arg(long, allow_hyphen_values = true)]
    pub panel_azimuth: Option<f64>,
    /// Timezone name (default: system timezone)
    #[arg(long)]
    pub timezone: Option<String>,
    /// Short name identifier for the system
    #[arg(long)]
    pub shortname: Option<String>,

    #[command(flatten)]
    pub when: TimeSelection,

    /// Time resolution for calculations (only with --timeframe): 1min, 10min, 20min, 30min, 1H
    #[arg(long, default_value = "1H")]
    pub resolution: String,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// JSON file with plant and model settings; flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Site altitude in metres
    #[arg(long, allow_hyphen_values = true)]
    pub altitude: Option<f64>,
    /// Ground reflectance (0-1)
    #[arg(long, allow_hyphen_values = true)]
    pub albedo: Option<f64>,
    /// Linke turbidity factor
    #[arg(long, allow_hyphen_values = true)]
    pub linke_turbidity: Option<f64>,

    /// Log to stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args, Debug, Clone, Default)]
#[group(required = true, multiple = false)]
pub struct TimeSelection {
    /// Calculate for current time
    #[arg(long)]
    pub now: bool,
    /// Specific time in format YYYY-MM-DD HH:MM
    #[arg(long)]
    pub time: Option<String>,
    /// Timeframe in format YYYY-MM-DD:YYYY-MM-DD
    #[arg(long)]
    pub timeframe: Option<String>,
}

impl TimeSelection {
    pub fn to_time_spec(&self, resolution: Resolution) -> PvResult<TimeSpec> {
        match (self.now, self.time.as_deref(), self.timeframe.as_deref()) {
            (true, None, None) => Ok(TimeSpec::Now),
            (false, Some(time), None) => parse_time(time),
            (false, None, Some(timeframe)) => {
                let (start, end) = parse_timeframe(timeframe)?;
                Ok(TimeSpec::Range {
                    start,
                    end,
                    resolution,
                })
            }
            (false, None, None) => Err(PvError::argument(
                "one of --now, --time or --timeframe is required",
            )),
            _ => Err(PvError::argument(
                "--now, --time and --timeframe are mutually exclusive",
            )),
        }
    }
}

fn parse_time(time: &str) -> PvResult<TimeSpec> {
    let time = time.trim();
    if time.eq_ignore_ascii_case("now") {
        return Ok(TimeSpec::Now);
    }
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(time, fmt).ok())
        .map(TimeSpec::At)
        .ok_or_else(|| {
            PvError::argument(format!(
                "cannot parse time '{time}', expected YYYY-MM-DD HH:MM"
            ))
        })
}
