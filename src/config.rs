use std::ops::RangeInclusive;
use std::path::Path;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::cli::Cli;
use crate::errors::{PvError, PvResult};
use crate::models::production::{Location, SystemConfig, TimeSpec};
use crate::output::OutputFormat;
use crate::services::solar_algorithm::ModelParams;
use crate::services::time_range::Resolution;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub plant: PlantConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PlantConfig {
    pub shortname: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub system_capacity_kw: Option<f64>,
    pub panel_tilt: Option<f64>,
    pub panel_azimuth: Option<f64>,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub linke_turbidity: Option<f64>,
    pub albedo: Option<f64>,
    pub altitude_m: Option<f64>,
}

impl Config {
    pub fn load(path: &Path) -> PvResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PvError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|e| match e {
            PvError::Config { reason, .. } => PvError::Config {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_json(content: &str) -> PvResult<Self> {
        serde_json::from_str(content).map_err(|e| PvError::Config {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub location: Location,
    pub system: SystemConfig,
    pub model: ModelParams,
    pub time: TimeSpec,
    pub format: OutputFormat,
}

impl Settings {
    /// Merges flags over the config file, validates, and resolves the zone.
    pub fn resolve(cli: &Cli, config: &Config) -> PvResult<Self> {
        let plant = &config.plant;
        let defaults = ModelParams::default();

        let resolution: Resolution = cli.resolution.parse()?;
        let time = cli.when.to_time_spec(resolution)?;

        let latitude = required("--latitude", cli.latitude.or(plant.latitude))?;
        let longitude = required("--longitude", cli.longitude.or(plant.longitude))?;
        let capacity_kw = required(
            "--system-capacity",
            cli.system_capacity.or(plant.system_capacity_kw),
        )?;
        let tilt_deg = required("--panel-tilt", cli.panel_tilt.or(plant.panel_tilt))?;
        let azimuth_deg = required("--panel-azimuth", cli.panel_azimuth.or(plant.panel_azimuth))?;

        in_range("--latitude", latitude, -90.0..=90.0)?;
        in_range("--longitude", longitude, -180.0..=180.0)?;
        in_range("--panel-tilt", tilt_deg, 0.0..=90.0)?;
        in_range("--panel-azimuth", azimuth_deg, 0.0..=360.0)?;
        positive("--system-capacity", capacity_kw)?;

        let model = ModelParams {
            linke_turbidity: cli
                .linke_turbidity
                .or(config.model.linke_turbidity)
                .unwrap_or(defaults.linke_turbidity),
            albedo: cli.albedo.or(config.model.albedo).unwrap_or(defaults.albedo),
            altitude_m: cli
                .altitude
                .or(config.model.altitude_m)
                .unwrap_or(defaults.altitude_m),
        };
        positive("--linke-turbidity", model.linke_turbidity)?;
        in_range("--albedo", model.albedo, 0.0..=1.0)?;
        in_range("--altitude", model.altitude_m, -500.0..=9000.0)?;

        let timezone = resolve_timezone(cli.timezone.as_deref().or(plant.timezone.as_deref()))?;

        let settings = Settings {
            location: Location {
                latitude,
                longitude,
                timezone,
            },
            system: SystemConfig {
                capacity_kw,
                tilt_deg,
                azimuth_deg,
                shortname: cli.shortname.clone().or_else(|| plant.shortname.clone()),
            },
            model,
            time,
            format: cli.format,
        };
        tracing::debug!(?settings, "resolved settings");
        Ok(settings)
    }
}

fn required(flag: &str, value: Option<f64>) -> PvResult<f64> {
    value.ok_or_else(|| {
        PvError::argument(format!(
            "the following argument is required: {flag} (or set it in --config)"
        ))
    })
}

fn in_range(flag: &str, value: f64, range: RangeInclusive<f64>) -> PvResult<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(PvError::argument(format!(
            "{flag} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

fn positive(flag: &str, value: f64) -> PvResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PvError::argument(format!(
            "{flag} must be greater than 0, got {value}"
        )))
    }
}

/// Named IANA zone, or the host zone when none is given.
pub fn resolve_timezone(name: Option<&str>) -> PvResult<Tz> {
    match name {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| PvError::TimezoneResolution(name.to_string())),
        None => Ok(host_timezone()),
    }
}

fn host_timezone() -> Tz {
    match iana_time_zone::get_timezone() {
        Ok(name) => match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!("host timezone '{name}' is not a known IANA zone, using UTC");
                Tz::UTC
            }
        },
        Err(e) => {
            tracing::warn!("could not determine host timezone ({e}), using UTC");
            Tz::UTC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;

    const BASE: [(&str, &str); 6] = [
        ("--latitude", "40.0"),
        ("--longitude", "-3.7"),
        ("--system-capacity", "5.0"),
        ("--panel-tilt", "30"),
        ("--panel-azimuth", "180"),
        ("--timezone", "UTC"),
    ];

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pvcalc").chain(args.iter().copied())).unwrap()
    }

    /// BASE flags with `overrides` replacing or adding values, plus `extra`.
    fn with(overrides: &[(&str, &str)], extra: &[&str]) -> Cli {
        let mut pairs: Vec<(&str, &str)> = BASE.to_vec();
        for &(flag, value) in overrides {
            match pairs.iter_mut().find(|(f, _)| *f == flag) {
                Some(pair) => pair.1 = value,
                None => pairs.push((flag, value)),
            }
        }
        let mut args: Vec<&str> = pairs.iter().flat_map(|&(f, v)| [f, v]).collect();
        args.extend_from_slice(extra);
        cli(&args)
    }

    fn full(extra: &[&str]) -> Cli {
        with(&[], extra)
    }

    #[test]
    fn resolves_from_flags() {
        let s = Settings::resolve(&full(&["--now"]), &Config::default()).unwrap();
        assert_eq!(s.location.latitude, 40.0);
        assert_eq!(s.location.timezone, Tz::UTC);
        assert_eq!(s.system.capacity_kw, 5.0);
        assert_eq!(s.system.shortname, None);
        assert_eq!(s.model, ModelParams::default());
        assert_eq!(s.time, TimeSpec::Now);
    }

    #[test]
    fn config_file_fills_missing_flags() {
        let config = Config::from_json(
            r#"{
                "plant": {
                    "shortname": "roof",
                    "latitude": 45.07,
                    "longitude": 7.33,
                    "system_capacity_kw": 3.5,
                    "panel_tilt": 35,
                    "panel_azimuth": 170,
                    "timezone": "Europe/Rome"
                },
                "model": { "albedo": 0.3 }
            }"#,
        )
        .unwrap();
        let s = Settings::resolve(&cli(&["--now", "--panel-tilt", "20"]), &config).unwrap();
        assert_eq!(s.location.latitude, 45.07);
        assert_eq!(s.location.timezone, chrono_tz::Europe::Rome);
        assert_eq!(s.system.tilt_deg, 20.0);
        assert_eq!(s.system.azimuth_deg, 170.0);
        assert_eq!(s.system.shortname.as_deref(), Some("roof"));
        assert_eq!(s.model.albedo, 0.3);
        assert_eq!(s.model.linke_turbidity, ModelParams::default().linke_turbidity);
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let err = Config::from_json(r#"{ "plant": { "lattitude": 1.0 } }"#).unwrap_err();
        assert!(matches!(err, PvError::Config { .. }));
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let err = Config::load(Path::new("/nonexistent/pvcalc.json")).unwrap_err();
        assert!(matches!(err, PvError::Config { ref path, .. } if path == "/nonexistent/pvcalc.json"));
    }

    #[test]
    fn missing_required_value() {
        let err = Settings::resolve(&cli(&["--now", "--latitude", "40"]), &Config::default()).unwrap_err();
        assert!(matches!(err, PvError::Argument(ref m) if m.contains("--longitude")));
    }

    #[rstest]
    #[case("--latitude", "91")]
    #[case("--longitude", "-181")]
    #[case("--system-capacity", "0")]
    #[case("--system-capacity", "-2")]
    #[case("--panel-tilt", "95")]
    #[case("--panel-tilt", "-5")]
    #[case("--panel-azimuth", "-10")]
    #[case("--panel-azimuth", "361")]
    #[case("--albedo", "1.5")]
    #[case("--albedo", "-0.1")]
    #[case("--linke-turbidity", "0")]
    #[case("--linke-turbidity", "-3")]
    #[case("--altitude", "20000")]
    fn out_of_range_values_are_argument_errors(#[case] flag: &str, #[case] value: &str) {
        let err = Settings::resolve(&with(&[(flag, value)], &["--now"]), &Config::default()).unwrap_err();
        assert!(matches!(err, PvError::Argument(_)), "{flag}: {err}");
    }

    #[test]
    fn negative_capacity_reports_the_flag() {
        let err = Settings::resolve(&with(&[("--system-capacity", "-2")], &["--now"]), &Config::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "--system-capacity must be greater than 0, got -2");
    }

    #[test]
    fn unknown_timezone() {
        let err = Settings::resolve(&with(&[("--timezone", "Mars/Olympus_Mons")], &["--now"]), &Config::default())
            .unwrap_err();
        assert!(matches!(err, PvError::TimezoneResolution(ref z) if z == "Mars/Olympus_Mons"));
        assert_eq!(err.to_string(), "unknown timezone 'Mars/Olympus_Mons'");
    }

    #[test]
    fn named_timezone_resolves() {
        assert_eq!(resolve_timezone(Some("Europe/Madrid")).unwrap(), chrono_tz::Europe::Madrid);
    }

    #[test]
    fn invalid_resolution_even_without_timeframe() {
        let err = Settings::resolve(&full(&["--now", "--resolution", "2H"]), &Config::default()).unwrap_err();
        assert!(matches!(err, PvError::InvalidResolution(_)));
    }
}
