use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;

use crate::services::time_range::Resolution;

/// Output below this many kW is dropped from range results.
pub const NEGLIGIBLE_PRODUCTION_KW: f64 = 0.001;

// ─── Run inputs ─────────────────────────────────────────────────────────────

/// Site the estimate is computed for. Fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Degrees north (−90 … +90)
    pub latitude: f64,
    /// Degrees east (−180 … +180)
    pub longitude: f64,
    /// Zone naive timestamps are attached to and results are rendered in
    pub timezone: Tz,
}

/// Rated PV array and its orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    /// DC capacity at 1000 W/m² (kW)
    pub capacity_kw: f64,
    /// Degrees from horizontal
    pub tilt_deg: f64,
    /// Degrees clockwise from north, 180 = south
    pub azimuth_deg: f64,
    /// Optional tag, only used as a Prometheus label
    pub shortname: Option<String>,
}

/// Which instants to compute.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpec {
    /// Wall-clock time at startup
    Now,
    /// Explicit local time in the run timezone
    At(NaiveDateTime),
    /// Whole days `start..=end` stepped by `resolution`
    Range {
        start: NaiveDate,
        end: NaiveDate,
        resolution: Resolution,
    },
}

// ─── Results ────────────────────────────────────────────────────────────────

/// Clear-sky production at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionSample {
    pub timestamp: DateTime<Tz>,
    /// Global horizontal irradiance (W/m²)
    pub ghi: f64,
    /// Plane-of-array global irradiance (W/m²)
    pub poa_irradiance: f64,
    /// DC output (kW), never negative
    pub dc_power_kw: f64,
}

impl ProductionSample {
    pub fn is_significant(&self) -> bool {
        self.dc_power_kw > NEGLIGIBLE_PRODUCTION_KW
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    Single(ProductionSample),
    /// Chronological, only samples above [`NEGLIGIBLE_PRODUCTION_KW`]
    Series(Vec<ProductionSample>),
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        match self {
            ResultSet::Single(_) => false,
            ResultSet::Series(samples) => samples.is_empty(),
        }
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<&ProductionSample> {
        match self {
            ResultSet::Single(sample) => Some(sample),
            ResultSet::Series(samples) => samples.last(),
        }
    }
}
