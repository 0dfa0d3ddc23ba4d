/// ============================================================
///  Clear-Sky Solar Irradiance Model
///
///  Algorithm pipeline:
///   1. Solar geometry  – NREL SPA, refraction from the standard
///                        atmosphere at site altitude
///   2. Extraterrestrial irradiance – Spencer eccentricity correction
///   3. Air mass        – Kasten & Young (1989), pressure corrected
///   4. Clear-sky model – Ineichen / Perez: DNI, GHI, DHI
///   5. Transposition   – isotropic sky, plane-of-array global
/// ============================================================

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use solar_positioning::{RefractionCorrection, spa, time::DeltaT};
use std::f64::consts::PI;

use crate::errors::{PvError, PvResult};
use crate::models::production::{Location, SystemConfig};

// ─── Physical constants ──────────────────────────────────────
const SC: f64 = 1366.1; // Solar constant W/m²
const DEG: f64 = PI / 180.0;
const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;
const AIR_TEMPERATURE_C: f64 = 12.0; // Annual mean used for refraction

pub const DEFAULT_LINKE_TURBIDITY: f64 = 3.0;
pub const DEFAULT_ALBEDO: f64 = 0.25;

/// Atmosphere and ground parameters shared by every timestamp of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    pub linke_turbidity: f64,
    pub albedo: f64,
    pub altitude_m: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            linke_turbidity: DEFAULT_LINKE_TURBIDITY,
            albedo: DEFAULT_ALBEDO,
            altitude_m: 0.0,
        }
    }
}

// ─── Public output ───────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    /// Geometric zenith (deg)
    pub zenith_deg: f64,
    /// Zenith corrected for refraction (deg)
    pub apparent_zenith_deg: f64,
    pub apparent_elevation_deg: f64,
    /// Degrees clockwise from north
    pub azimuth_deg: f64,
    pub day_of_year: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearSkyIrradiance {
    pub dni: f64,
    pub ghi: f64,
    pub dhi: f64,
}

/// Source of solar geometry and clear-sky irradiance.
pub trait SolarModel {
    fn solar_position(&self, location: &Location, at: DateTime<Utc>) -> PvResult<SolarPosition>;

    fn clear_sky(&self, position: &SolarPosition) -> PvResult<ClearSkyIrradiance>;

    /// Plane-of-array global irradiance (W/m²).
    fn plane_of_array(
        &self,
        system: &SystemConfig,
        irradiance: &ClearSkyIrradiance,
        position: &SolarPosition,
    ) -> PvResult<f64>;

    fn positions(&self, location: &Location, times: &[DateTime<Tz>]) -> PvResult<Vec<SolarPosition>> {
        times
            .iter()
            .map(|t| self.solar_position(location, t.with_timezone(&Utc)))
            .collect()
    }
}

/// Ineichen clear sky over SPA solar geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearSkyModel {
    params: ModelParams,
}

impl ClearSkyModel {
    pub fn new(params: ModelParams) -> Self {
        Self { params }
    }
}

impl SolarModel for ClearSkyModel {
    fn solar_position(&self, location: &Location, at: DateTime<Utc>) -> PvResult<SolarPosition> {
        check_coordinates(location.latitude, location.longitude)?;
        let delta_t = DeltaT::estimate_from_date(at.year(), at.month())
            .map_err(|e| PvError::model(format!("no delta T for {at}: {e}")))?;
        let pressure_hpa = altitude_to_pressure(self.params.altitude_m) / 100.0;
        let refraction = RefractionCorrection::new(pressure_hpa, AIR_TEMPERATURE_C)
            .map_err(|e| PvError::model(format!("bad atmosphere at {pressure_hpa:.1} hPa: {e}")))?;
        let pos = spa_position(
            location.latitude,
            location.longitude,
            at,
            self.params.altitude_m,
            delta_t,
            refraction,
        )?;
        finite_or_err("solar position", &[pos.apparent_zenith_deg, pos.azimuth_deg])?;
        Ok(pos)
    }

    fn clear_sky(&self, position: &SolarPosition) -> PvResult<ClearSkyIrradiance> {
        let cs = ineichen(
            position.apparent_zenith_deg,
            position.day_of_year,
            &self.params,
        );
        finite_or_err("clear-sky irradiance", &[cs.dni, cs.ghi, cs.dhi])?;
        Ok(cs)
    }

    fn plane_of_array(
        &self,
        system: &SystemConfig,
        irradiance: &ClearSkyIrradiance,
        position: &SolarPosition,
    ) -> PvResult<f64> {
        let poa = poa_global_isotropic(
            system.tilt_deg,
            system.azimuth_deg,
            irradiance,
            position,
            self.params.albedo,
        );
        finite_or_err("plane-of-array irradiance", &[poa])?;
        Ok(poa)
    }
}

fn check_coordinates(lat_deg: f64, lon_deg: f64) -> PvResult<()> {
    if !lat_deg.is_finite() || !(-90.0..=90.0).contains(&lat_deg) {
        return Err(PvError::model(format!(
            "latitude {lat_deg} outside [-90, 90]"
        )));
    }
    if !lon_deg.is_finite() || !(-180.0..=180.0).contains(&lon_deg) {
        return Err(PvError::model(format!(
            "longitude {lon_deg} outside [-180, 180]"
        )));
    }
    Ok(())
}

fn finite_or_err(what: &str, values: &[f64]) -> PvResult<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(PvError::model(format!("non-finite {what}: {values:?}")))
    }
}

// ─── 1. Solar geometry (SPA) ─────────────────────────────────
/// Geometric and refracted sun position. Azimuth is clockwise from north.
pub fn spa_position(
    lat_deg: f64,
    lon_deg: f64,
    utc: DateTime<Utc>,
    elevation_m: f64,
    delta_t: f64,
    refraction: RefractionCorrection,
) -> PvResult<SolarPosition> {
    let solve = |refraction: Option<RefractionCorrection>| {
        spa::solar_position(utc, lat_deg, lon_deg, elevation_m, delta_t, refraction)
            .map_err(|e| PvError::model(format!("solar position at {utc}: {e}")))
    };
    let geometric = solve(None)?;
    let apparent = solve(Some(refraction))?;

    Ok(SolarPosition {
        zenith_deg: geometric.zenith_angle(),
        apparent_zenith_deg: apparent.zenith_angle(),
        apparent_elevation_deg: apparent.elevation_angle(),
        azimuth_deg: apparent.azimuth(),
        day_of_year: utc.ordinal(),
    })
}

// ─── 2. Extraterrestrial irradiance ──────────────────────────
pub fn extraterrestrial_irradiance(day_of_year: u32) -> f64 {
    let b = 2.0 * PI * (day_of_year as f64 - 1.0) / 365.0;
    SC * (1.00011
        + 0.034221 * b.cos()
        + 0.00128 * b.sin()
        + 0.000719 * (2.0 * b).cos()
        + 0.000077 * (2.0 * b).sin())
}

// ─── 3. Air mass ─────────────────────────────────────────────
/// Kasten & Young relative air mass; `None` with the sun below the horizon.
pub fn relative_airmass(apparent_zenith_deg: f64) -> Option<f64> {
    if !(0.0..90.0).contains(&apparent_zenith_deg) {
        return None;
    }
    let z = apparent_zenith_deg;
    Some(1.0 / ((z * DEG).cos() + 0.50572 * (6.07995 + (90.0 - z)).powf(-1.6364)))
}

/// Standard-atmosphere pressure (Pa) at altitude.
pub fn altitude_to_pressure(altitude_m: f64) -> f64 {
    100.0 * ((44331.514 - altitude_m) / 11880.516).powf(1.0 / 0.1902632)
}

// ─── 4. Clear-sky model (Ineichen / Perez) ───────────────────
pub fn ineichen(apparent_zenith_deg: f64, day_of_year: u32, params: &ModelParams) -> ClearSkyIrradiance {
    let Some(am_rel) = relative_airmass(apparent_zenith_deg) else {
        return ClearSkyIrradiance::default();
    };
    let am = am_rel * altitude_to_pressure(params.altitude_m) / SEA_LEVEL_PRESSURE_PA;

    let tl = params.linke_turbidity;
    let alt = params.altitude_m;
    let e0 = extraterrestrial_irradiance(day_of_year);
    let cos_zen = (apparent_zenith_deg * DEG).cos().max(0.0);

    let fh1 = (-alt / 8000.0).exp();
    let fh2 = (-alt / 1250.0).exp();
    let cg1 = 5.09e-5 * alt + 0.868;
    let cg2 = 3.92e-5 * alt + 0.0387;

    let ghi = cg1 * e0 * cos_zen * (-cg2 * am * (fh1 + fh2 * (tl - 1.0))).exp().max(0.0);

    let b = 0.664 + 0.163 / fh1;
    let bnci = e0 * (b * (-0.09 * am * (tl - 1.0)).exp()).max(0.0);
    let bnci_2 = ghi
        * ((1.0 - (0.1 - 0.2 * (-tl).exp()) / (0.1 + 0.882 / fh1)) / cos_zen).clamp(0.0, 1e20);
    let dni = bnci.min(bnci_2);
    let dhi = ghi - dni * cos_zen;

    ClearSkyIrradiance { dni, ghi, dhi }
}

// ─── 5. Panel tilt / POA irradiance ──────────────────────────
pub fn cos_angle_of_incidence(
    tilt_deg: f64,
    surface_azimuth_deg: f64,
    zenith_deg: f64,
    sun_azimuth_deg: f64,
) -> f64 {
    let tilt = tilt_deg * DEG;
    let zen = zenith_deg * DEG;
    let az_diff = (sun_azimuth_deg - surface_azimuth_deg) * DEG;
    (zen.cos() * tilt.cos() + zen.sin() * tilt.sin() * az_diff.cos()).clamp(-1.0, 1.0)
}

pub fn poa_global_isotropic(
    tilt_deg: f64,
    surface_azimuth_deg: f64,
    irradiance: &ClearSkyIrradiance,
    position: &SolarPosition,
    albedo: f64,
) -> f64 {
    let cos_aoi = cos_angle_of_incidence(
        tilt_deg,
        surface_azimuth_deg,
        position.apparent_zenith_deg,
        position.azimuth_deg,
    );
    let tilt = tilt_deg * DEG;

    let beam = (irradiance.dni * cos_aoi).max(0.0);
    let sky_diffuse = irradiance.dhi * (1.0 + tilt.cos()) / 2.0;
    let ground_reflected = irradiance.ghi * albedo * (1.0 - tilt.cos()) / 2.0;

    beam + sky_diffuse + ground_reflected
}
