use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::errors::PvResult;
use crate::models::production::{Location, ProductionSample, SystemConfig};
use crate::services::solar_algorithm::{SolarModel, SolarPosition};
use crate::services::time_range::localize;

/// Irradiance at which the array delivers its rated capacity (W/m²).
const REFERENCE_IRRADIANCE: f64 = 1000.0;

fn estimate_power_kw_from_radiation(g_w_m2: f64, nominal_power_kw: f64) -> f64 {
    // P = P_nom * (G / 1000), no temperature or inverter losses
    let raw_power = nominal_power_kw * (g_w_m2 / REFERENCE_IRRADIANCE);
    if raw_power > 0.0 { raw_power } else { 0.0 }
}

pub struct ProductionCalculator<M> {
    model: M,
    location: Location,
    system: SystemConfig,
}

impl<M: SolarModel> ProductionCalculator<M> {
    pub fn new(model: M, location: Location, system: SystemConfig) -> Self {
        Self {
            model,
            location,
            system,
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn system(&self) -> &SystemConfig {
        &self.system
    }

    /// Production at a wall-clock time in the configured zone.
    pub fn at_local(&self, naive: NaiveDateTime) -> PvResult<ProductionSample> {
        let timestamp = localize(&self.location.timezone, naive)?;
        self.at(timestamp)
    }

    /// Production at one instant, reported in the configured zone.
    pub fn at(&self, timestamp: DateTime<Tz>) -> PvResult<ProductionSample> {
        let timestamp = timestamp.with_timezone(&self.location.timezone);
        let position = self
            .model
            .solar_position(&self.location, timestamp.with_timezone(&Utc))?;
        self.sample(timestamp, &position)
    }

    /// Production over `times`, keeping only samples above the negligible
    /// threshold. Order of `times` is preserved.
    pub fn over(&self, times: &[DateTime<Tz>]) -> PvResult<Vec<ProductionSample>> {
        let positions = self.model.positions(&self.location, times)?;
        let mut samples = Vec::new();
        for (t, position) in times.iter().zip(&positions) {
            let sample = self.sample(t.with_timezone(&self.location.timezone), position)?;
            if sample.is_significant() {
                samples.push(sample);
            }
        }
        tracing::debug!(
            computed = times.len(),
            kept = samples.len(),
            "filtered negligible production"
        );
        Ok(samples)
    }

    fn sample(&self, timestamp: DateTime<Tz>, position: &SolarPosition) -> PvResult<ProductionSample> {
        let clear_sky = self.model.clear_sky(position)?;
        let poa_irradiance = self
            .model
            .plane_of_array(&self.system, &clear_sky, position)?;
        let dc_power_kw = estimate_power_kw_from_radiation(poa_irradiance, self.system.capacity_kw);

        tracing::trace!(
            %timestamp,
            zenith = position.apparent_zenith_deg,
            azimuth = position.azimuth_deg,
            dni = clear_sky.dni,
            ghi = clear_sky.ghi,
            dhi = clear_sky.dhi,
            poa = poa_irradiance,
            dc_power_kw,
            "computed sample"
        );

        Ok(ProductionSample {
            timestamp,
            ghi: clear_sky.ghi.max(0.0),
            poa_irradiance: poa_irradiance.max(0.0),
            dc_power_kw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PvError;
    use crate::models::production::NEGLIGIBLE_PRODUCTION_KW;
    use crate::services::solar_algorithm::{ClearSkyIrradiance, ClearSkyModel};
    use crate::services::time_range::{Resolution, build_time_range};
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, TimeZone, Timelike};
    use chrono_tz::{Europe::Madrid, UTC};

    fn calculator(timezone: Tz) -> ProductionCalculator<ClearSkyModel> {
        ProductionCalculator::new(
            ClearSkyModel::default(),
            Location {
                latitude: 40.0,
                longitude: -3.7,
                timezone,
            },
            SystemConfig {
                capacity_kw: 5.0,
                tilt_deg: 30.0,
                azimuth_deg: 180.0,
                shortname: None,
            },
        )
    }

    fn naive(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 21)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_power_scales_with_irradiance() {
        assert_relative_eq!(estimate_power_kw_from_radiation(1000.0, 5.0), 5.0);
        assert_relative_eq!(estimate_power_kw_from_radiation(500.0, 5.0), 2.5);
        assert_eq!(estimate_power_kw_from_radiation(-3.0, 5.0), 0.0);
        assert!(estimate_power_kw_from_radiation(-0.0, 5.0).is_sign_positive());
    }

    #[test]
    fn test_solstice_noon_produces() {
        let s = calculator(UTC).at_local(naive(12, 0)).unwrap();
        assert!(s.dc_power_kw > 4.0 && s.dc_power_kw < 5.5, "dc {:.2}", s.dc_power_kw);
        assert!(s.ghi > 0.0);
        assert_relative_eq!(s.dc_power_kw, s.poa_irradiance * 5.0 / 1000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_predawn_is_zero() {
        let s = calculator(UTC).at_local(naive(2, 0)).unwrap();
        assert_eq!(s.dc_power_kw, 0.0);
        assert_eq!(s.ghi, 0.0);
        assert_eq!(s.poa_irradiance, 0.0);
    }

    #[test]
    fn test_naive_time_is_attached_not_converted() {
        let s = calculator(Madrid).at_local(naive(12, 0)).unwrap();
        assert_eq!(s.timestamp.hour(), 12);
        assert_eq!(s.timestamp.with_timezone(&Utc).hour(), 10);
    }

    #[test]
    fn test_tagged_instant_rendered_in_run_zone() {
        let utc_noon = UTC.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
        let s = calculator(Madrid).at(utc_noon).unwrap();
        assert_eq!(s.timestamp.timezone(), Madrid);
        assert_eq!(s.timestamp.hour(), 14);
    }

    #[test]
    fn test_dc_power_never_negative_over_a_day() {
        let calc = calculator(UTC);
        let day = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        for t in build_time_range(day, day, Resolution::TenMinutes, UTC).unwrap() {
            let s = calc.at(t).unwrap();
            assert!(s.dc_power_kw >= 0.0, "{}: {}", s.timestamp, s.dc_power_kw);
        }
    }

    #[test]
    fn test_range_keeps_daylight_in_order() {
        let calc = calculator(UTC);
        let day = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let times = build_time_range(day, day, Resolution::OneHour, UTC).unwrap();
        let samples = calc.over(&times).unwrap();

        assert!(samples.len() > 10 && samples.len() < 24, "{} samples", samples.len());
        assert!(samples.iter().all(|s| s.dc_power_kw > NEGLIGIBLE_PRODUCTION_KW));
        assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        let first_hour = samples[0].timestamp.hour();
        assert!((4..=7).contains(&first_hour), "first hour {first_hour}");
    }

    struct BrokenModel;

    impl SolarModel for BrokenModel {
        fn solar_position(&self, _: &Location, _: DateTime<Utc>) -> PvResult<SolarPosition> {
            Err(PvError::model("provider unavailable"))
        }

        fn clear_sky(&self, _: &SolarPosition) -> PvResult<ClearSkyIrradiance> {
            unreachable!()
        }

        fn plane_of_array(
            &self,
            _: &SystemConfig,
            _: &ClearSkyIrradiance,
            _: &SolarPosition,
        ) -> PvResult<f64> {
            unreachable!()
        }
    }

    #[test]
    fn test_model_errors_propagate() {
        let calc = ProductionCalculator::new(
            BrokenModel,
            calculator(UTC).location().clone(),
            calculator(UTC).system().clone(),
        );
        let err = calc.at_local(naive(12, 0)).unwrap_err();
        assert!(matches!(err, PvError::Model(_)));
        assert_eq!(err.to_string(), "solar model error: provider unavailable");
    }

    #[test]
    fn test_range_stops_at_first_model_error() {
        let calc = ProductionCalculator::new(
            BrokenModel,
            calculator(UTC).location().clone(),
            calculator(UTC).system().clone(),
        );
        let day = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let times = build_time_range(day, day, Resolution::OneHour, UTC).unwrap();
        assert!(matches!(calc.over(&times), Err(PvError::Model(_))));
    }
}
