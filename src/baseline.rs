//! Location-seeded baseline used whenever measured data is missing
//!
//! Aggregation, forecasting and history all derive synthetic values from
//! here, so a location always maps to the same baseline AQI and the same
//! pseudo-random perturbations.

use crate::aqi::AqiCalculator;
use crate::config::SeedMode;
use crate::models::air_quality::{AQI_MAX, AQI_MIN};
use crate::models::{Location, Parameter, PollutantReading, Source};
use chrono::{DateTime, Datelike, Utc};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Coordinates are rounded to this many decimals before seeding
const SEED_PRECISION: u32 = 2;
/// Largest share of a category band a synthetic value may move down from its top
const MAX_JITTER: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct BaselineModel {
    calculator: AqiCalculator,
    seed_mode: SeedMode,
}

impl BaselineModel {
    #[must_use]
    pub fn new(calculator: AqiCalculator, seed_mode: SeedMode) -> Self {
        Self {
            calculator,
            seed_mode,
        }
    }

    #[must_use]
    pub fn calculator(&self) -> &AqiCalculator {
        &self.calculator
    }

    /// Reproducible "urban factor" in `[0, 3)`
    #[must_use]
    pub fn urban_factor(&self, location: &Location) -> f64 {
        let seed = self.seed(location, "urban", 0);
        (seed % 3000) as f64 / 1000.0
    }

    /// Baseline AQI in `[2, 4]` derived from the urban factor
    #[must_use]
    pub fn baseline_aqi(&self, location: &Location) -> u8 {
        2 + self.urban_factor(location).floor() as u8
    }

    /// Random stream keyed by location, purpose and day offset
    #[must_use]
    pub fn rng(&self, location: &Location, stream: &str, offset: i64) -> StdRng {
        StdRng::seed_from_u64(self.seed(location, stream, offset))
    }

    /// Synthetic reading for one parameter, consistent with the baseline AQI
    #[must_use]
    pub fn mock_reading(
        &self,
        location: &Location,
        parameter: Parameter,
        observed_at: DateTime<Utc>,
    ) -> PollutantReading {
        let aqi = self.baseline_aqi(location);
        let mut rng = self.rng(location, parameter.as_str(), 0);
        let value = self.level(parameter, aqi, &mut rng);
        PollutantReading::new(parameter, value, Source::MockData, observed_at)
    }

    /// Pollutant levels that all map to `aqi`
    pub fn levels_for(
        &self,
        parameters: &[Parameter],
        aqi: u8,
        rng: &mut StdRng,
    ) -> BTreeMap<Parameter, f64> {
        parameters
            .iter()
            .map(|&parameter| (parameter, self.level(parameter, aqi, rng)))
            .collect()
    }

    /// Baseline shifted by a delta drawn uniformly from `[-range, range]`
    pub fn perturb(&self, baseline: u8, range: i32, rng: &mut StdRng) -> u8 {
        let delta = if range > 0 {
            rng.random_range(-range..=range)
        } else {
            0
        };
        (i32::from(baseline) + delta).clamp(i32::from(AQI_MIN), i32::from(AQI_MAX)) as u8
    }

    fn level(&self, parameter: Parameter, aqi: u8, rng: &mut StdRng) -> f64 {
        let position = rng.random_range(0.0..MAX_JITTER);
        self.calculator.concentration_for(parameter, aqi, position)
    }

    fn seed(&self, location: &Location, stream: &str, offset: i64) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(location.key(SEED_PRECISION).as_bytes());
        hasher.update(b"|");
        hasher.update(stream.as_bytes());
        hasher.update(offset.to_le_bytes());
        if self.seed_mode == SeedMode::WallClock {
            hasher.update(Utc::now().date_naive().num_days_from_ce().to_le_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}
