//! Forecast and history series generation
//!
//! Both series start from the location's baseline AQI. Forecast days move at
//! most one category away from it; synthesized history days drift further
//! the older they are. Recorded history, when present, always wins over a
//! synthesized day.

use crate::AqiError;
use crate::baseline::BaselineModel;
use crate::models::{ForecastPoint, Location, Parameter, PollutantReading, Trend};
use chrono::{Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Largest category shift applied to a forecast day
const FORECAST_VARIATION: i32 = 1;
/// Largest category shift applied to a synthesized history day
const MAX_HISTORY_VARIATION: i32 = 2;
const RECORDED_CONFIDENCE: f32 = 1.0;
const SYNTHESIZED_CONFIDENCE: f32 = 0.5;

pub struct ForecastGenerator {
    baseline: BaselineModel,
    parameters: Vec<Parameter>,
}

impl ForecastGenerator {
    #[must_use]
    pub fn new(baseline: BaselineModel, parameters: Vec<Parameter>) -> Self {
        Self {
            baseline,
            parameters,
        }
    }

    /// Forecast for the `horizon_days` days after today (UTC)
    pub fn forecast(&self, location: &Location, horizon_days: u32) -> Result<Vec<ForecastPoint>, AqiError> {
        self.forecast_from(location, horizon_days, Utc::now().date_naive())
    }

    /// Forecast for `today + 1 ..= today + horizon_days`
    #[instrument(skip(self), fields(location = %location.format_coordinates()))]
    pub fn forecast_from(
        &self,
        location: &Location,
        horizon_days: u32,
        today: NaiveDate,
    ) -> Result<Vec<ForecastPoint>, AqiError> {
        let baseline = self.baseline.baseline_aqi(location);
        debug!("Baseline AQI {} for forecast", baseline);

        (1..=i64::from(horizon_days))
            .map(|day| {
                let mut rng = self.baseline.rng(location, "forecast", day);
                let aqi = self.baseline.perturb(baseline, FORECAST_VARIATION, &mut rng);
                let levels = self.baseline.levels_for(&self.parameters, aqi, &mut rng);
                let aqi_value = self.baseline.calculator().compute_levels(&levels)?;
                Ok(ForecastPoint {
                    date: today + Duration::days(day),
                    aqi_value,
                    pollutant_levels: levels,
                    confidence: forecast_confidence(day),
                    trend: Trend::between(baseline, aqi_value),
                })
            })
            .collect()
    }

    /// History for the `days` days before today (UTC), oldest first
    pub fn history(
        &self,
        location: &Location,
        days: u32,
        recorded: &[PollutantReading],
    ) -> Result<Vec<ForecastPoint>, AqiError> {
        self.history_until(location, days, Utc::now().date_naive(), recorded)
    }

    /// History for `today - days ..= today - 1`
    #[instrument(skip(self, recorded), fields(location = %location.format_coordinates(), recorded = recorded.len()))]
    pub fn history_until(
        &self,
        location: &Location,
        days: u32,
        today: NaiveDate,
        recorded: &[PollutantReading],
    ) -> Result<Vec<ForecastPoint>, AqiError> {
        let baseline = self.baseline.baseline_aqi(location);
        let daily = daily_means(recorded);
        let mut previous = baseline;
        let mut points = Vec::with_capacity(days as usize);

        for days_ago in (1..=i64::from(days)).rev() {
            let date = today - Duration::days(days_ago);

            let (aqi_value, pollutant_levels, confidence) = match daily.get(&date) {
                Some(levels) if !levels.is_empty() => {
                    let aqi = self.baseline.calculator().compute_levels(levels)?;
                    (aqi, levels.clone(), RECORDED_CONFIDENCE)
                }
                _ => {
                    let mut rng = self.baseline.rng(location, "history", -days_ago);
                    let range = history_variation(days_ago);
                    let aqi = self.baseline.perturb(baseline, range, &mut rng);
                    let levels = self.baseline.levels_for(&self.parameters, aqi, &mut rng);
                    let aqi = self.baseline.calculator().compute_levels(&levels)?;
                    (aqi, levels, SYNTHESIZED_CONFIDENCE)
                }
            };

            points.push(ForecastPoint {
                date,
                aqi_value,
                pollutant_levels,
                confidence,
                trend: Trend::between(previous, aqi_value),
            });
            previous = aqi_value;
        }

        Ok(points)
    }
}

/// 0.9 for tomorrow, dropping 0.1 per day, never below 0.3
fn forecast_confidence(day: i64) -> f32 {
    let confidence = 0.9 - 0.1 * (day - 1) as f32;
    // Keep one decimal so serialized values stay tidy
    ((confidence.clamp(0.3, 1.0) * 10.0).round()) / 10.0
}

fn history_variation(days_ago: i64) -> i32 {
    let range = i32::try_from(days_ago / 3 + 1).unwrap_or(MAX_HISTORY_VARIATION);
    range.min(MAX_HISTORY_VARIATION)
}

/// Mean concentration per parameter per UTC day
fn daily_means(readings: &[PollutantReading]) -> BTreeMap<NaiveDate, BTreeMap<Parameter, f64>> {
    let mut sums: BTreeMap<NaiveDate, BTreeMap<Parameter, (f64, u32)>> = BTreeMap::new();
    for reading in readings.iter().filter(|r| r.is_usable()) {
        let entry = sums
            .entry(reading.observed_at.date_naive())
            .or_default()
            .entry(reading.parameter)
            .or_insert((0.0, 0));
        entry.0 += reading.value;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(date, per_parameter)| {
            let means = per_parameter
                .into_iter()
                .map(|(parameter, (sum, count))| (parameter, sum / f64::from(count)))
                .collect();
            (date, means)
        })
        .collect()
}
