//! AQI calculation from pollutant bundles
//!
//! Each pollutant owns five ascending breakpoints. A concentration's sub-index
//! is the first (1-based) breakpoint it does not exceed, saturating at 5, and
//! the overall AQI is the worst sub-index across all pollutants present.

use crate::error::AqiError;
use crate::models::air_quality::{AQI_MAX, AQI_MIN};
use crate::models::{Parameter, PollutantBundle, PollutantLevel};
use std::collections::{BTreeMap, HashMap};

pub type Breakpoints = [f64; 5];

/// Upper concentration bounds for categories 1-5 (EPA-derived)
pub const NO2_BREAKPOINTS: Breakpoints = [53.0, 100.0, 360.0, 649.0, 1249.0];
pub const O3_BREAKPOINTS: Breakpoints = [54.0, 70.0, 85.0, 105.0, 200.0];
pub const PM25_BREAKPOINTS: Breakpoints = [12.0, 35.4, 55.4, 150.4, 250.4];
pub const PM10_BREAKPOINTS: Breakpoints = [54.0, 154.0, 254.0, 354.0, 424.0];
pub const GENERIC_BREAKPOINTS: Breakpoints = [50.0, 100.0, 150.0, 200.0, 300.0];

/// Result of an AQI computation
#[derive(Debug, Clone, PartialEq)]
pub struct AqiResult {
    pub aqi_value: u8,
    pub levels: BTreeMap<Parameter, PollutantLevel>,
}

/// Breakpoint tables keyed by parameter, with a generic fallback table
#[derive(Debug, Clone)]
pub struct BreakpointTables {
    tables: HashMap<Parameter, Breakpoints>,
    generic: Breakpoints,
}

impl Default for BreakpointTables {
    fn default() -> Self {
        Self::standard()
    }
}

impl BreakpointTables {
    /// Distinct tables for NO2, O3, PM2.5 and PM10
    #[must_use]
    pub fn standard() -> Self {
        let tables = HashMap::from([
            (Parameter::No2, NO2_BREAKPOINTS),
            (Parameter::O3, O3_BREAKPOINTS),
            (Parameter::Pm25, PM25_BREAKPOINTS),
            (Parameter::Pm10, PM10_BREAKPOINTS),
        ]);
        Self {
            tables,
            generic: GENERIC_BREAKPOINTS,
        }
    }

    /// Build custom tables, rejecting any that are not strictly ascending
    pub fn new(tables: HashMap<Parameter, Breakpoints>, generic: Breakpoints) -> Result<Self, AqiError> {
        check_table("generic", &generic)?;
        for (parameter, table) in &tables {
            check_table(parameter.as_str(), table)?;
        }
        Ok(Self { tables, generic })
    }

    #[must_use]
    pub fn table(&self, parameter: Parameter) -> &Breakpoints {
        self.tables.get(&parameter).unwrap_or(&self.generic)
    }
}

fn check_table(name: &str, table: &Breakpoints) -> Result<(), AqiError> {
    let finite = table.iter().all(|v| v.is_finite() && *v >= 0.0);
    let ascending = table.windows(2).all(|w| w[0] < w[1]);
    if finite && ascending {
        Ok(())
    } else {
        Err(AqiError::internal(format!(
            "breakpoint table for {name} must be finite and strictly ascending"
        )))
    }
}

/// Maps bundles to AQI values and AQI values back to concentrations
#[derive(Debug, Clone, Default)]
pub struct AqiCalculator {
    tables: BreakpointTables,
}

impl AqiCalculator {
    #[must_use]
    pub fn new(tables: BreakpointTables) -> Self {
        Self { tables }
    }

    #[must_use]
    pub fn tables(&self) -> &BreakpointTables {
        &self.tables
    }

    /// Sub-index of a single concentration
    #[must_use]
    pub fn sub_index(&self, parameter: Parameter, value: f64) -> u8 {
        let table = self.tables.table(parameter);
        table
            .iter()
            .position(|&bound| value <= bound)
            .map_or(AQI_MAX, |i| i as u8 + 1)
    }

    /// Overall AQI of a bundle; the worst pollutant governs
    pub fn compute(&self, bundle: &PollutantBundle) -> Result<AqiResult, AqiError> {
        if bundle.is_empty() {
            return Err(AqiError::internal("cannot compute AQI of an empty bundle"));
        }

        let levels: BTreeMap<Parameter, PollutantLevel> = bundle
            .readings()
            .map(|reading| {
                let level = PollutantLevel {
                    concentration: reading.value,
                    sub_index: self.sub_index(reading.parameter, reading.value),
                };
                (reading.parameter, level)
            })
            .collect();

        let worst = levels
            .values()
            .map(|level| level.sub_index)
            .max()
            .unwrap_or(AQI_MIN);

        Ok(AqiResult {
            aqi_value: worst.clamp(AQI_MIN, AQI_MAX),
            levels,
        })
    }

    /// Overall AQI of plain parameter/concentration pairs
    pub fn compute_levels(&self, levels: &BTreeMap<Parameter, f64>) -> Result<u8, AqiError> {
        levels
            .iter()
            .map(|(parameter, value)| self.sub_index(*parameter, *value))
            .max()
            .map(|worst| worst.clamp(AQI_MIN, AQI_MAX))
            .ok_or_else(|| AqiError::internal("cannot compute AQI without pollutant levels"))
    }

    /// Concentration that falls inside the category `aqi`.
    ///
    /// `position` in `[0, 1)` moves the value from the top of the band
    /// (0.0) towards the band's lower bound, so the result always maps back
    /// to `aqi`.
    #[must_use]
    pub fn concentration_for(&self, parameter: Parameter, aqi: u8, position: f64) -> f64 {
        let table = self.tables.table(parameter);
        let idx = usize::from(aqi.clamp(AQI_MIN, AQI_MAX) - 1);
        let upper = table[idx];
        let lower = if idx == 0 { 0.0 } else { table[idx - 1] };
        let position = position.clamp(0.0, 0.95);
        let value = upper - (upper - lower) * position;
        (value * 100.0).floor() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PollutantReading, Source};
    use chrono::Utc;
    use rstest::rstest;

    fn bundle(values: &[(Parameter, f64)]) -> PollutantBundle {
        let mut bundle = PollutantBundle::new();
        for (parameter, value) in values {
            bundle.offer(PollutantReading::new(*parameter, *value, Source::Openaq, Utc::now()));
        }
        bundle
    }

    #[rstest]
    #[case(Parameter::Pm25, 0.0, 1)]
    #[case(Parameter::Pm25, 12.0, 1)]
    #[case(Parameter::Pm25, 12.1, 2)]
    #[case(Parameter::Pm25, 250.4, 5)]
    #[case(Parameter::Pm25, 900.0, 5)]
    #[case(Parameter::No2, 53.0, 1)]
    #[case(Parameter::No2, 400.0, 4)]
    #[case(Parameter::O3, 71.0, 3)]
    #[case(Parameter::Pm10, 155.0, 3)]
    #[case(Parameter::So2, 120.0, 3)]
    #[case(Parameter::Hcho, 10.0, 1)]
    fn test_sub_index(#[case] parameter: Parameter, #[case] value: f64, #[case] expected: u8) {
        let calculator = AqiCalculator::default();
        assert_eq!(calculator.sub_index(parameter, value), expected);
    }

    #[test]
    fn test_worst_pollutant_governs() {
        let calculator = AqiCalculator::default();
        // NO2 in band 4, O3 and PM2.5 in band 1
        let result = calculator
            .compute(&bundle(&[
                (Parameter::No2, 500.0),
                (Parameter::O3, 30.0),
                (Parameter::Pm25, 5.0),
            ]))
            .unwrap();
        assert_eq!(result.aqi_value, 4);
        assert_eq!(result.levels[&Parameter::No2].sub_index, 4);
        assert_eq!(result.levels[&Parameter::O3].sub_index, 1);
    }

    #[test]
    fn test_empty_bundle_is_internal_error() {
        let calculator = AqiCalculator::default();
        let err = calculator.compute(&PollutantBundle::new()).unwrap_err();
        assert!(matches!(err, AqiError::InternalCompute { .. }));
    }

    #[test]
    fn test_concentration_for_maps_back_to_same_category() {
        let calculator = AqiCalculator::default();
        for parameter in [
            Parameter::No2,
            Parameter::O3,
            Parameter::Pm25,
            Parameter::Pm10,
            Parameter::Co,
        ] {
            for aqi in 1..=5 {
                for position in [0.0, 0.05, 0.1, 0.5, 0.95, 2.0] {
                    let value = calculator.concentration_for(parameter, aqi, position);
                    assert_eq!(
                        calculator.sub_index(parameter, value),
                        aqi,
                        "{parameter} aqi={aqi} position={position} value={value}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_custom_tables_must_ascend() {
        let bad = HashMap::from([(Parameter::No2, [10.0, 5.0, 20.0, 30.0, 40.0])]);
        assert!(BreakpointTables::new(bad, GENERIC_BREAKPOINTS).is_err());

        let good = HashMap::from([(Parameter::No2, [1.0, 2.0, 3.0, 4.0, 5.0])]);
        let tables = BreakpointTables::new(good, GENERIC_BREAKPOINTS).unwrap();
        let calculator = AqiCalculator::new(tables);
        assert_eq!(calculator.sub_index(Parameter::No2, 3.5), 4);
        assert_eq!(calculator.sub_index(Parameter::Pm25, 3.5), 1);
    }

    #[test]
    fn test_compute_levels() {
        let calculator = AqiCalculator::default();
        let levels = BTreeMap::from([(Parameter::Pm25, 40.0), (Parameter::O3, 10.0)]);
        assert_eq!(calculator.compute_levels(&levels).unwrap(), 3);
        assert!(calculator.compute_levels(&BTreeMap::new()).is_err());
    }
}
