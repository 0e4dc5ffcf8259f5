//! Weather covariates: daily aggregates for the alert rules and current
//! conditions for the dispersion factor reported with a snapshot

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated weather for one calendar day
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherDay {
    pub date: NaiveDate,
    /// Temperature in Celsius
    pub temperature: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Relative humidity percentage (0-100)
    pub humidity: f64,
    /// Atmospheric pressure in hPa
    pub pressure: Option<f64>,
    /// Human-readable description of weather conditions
    pub conditions: Option<String>,
}

impl WeatherDay {
    /// Hot, still and humid air traps pollutants near the ground
    #[must_use]
    pub fn is_stagnant(&self) -> bool {
        self.temperature > 30.0 && self.wind_speed < 3.0 && self.humidity > 70.0
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.1}°C", self.temperature)
    }
}

/// Point-in-time conditions at a location
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CurrentWeather {
    pub observed_at: DateTime<Utc>,
    /// Temperature in Celsius
    pub temperature: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Relative humidity percentage (0-100)
    pub humidity: f64,
}

impl CurrentWeather {
    /// How strongly current conditions favour pollutant build-up, 0.0-1.0.
    ///
    /// Starts at 0.5; calm air, heat and humidity push it up, strong wind,
    /// cold and dry air pull it down.
    #[must_use]
    pub fn weather_factor(&self) -> f64 {
        let mut factor: f64 = 0.5;

        if self.wind_speed > 10.0 {
            factor -= 0.2;
        } else if self.wind_speed < 2.0 {
            factor += 0.2;
        }

        if self.temperature > 30.0 {
            factor += 0.1;
        } else if self.temperature < 5.0 {
            factor -= 0.1;
        }

        if self.humidity > 80.0 {
            factor += 0.1;
        } else if self.humidity < 30.0 {
            factor -= 0.1;
        }

        (factor.clamp(0.0, 1.0) * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn day(temperature: f64, wind_speed: f64, humidity: f64) -> WeatherDay {
        WeatherDay {
            date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            temperature,
            wind_speed,
            humidity,
            pressure: None,
            conditions: None,
        }
    }

    #[test]
    fn test_stagnation_thresholds_are_strict() {
        assert!(day(31.0, 2.0, 75.0).is_stagnant());
        assert!(!day(30.0, 2.0, 75.0).is_stagnant());
        assert!(!day(31.0, 3.0, 75.0).is_stagnant());
        assert!(!day(31.0, 2.0, 70.0).is_stagnant());
    }

    fn now(temperature: f64, wind_speed: f64, humidity: f64) -> CurrentWeather {
        CurrentWeather {
            observed_at: Utc::now(),
            temperature,
            wind_speed,
            humidity,
        }
    }

    #[rstest]
    #[case::mild(20.0, 5.0, 50.0, 0.5)]
    #[case::calm_hot_humid(35.0, 1.0, 90.0, 0.9)]
    #[case::windy_cold_dry(0.0, 12.0, 20.0, 0.1)]
    #[case::windy_only(20.0, 15.0, 50.0, 0.3)]
    #[case::boundaries_are_strict(30.0, 2.0, 80.0, 0.5)]
    fn test_weather_factor(
        #[case] temperature: f64,
        #[case] wind_speed: f64,
        #[case] humidity: f64,
        #[case] expected: f64,
    ) {
        let factor = now(temperature, wind_speed, humidity).weather_factor();
        assert_eq!(factor, expected);
        assert!((0.0..=1.0).contains(&factor));
    }

    #[test]
    fn test_format_temperature() {
        assert_eq!(day(31.04, 2.0, 75.0).format_temperature(), "31.0°C");
    }
}
