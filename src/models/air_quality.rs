//! Computed air quality results: snapshots, forecast points, alerts and scores

use super::{Location, Parameter, Source};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lowest and highest AQI category on the 1-5 scale
pub const AQI_MIN: u8 = 1;
pub const AQI_MAX: u8 = 5;

/// Human-readable AQI category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Excellent,
    Good,
    Moderate,
    Poor,
    Hazardous,
}

impl AqiCategory {
    /// Category for an AQI value, saturating outside the scale
    #[must_use]
    pub fn from_value(aqi: u8) -> Self {
        match aqi {
            0 | 1 => AqiCategory::Excellent,
            2 => AqiCategory::Good,
            3 => AqiCategory::Moderate,
            4 => AqiCategory::Poor,
            _ => AqiCategory::Hazardous,
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AqiCategory::Excellent => write!(f, "Excellent"),
            AqiCategory::Good => write!(f, "Good"),
            AqiCategory::Moderate => write!(f, "Moderate"),
            AqiCategory::Poor => write!(f, "Poor"),
            AqiCategory::Hazardous => write!(f, "Hazardous"),
        }
    }
}

/// Concentration and sub-index of one pollutant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollutantLevel {
    pub concentration: f64,
    pub sub_index: u8,
}

/// Point-in-time air quality for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySnapshot {
    pub aqi_value: u8,
    pub category: AqiCategory,
    pub pollutant_levels: BTreeMap<Parameter, PollutantLevel>,
    pub timestamp: DateTime<Utc>,
    pub data_sources: Vec<Source>,
    pub location: Location,
    /// Dispersion factor from current weather (0.0-1.0), informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_factor: Option<f64>,
}

/// Direction of a forecast or history point relative to its reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Worsening,
}

impl Trend {
    #[must_use]
    pub fn between(reference: u8, value: u8) -> Self {
        match value.cmp(&reference) {
            std::cmp::Ordering::Greater => Trend::Worsening,
            std::cmp::Ordering::Less => Trend::Improving,
            std::cmp::Ordering::Equal => Trend::Stable,
        }
    }
}

/// One day of a forecast or history series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub aqi_value: u8,
    pub pollutant_levels: BTreeMap<Parameter, f64>,
    /// 0.0-1.0
    pub confidence: f32,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CurrentWarning,
    ForecastWarning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Moderate,
    Poor,
    Hazardous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub valid_until: DateTime<Utc>,
    /// Forecast day the alert refers to, `None` for current conditions
    pub date: Option<NaiveDate>,
}

/// Outcome of comparing a user's guess with the computed AQI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessScore {
    pub user_guess: u8,
    pub actual_level: u8,
    pub accuracy_score: u8,
}
