//! Pollutant parameters, data sources, readings and per-location bundles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Measured pollutant parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    No2,
    O3,
    Pm25,
    Pm10,
    So2,
    Co,
    Hcho,
}

impl Parameter {
    /// Parse the parameter names used by upstream APIs
    #[must_use]
    pub fn from_api_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "no2" => Some(Parameter::No2),
            "o3" => Some(Parameter::O3),
            "pm25" | "pm2.5" | "pm2_5" => Some(Parameter::Pm25),
            "pm10" => Some(Parameter::Pm10),
            "so2" => Some(Parameter::So2),
            "co" => Some(Parameter::Co),
            "hcho" => Some(Parameter::Hcho),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::No2 => "NO2",
            Parameter::O3 => "O3",
            Parameter::Pm25 => "PM2.5",
            Parameter::Pm10 => "PM10",
            Parameter::So2 => "SO2",
            Parameter::Co => "CO",
            Parameter::Hcho => "HCHO",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream provider that produced a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// OpenAQ ground-station network
    Openaq,
    /// TEMPO satellite columns
    Tempo,
    /// OpenWeather air pollution estimate
    Openweather,
    /// Persisted historical readings
    HistoryStore,
    /// Deterministic synthetic data
    MockData,
}

/// Descriptive catalogue entry for a data source
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub coverage: &'static str,
    pub update_frequency: &'static str,
    pub parameters: &'static [&'static str],
}

impl Source {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Openaq => "openaq",
            Source::Tempo => "tempo",
            Source::Openweather => "openweather",
            Source::HistoryStore => "history_store",
            Source::MockData => "mock_data",
        }
    }

    #[must_use]
    pub fn info(&self) -> SourceInfo {
        match self {
            Source::Openaq => SourceInfo {
                name: "OpenAQ",
                description: "Global air quality data from ground monitoring stations",
                coverage: "Global",
                update_frequency: "Real-time",
                parameters: &["PM2.5", "PM10", "NO2", "O3", "SO2", "CO"],
            },
            Source::Tempo => SourceInfo {
                name: "NASA TEMPO",
                description: "Tropospheric Emissions: Monitoring of Pollution",
                coverage: "North America",
                update_frequency: "Hourly",
                parameters: &["NO2", "HCHO", "O3"],
            },
            Source::Openweather => SourceInfo {
                name: "OpenWeather",
                description: "Modelled air pollution estimates",
                coverage: "Global",
                update_frequency: "Hourly",
                parameters: &["PM2.5", "PM10", "NO2", "O3", "SO2", "CO"],
            },
            Source::HistoryStore => SourceInfo {
                name: "History store",
                description: "Previously recorded readings",
                coverage: "Recorded locations",
                update_frequency: "On record",
                parameters: &["PM2.5", "PM10", "NO2", "O3"],
            },
            Source::MockData => SourceInfo {
                name: "Synthetic baseline",
                description: "Deterministic location-seeded estimate used when no provider answers",
                coverage: "Global",
                update_frequency: "On demand",
                parameters: &["PM2.5", "PM10", "NO2", "O3"],
            },
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single concentration reported by a provider, in the provider's unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutantReading {
    pub parameter: Parameter,
    pub value: f64,
    pub source: Source,
    pub observed_at: DateTime<Utc>,
}

impl PollutantReading {
    #[must_use]
    pub fn new(parameter: Parameter, value: f64, source: Source, observed_at: DateTime<Utc>) -> Self {
        Self {
            parameter,
            value,
            source,
            observed_at,
        }
    }

    /// Negative, NaN and infinite concentrations are treated as malformed
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.value.is_finite() && self.value >= 0.0
    }
}

/// Best available reading per parameter for one location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollutantBundle {
    readings: BTreeMap<Parameter, PollutantReading>,
    data_sources: Vec<Source>,
}

impl PollutantBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reading unless the parameter is already covered.
    /// Returns whether the reading was kept.
    pub fn offer(&mut self, reading: PollutantReading) -> bool {
        if self.readings.contains_key(&reading.parameter) {
            return false;
        }
        self.readings.insert(reading.parameter, reading);
        true
    }

    /// Record a contributing source, keeping first-insertion order
    pub fn record_source(&mut self, source: Source) {
        if !self.data_sources.contains(&source) {
            self.data_sources.push(source);
        }
    }

    #[must_use]
    pub fn contains(&self, parameter: Parameter) -> bool {
        self.readings.contains_key(&parameter)
    }

    #[must_use]
    pub fn get(&self, parameter: Parameter) -> Option<&PollutantReading> {
        self.readings.get(&parameter)
    }

    pub fn readings(&self) -> impl Iterator<Item = &PollutantReading> {
        self.readings.values()
    }

    #[must_use]
    pub fn data_sources(&self) -> &[Source] {
        &self.data_sources
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
