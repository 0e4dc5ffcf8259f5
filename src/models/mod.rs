//! Data models for the air quality engine
//!
//! This module contains the core domain models organized by concern:
//! - Location: validated coordinates and cache-key rounding
//! - Pollutant: parameters, sources, readings and bundles
//! - Air quality: snapshots, forecast points, alerts and guess scores
//! - Weather: daily covariates for the alert rules, current conditions for the weather factor

pub mod air_quality;
pub mod location;
pub mod pollutant;
pub mod weather;

// Re-export all public types for convenient access
pub use air_quality::{
    Alert, AlertKind, AirQualitySnapshot, AqiCategory, ForecastPoint, GuessScore, PollutantLevel,
    Severity, Trend,
};
pub use location::Location;
pub use pollutant::{Parameter, PollutantBundle, PollutantReading, Source, SourceInfo};
pub use weather::{CurrentWeather, WeatherDay};
