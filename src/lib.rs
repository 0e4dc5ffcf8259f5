//! `aqi-engine` - Air quality aggregation and scoring
//!
//! Turns a (latitude, longitude) query into a cached AQI snapshot on a 1-5
//! scale, a multi-day forecast, threshold alerts and an accuracy score for a
//! user's visual guess. Upstream data comes from a prioritised chain of
//! providers with a deterministic location-seeded fallback.

pub mod aggregation;
pub mod alerts;
pub mod aqi;
pub mod baseline;
pub mod cache;
pub mod config;
pub mod error;
pub mod forecast;
pub mod logging;
pub mod models;
pub mod providers;
pub mod scoring;
pub mod service;
pub mod validation;

// Re-export core types for public API
pub use aggregation::Aggregator;
pub use alerts::AlertEngine;
pub use aqi::{AqiCalculator, AqiResult, BreakpointTables};
pub use baseline::BaselineModel;
pub use cache::{CacheKey, Operation, SingleFlightCache};
pub use config::AqiConfig;
pub use error::{AqiError, FieldViolation};
pub use forecast::ForecastGenerator;
pub use models::{
    AirQualitySnapshot, Alert, AlertKind, AqiCategory, CurrentWeather, ForecastPoint, GuessScore,
    Location, Parameter, PollutantBundle, PollutantReading, Severity, Source, Trend, WeatherDay,
};
pub use providers::{
    HistoryStore, PollutantProvider, ProviderFailure, ProviderResult, ProviderStatus,
    WeatherProvider,
};
pub use service::AirQualityService;
pub use validation::{LocationValidator, RawValue, ValidatedQuery};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AqiError>;
