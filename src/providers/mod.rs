//! Upstream data providers
//!
//! Every adapter reports failure as a [`ProviderFailure`] value instead of
//! raising it, so the aggregation engine can treat the fallback chain as a
//! plain loop over results.

use crate::models::{CurrentWeather, Location, PollutantReading, Source, WeatherDay};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub mod history;
pub mod http;
pub mod openaq;
pub mod openweather;
pub mod tempo;

pub use history::InMemoryHistoryStore;
pub use openaq::OpenAqClient;
pub use openweather::{OpenWeatherPollutionClient, OpenWeatherForecastClient};
pub use tempo::TempoClient;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Why an upstream call produced no usable data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    #[error("request timed out")]
    Timeout,

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("no data available near the requested location")]
    NoData,

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderFailure>;

/// A source of pollutant readings for a location
#[async_trait]
pub trait PollutantProvider: Send + Sync {
    /// Identifier recorded in `data_sources` when this provider contributes
    fn source(&self) -> Source;

    async fn fetch(&self, location: &Location) -> ProviderResult<Vec<PollutantReading>>;

    /// Upper bound on one `fetch`, enforced by the aggregator
    fn timeout(&self) -> Duration {
        DEFAULT_PROVIDER_TIMEOUT
    }

    /// Cheap reachability probe
    async fn health_check(&self) -> bool {
        true
    }
}

/// Await an upstream call for at most `limit`, turning an elapsed deadline
/// into [`ProviderFailure::Timeout`]
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ProviderFailure::Timeout))
}

/// A source of weather covariates
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Daily conditions for the days after today
    async fn forecast(&self, location: &Location, days: u32) -> ProviderResult<Vec<WeatherDay>>;

    /// Conditions right now
    async fn current(&self, _location: &Location) -> ProviderResult<CurrentWeather> {
        Err(ProviderFailure::NotConfigured(
            "current conditions not supported".to_string(),
        ))
    }

    /// Upper bound on one call, enforced by the service
    fn timeout(&self) -> Duration {
        DEFAULT_PROVIDER_TIMEOUT
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Persisted readings, queried as one more tier for history requests
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn query(&self, location: &Location, range: DateRange) -> ProviderResult<Vec<PollutantReading>>;

    /// Upper bound on one query, enforced by the service
    fn timeout(&self) -> Duration {
        DEFAULT_PROVIDER_TIMEOUT
    }
}

/// Health of a single upstream, as reported by `AirQualityService::health`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub healthy: bool,
}
