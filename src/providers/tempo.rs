//! TEMPO satellite provider
//!
//! Thin client over the TEMPO gateway. The gateway only answers with an API
//! key, so an unconfigured client reports [`ProviderFailure::NotConfigured`]
//! without touching the network.

use super::http::HttpFetcher;
use super::{PollutantProvider, ProviderFailure, ProviderResult};
use crate::AqiError;
use crate::config::ProviderConfig;
use crate::models::{Location, Parameter, PollutantReading, Source};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

pub struct TempoClient {
    http: HttpFetcher,
}

impl TempoClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, AqiError> {
        Ok(Self {
            http: HttpFetcher::new("tempo", config)?,
        })
    }
}

#[async_trait]
impl PollutantProvider for TempoClient {
    fn source(&self) -> Source {
        Source::Tempo
    }

    fn timeout(&self) -> Duration {
        self.http.timeout()
    }

    #[instrument(name = "tempo_fetch", skip(self), fields(location = %location.format_coordinates()))]
    async fn fetch(&self, location: &Location) -> ProviderResult<Vec<PollutantReading>> {
        let Some(api_key) = self.http.api_key() else {
            return Err(ProviderFailure::NotConfigured("tempo api key missing".to_string()));
        };

        let path = format!(
            "latest?lat={:.4}&lon={:.4}",
            location.latitude(),
            location.longitude()
        );
        let headers = [("X-API-Key", api_key.to_string())];
        let response: TempoResponse = self.http.get_json(&path, &headers).await?;

        let readings = response.into_readings(Utc::now());
        if readings.is_empty() {
            return Err(ProviderFailure::NoData);
        }
        Ok(readings)
    }

    async fn health_check(&self) -> bool {
        self.http.probe("status").await
    }
}

/// Tropospheric columns for the pixel containing the requested point
#[derive(Debug, Deserialize)]
pub struct TempoResponse {
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub hcho: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl TempoResponse {
    #[must_use]
    pub fn into_readings(self, now: DateTime<Utc>) -> Vec<PollutantReading> {
        let observed_at = self.observed_at.unwrap_or(now);
        [
            (Parameter::No2, self.no2),
            (Parameter::O3, self.o3),
            (Parameter::Hcho, self.hcho),
        ]
        .into_iter()
        .filter_map(|(parameter, value)| {
            value.map(|v| PollutantReading::new(parameter, v, Source::Tempo, observed_at))
        })
        .filter(PollutantReading::is_usable)
        .collect()
    }
}
