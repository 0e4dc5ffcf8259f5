//! OpenAQ ground-station provider
//!
//! Queries the latest measurements from monitoring stations within 10 km of
//! the requested point and averages them per parameter.

use super::http::HttpFetcher;
use super::{PollutantProvider, ProviderFailure, ProviderResult};
use crate::AqiError;
use crate::config::ProviderConfig;
use crate::models::{Location, Parameter, PollutantReading, Source};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

const SEARCH_RADIUS_M: u32 = 10_000;
const STATION_LIMIT: u32 = 10;

pub struct OpenAqClient {
    http: HttpFetcher,
}

impl OpenAqClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, AqiError> {
        Ok(Self {
            http: HttpFetcher::new("openaq", config)?,
        })
    }
}

#[async_trait]
impl PollutantProvider for OpenAqClient {
    fn source(&self) -> Source {
        Source::Openaq
    }

    fn timeout(&self) -> Duration {
        self.http.timeout()
    }

    #[instrument(name = "openaq_fetch", skip(self), fields(location = %location.format_coordinates()))]
    async fn fetch(&self, location: &Location) -> ProviderResult<Vec<PollutantReading>> {
        let path = format!(
            "latest?coordinates={:.4},{:.4}&radius={}&limit={}",
            location.latitude(),
            location.longitude(),
            SEARCH_RADIUS_M,
            STATION_LIMIT
        );
        let headers: Vec<(&'static str, String)> = self
            .http
            .api_key()
            .map(|key| vec![("X-API-Key", key.to_string())])
            .unwrap_or_default();

        let response: LatestResponse = self.http.get_json(&path, &headers).await?;
        let readings = readings_from_latest(&response, Utc::now());
        if readings.is_empty() {
            return Err(ProviderFailure::NoData);
        }
        debug!("OpenAQ returned {} parameter(s)", readings.len());
        Ok(readings)
    }

    async fn health_check(&self) -> bool {
        self.http.probe("latest?limit=1").await
    }
}

/// `/latest` response body
#[derive(Debug, Deserialize)]
pub struct LatestResponse {
    #[serde(default)]
    pub results: Vec<StationResult>,
}

#[derive(Debug, Deserialize)]
pub struct StationResult {
    #[serde(default)]
    pub measurements: Vec<Measurement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub parameter: String,
    pub value: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Average each known parameter across all stations
#[must_use]
pub fn readings_from_latest(response: &LatestResponse, now: DateTime<Utc>) -> Vec<PollutantReading> {
    let mut sums: BTreeMap<Parameter, (f64, usize, Option<DateTime<Utc>>)> = BTreeMap::new();

    let measurements = response
        .results
        .iter()
        .flat_map(|station| station.measurements.iter());

    for measurement in measurements {
        let Some(parameter) = Parameter::from_api_name(&measurement.parameter) else {
            continue;
        };
        if !measurement.value.is_finite() || measurement.value < 0.0 {
            continue;
        }
        let entry = sums.entry(parameter).or_insert((0.0, 0, None));
        entry.0 += measurement.value;
        entry.1 += 1;
        entry.2 = entry.2.max(measurement.last_updated);
    }

    sums.into_iter()
        .map(|(parameter, (sum, count, latest))| {
            PollutantReading::new(
                parameter,
                sum / count as f64,
                Source::Openaq,
                latest.unwrap_or(now),
            )
        })
        .collect()
}
