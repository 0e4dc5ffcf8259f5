//! OpenWeather adapters
//!
//! Three endpoints share one API key: `air_pollution` feeds the last tier of
//! the pollutant chain, `forecast` supplies the daily covariates used by the
//! alert rules and `weather` the current conditions behind the weather factor.

use super::http::HttpFetcher;
use super::{PollutantProvider, ProviderFailure, ProviderResult, WeatherProvider};
use crate::AqiError;
use crate::config::ProviderConfig;
use crate::models::{CurrentWeather, Location, Parameter, PollutantReading, Source, WeatherDay};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

fn keyed_path(http: &HttpFetcher, endpoint: &str, location: &Location) -> ProviderResult<String> {
    let Some(api_key) = http.api_key() else {
        return Err(ProviderFailure::NotConfigured(
            "openweather api key missing".to_string(),
        ));
    };
    Ok(format!(
        "{endpoint}?lat={:.4}&lon={:.4}&appid={api_key}",
        location.latitude(),
        location.longitude()
    ))
}

/// Modelled pollutant concentrations
pub struct OpenWeatherPollutionClient {
    http: HttpFetcher,
}

impl OpenWeatherPollutionClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, AqiError> {
        Ok(Self {
            http: HttpFetcher::new("openweather", config)?,
        })
    }
}

#[async_trait]
impl PollutantProvider for OpenWeatherPollutionClient {
    fn source(&self) -> Source {
        Source::Openweather
    }

    fn timeout(&self) -> Duration {
        self.http.timeout()
    }

    #[instrument(name = "openweather_pollution_fetch", skip(self), fields(location = %location.format_coordinates()))]
    async fn fetch(&self, location: &Location) -> ProviderResult<Vec<PollutantReading>> {
        let path = keyed_path(&self.http, "air_pollution", location)?;
        let response: responses::PollutionResponse = self.http.get_json(&path, &[]).await?;
        let readings = response.into_readings();
        if readings.is_empty() {
            return Err(ProviderFailure::NoData);
        }
        Ok(readings)
    }

    async fn health_check(&self) -> bool {
        match self.http.api_key() {
            Some(key) => self.http.probe(&format!("weather?q=London&appid={key}")).await,
            None => false,
        }
    }
}

/// Current conditions and a daily forecast built from 3-hourly samples
pub struct OpenWeatherForecastClient {
    http: HttpFetcher,
}

impl OpenWeatherForecastClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, AqiError> {
        Ok(Self {
            http: HttpFetcher::new("openweather", config)?,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherForecastClient {
    #[instrument(name = "openweather_forecast_fetch", skip(self), fields(location = %location.format_coordinates()))]
    async fn forecast(&self, location: &Location, days: u32) -> ProviderResult<Vec<WeatherDay>> {
        let path = format!("{}&units=metric", keyed_path(&self.http, "forecast", location)?);
        let response: responses::ForecastResponse = self.http.get_json(&path, &[]).await?;
        let days = response.daily(Utc::now().date_naive(), days as usize);
        if days.is_empty() {
            return Err(ProviderFailure::NoData);
        }
        debug!("OpenWeather forecast covers {} day(s)", days.len());
        Ok(days)
    }

    #[instrument(name = "openweather_current_fetch", skip(self), fields(location = %location.format_coordinates()))]
    async fn current(&self, location: &Location) -> ProviderResult<CurrentWeather> {
        let path = format!("{}&units=metric", keyed_path(&self.http, "weather", location)?);
        let response: responses::CurrentResponse = self.http.get_json(&path, &[]).await?;
        Ok(response.into_current())
    }

    fn timeout(&self) -> Duration {
        self.http.timeout()
    }

    async fn health_check(&self) -> bool {
        match self.http.api_key() {
            Some(key) => self.http.probe(&format!("weather?q=London&appid={key}")).await,
            None => false,
        }
    }
}

pub mod responses {
    use super::{
        BTreeMap, CurrentWeather, DateTime, Deserialize, NaiveDate, NaiveDateTime, Parameter,
        PollutantReading, Source, Utc, WeatherDay,
    };

    /// `air_pollution` response
    #[derive(Debug, Deserialize)]
    pub struct PollutionResponse {
        #[serde(default)]
        pub list: Vec<PollutionSample>,
    }

    #[derive(Debug, Deserialize)]
    pub struct PollutionSample {
        /// Unix seconds
        pub dt: Option<i64>,
        #[serde(default)]
        pub components: BTreeMap<String, f64>,
    }

    impl PollutionResponse {
        /// Readings from the first sample, dropping unknown components
        #[must_use]
        pub fn into_readings(self) -> Vec<PollutantReading> {
            let Some(sample) = self.list.into_iter().next() else {
                return Vec::new();
            };
            let observed_at = sample
                .dt
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .unwrap_or_else(Utc::now);

            sample
                .components
                .iter()
                .filter_map(|(name, value)| {
                    Parameter::from_api_name(name).map(|parameter| {
                        PollutantReading::new(parameter, *value, Source::Openweather, observed_at)
                    })
                })
                .filter(PollutantReading::is_usable)
                .collect()
        }
    }

    /// Current `weather` response
    #[derive(Debug, Deserialize)]
    pub struct CurrentResponse {
        /// Unix seconds
        pub dt: Option<i64>,
        pub main: MainData,
        pub wind: WindData,
    }

    impl CurrentResponse {
        #[must_use]
        pub fn into_current(self) -> CurrentWeather {
            CurrentWeather {
                observed_at: self
                    .dt
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                    .unwrap_or_else(Utc::now),
                temperature: self.main.temp,
                wind_speed: self.wind.speed,
                humidity: self.main.humidity,
            }
        }
    }

    /// 5 day / 3 hour `forecast` response
    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        #[serde(default)]
        pub list: Vec<ForecastSample>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastSample {
        pub dt_txt: String,
        pub main: MainData,
        pub wind: WindData,
        #[serde(default)]
        pub weather: Vec<Conditions>,
    }

    #[derive(Debug, Deserialize)]
    pub struct MainData {
        pub temp: f64,
        pub humidity: f64,
        pub pressure: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct WindData {
        pub speed: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Conditions {
        pub description: String,
    }

    impl ForecastResponse {
        /// Average the samples of each calendar day after `today`, keeping the
        /// first `days` of them. The feed starts with the current day, which is
        /// not a forecast day.
        #[must_use]
        pub fn daily(&self, today: NaiveDate, days: usize) -> Vec<WeatherDay> {
            let mut grouped: BTreeMap<NaiveDate, Vec<&ForecastSample>> = BTreeMap::new();
            for sample in &self.list {
                let Ok(timestamp) = NaiveDateTime::parse_from_str(&sample.dt_txt, "%Y-%m-%d %H:%M:%S")
                else {
                    continue;
                };
                grouped.entry(timestamp.date()).or_default().push(sample);
            }

            grouped
                .into_iter()
                .filter(|(date, _)| *date > today)
                .take(days)
                .map(|(date, samples)| {
                    let n = samples.len() as f64;
                    let mean = |f: fn(&ForecastSample) -> f64| samples.iter().map(|s| f(s)).sum::<f64>() / n;
                    let pressures: Vec<f64> = samples.iter().filter_map(|s| s.main.pressure).collect();

                    WeatherDay {
                        date,
                        temperature: (mean(|s| s.main.temp) * 10.0).round() / 10.0,
                        wind_speed: (mean(|s| s.wind.speed) * 10.0).round() / 10.0,
                        humidity: mean(|s| s.main.humidity).round(),
                        pressure: (!pressures.is_empty())
                            .then(|| (pressures.iter().sum::<f64>() / pressures.len() as f64).round()),
                        conditions: samples
                            .first()
                            .and_then(|s| s.weather.first())
                            .map(|c| c.description.clone()),
                    }
                })
                .collect()
        }
    }
}
