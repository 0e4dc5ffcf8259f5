//! Engine facade
//!
//! [`AirQualityService`] wires the provider chain, calculator, forecast
//! generator and alert engine behind per-operation caches. Every public
//! operation takes an already validated [`Location`].

use crate::AqiError;
use crate::aggregation::Aggregator;
use crate::alerts::AlertEngine;
use crate::aqi::AqiCalculator;
use crate::baseline::BaselineModel;
use crate::cache::{CacheKey, Operation, SingleFlightCache};
use crate::config::AqiConfig;
use crate::forecast::ForecastGenerator;
use crate::models::air_quality::{AQI_MAX, AQI_MIN};
use crate::models::{
    AirQualitySnapshot, Alert, AqiCategory, ForecastPoint, GuessScore, Location, Source,
    SourceInfo, WeatherDay,
};
use crate::providers::{
    DateRange, HistoryStore, OpenAqClient, OpenWeatherForecastClient, OpenWeatherPollutionClient,
    PollutantProvider, ProviderFailure, ProviderStatus, TempoClient, WeatherProvider, with_timeout,
};
use crate::scoring;
use crate::validation::LocationValidator;
use chrono::{Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct AirQualityService {
    config: AqiConfig,
    aggregator: Aggregator,
    calculator: AqiCalculator,
    forecaster: ForecastGenerator,
    alert_engine: AlertEngine,
    weather: Option<Arc<dyn WeatherProvider>>,
    history: Option<Arc<dyn HistoryStore>>,
    current_cache: SingleFlightCache<AirQualitySnapshot>,
    forecast_cache: SingleFlightCache<Vec<ForecastPoint>>,
    history_cache: SingleFlightCache<Vec<ForecastPoint>>,
    weather_cache: SingleFlightCache<Vec<WeatherDay>>,
}

impl AirQualityService {
    /// Build the service with the HTTP providers enabled in `config`,
    /// in priority order OpenAQ, TEMPO, OpenWeather
    pub fn new(config: AqiConfig) -> Result<Self, AqiError> {
        config
            .validate()
            .map_err(|e| AqiError::config(e.to_string()))?;

        let providers_config = &config.providers;
        let mut providers: Vec<Arc<dyn PollutantProvider>> = Vec::new();
        if providers_config.openaq.enabled {
            providers.push(Arc::new(OpenAqClient::new(&providers_config.openaq)?));
        }
        if providers_config.tempo.enabled {
            providers.push(Arc::new(TempoClient::new(&providers_config.tempo)?));
        }
        if providers_config.openweather.enabled {
            providers.push(Arc::new(OpenWeatherPollutionClient::new(
                &providers_config.openweather,
            )?));
        }

        let weather: Option<Arc<dyn WeatherProvider>> =
            if providers_config.openweather.enabled && providers_config.openweather.api_key.is_some() {
                Some(Arc::new(OpenWeatherForecastClient::new(
                    &providers_config.openweather,
                )?))
            } else {
                None
            };

        info!(
            "Air quality service configured with {} pollutant provider(s), weather {}",
            providers.len(),
            if weather.is_some() { "enabled" } else { "disabled" }
        );
        Ok(Self::from_parts(config, providers, weather, None))
    }

    /// Build the service from explicit collaborators
    #[must_use]
    pub fn from_parts(
        config: AqiConfig,
        providers: Vec<Arc<dyn PollutantProvider>>,
        weather: Option<Arc<dyn WeatherProvider>>,
        history: Option<Arc<dyn HistoryStore>>,
    ) -> Self {
        let calculator = AqiCalculator::default();
        let baseline = BaselineModel::new(calculator.clone(), config.forecast.seed_mode);
        let aggregator = Aggregator::new(providers, &config.aggregation, baseline.clone());
        let forecaster = ForecastGenerator::new(baseline, aggregator.parameters().to_vec());
        let cache = &config.cache;

        Self {
            current_cache: SingleFlightCache::new("current", cache.current_ttl()),
            forecast_cache: SingleFlightCache::new("forecast", cache.forecast_ttl()),
            history_cache: SingleFlightCache::new("history", cache.history_ttl()),
            weather_cache: SingleFlightCache::new("weather", cache.forecast_ttl()),
            aggregator,
            calculator,
            forecaster,
            alert_engine: AlertEngine::new(),
            weather,
            history,
            config,
        }
    }

    /// Attach a store consulted by [`Self::get_history`]
    #[must_use]
    pub fn with_history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AqiConfig {
        &self.config
    }

    fn key(&self, operation: Operation, location: &Location) -> CacheKey {
        CacheKey::new(operation, location, self.config.cache.coordinate_precision)
    }

    /// Current air quality, reused for the current-conditions TTL
    #[instrument(skip(self), fields(location = %location.format_coordinates()))]
    pub async fn get_current(&self, location: &Location) -> Result<Arc<AirQualitySnapshot>, AqiError> {
        let key = self.key(Operation::Current, location);
        self.current_cache
            .get_or_compute(&key, || async {
                let (bundle, weather_factor) =
                    tokio::join!(self.aggregator.aggregate(location), self.weather_factor(location));
                let result = self.calculator.compute(&bundle)?;
                Ok::<_, AqiError>(AirQualitySnapshot {
                    aqi_value: result.aqi_value,
                    category: AqiCategory::from_value(result.aqi_value),
                    pollutant_levels: result.levels,
                    timestamp: Utc::now(),
                    data_sources: bundle.data_sources().to_vec(),
                    location: *location,
                    weather_factor,
                })
            })
            .await
    }

    /// Daily forecast for the next `horizon_days` days (configured default when `None`)
    #[instrument(skip(self), fields(location = %location.format_coordinates()))]
    pub async fn get_forecast(
        &self,
        location: &Location,
        horizon_days: Option<u32>,
    ) -> Result<Arc<Vec<ForecastPoint>>, AqiError> {
        let horizon = horizon_days.unwrap_or(self.config.forecast.default_horizon_days);
        let horizon = LocationValidator::validate_days("horizon_days", horizon)?;
        let key = self.key(Operation::Forecast, location).with(horizon);
        self.forecast_cache
            .get_or_compute(&key, || async { self.forecaster.forecast(location, horizon) })
            .await
    }

    /// Daily history for the `days` days before today, oldest first
    #[instrument(skip(self), fields(location = %location.format_coordinates()))]
    pub async fn get_history(&self, location: &Location, days: u32) -> Result<Arc<Vec<ForecastPoint>>, AqiError> {
        let days = LocationValidator::validate_days("days", days)?;
        let key = self.key(Operation::History, location).with(days);
        self.history_cache
            .get_or_compute(&key, || async {
                let today = Utc::now().date_naive();
                let recorded = match &self.history {
                    Some(store) => {
                        let range = DateRange {
                            start: today - Duration::days(i64::from(days)),
                            end: today - Duration::days(1),
                        };
                        with_timeout(store.timeout(), store.query(location, range))
                            .await
                            .unwrap_or_else(|failure| {
                                warn!("History store query failed, synthesizing days: {}", failure);
                                Vec::new()
                            })
                    }
                    None => Vec::new(),
                };
                self.forecaster.history_until(location, days, today, &recorded)
            })
            .await
    }

    /// Current-conditions and stagnant-weather alerts
    #[instrument(skip(self), fields(location = %location.format_coordinates()))]
    pub async fn get_alerts(&self, location: &Location) -> Result<Vec<Alert>, AqiError> {
        let snapshot = self.get_current(location).await?;
        let weather = self.weather_for(location).await;
        let alerts = self.alert_engine.evaluate(
            &snapshot,
            self.current_cache.ttl(),
            weather.as_deref().map(Vec::as_slice),
        );
        info!("Raised {} alert(s)", alerts.len());
        Ok(alerts)
    }

    /// Score a guess against an already known AQI
    pub fn score(&self, guess: u8, actual: u8) -> Result<GuessScore, AqiError> {
        scoring::score(guess, actual)
    }

    /// Score a guess against the current AQI at `location`
    pub async fn score_guess(&self, location: &Location, guess: u8) -> Result<GuessScore, AqiError> {
        if !(AQI_MIN..=AQI_MAX).contains(&guess) {
            return Err(AqiError::validation(
                "user_guess",
                format!("must be within [{AQI_MIN}, {AQI_MAX}], got {guess}"),
            ));
        }
        let snapshot = self.get_current(location).await?;
        scoring::score(guess, snapshot.aqi_value)
    }

    /// Reachability of every configured upstream; never fails
    pub async fn health(&self) -> Vec<ProviderStatus> {
        let providers = self.aggregator.providers();
        let checks = join_all(providers.iter().map(|p| p.health_check())).await;
        let mut statuses: Vec<ProviderStatus> = providers
            .iter()
            .zip(checks)
            .map(|(provider, healthy)| ProviderStatus {
                name: provider.source().to_string(),
                healthy,
            })
            .collect();

        if let Some(weather) = &self.weather {
            statuses.push(ProviderStatus {
                name: "openweather_forecast".to_string(),
                healthy: weather.health_check().await,
            });
        }
        statuses
    }

    /// Catalogue of the sources this service may report, in priority order
    #[must_use]
    pub fn data_sources(&self) -> Vec<SourceInfo> {
        let mut sources: Vec<Source> = self.aggregator.providers().iter().map(|p| p.source()).collect();
        if self.history.is_some() {
            sources.push(Source::HistoryStore);
        }
        sources.push(Source::MockData);
        sources.iter().map(Source::info).collect()
    }

    async fn weather_for(&self, location: &Location) -> Option<Arc<Vec<WeatherDay>>> {
        let weather = self.weather.as_ref()?;
        let days = self.config.forecast.default_horizon_days;
        let key = self.key(Operation::Weather, location).with(days);
        match self
            .weather_cache
            .get_or_compute(&key, || with_timeout(weather.timeout(), weather.forecast(location, days)))
            .await
        {
            Ok(days) => Some(days),
            Err(failure) => {
                if !matches!(failure, ProviderFailure::NotConfigured(_)) {
                    warn!("Weather covariates unavailable, skipping forecast alerts: {}", failure);
                }
                None
            }
        }
    }

    /// Dispersion factor from current conditions; `None` without a weather source
    async fn weather_factor(&self, location: &Location) -> Option<f64> {
        let weather = self.weather.as_ref()?;
        match with_timeout(weather.timeout(), weather.current(location)).await {
            Ok(current) => Some(current.weather_factor()),
            Err(ProviderFailure::NotConfigured(reason)) => {
                debug!("No current conditions: {}", reason);
                None
            }
            Err(failure) => {
                warn!("Current weather unavailable, omitting weather factor: {}", failure);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_without_providers() {
        let service = AirQualityService::from_parts(AqiConfig::default(), vec![], None, None);
        assert!(service.health().await.is_empty());
    }

    #[test]
    fn test_data_sources_end_with_mock() {
        let service = AirQualityService::from_parts(AqiConfig::default(), vec![], None, None);
        let sources = service.data_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, Source::MockData.info().name);
    }

    #[test]
    fn test_new_builds_default_chain() {
        let service = AirQualityService::new(AqiConfig::default()).unwrap();
        let names: Vec<&str> = service.data_sources().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["OpenAQ", "NASA TEMPO", "OpenWeather", "Synthetic baseline"]);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = AqiConfig::default();
        config.providers.openaq.timeout_seconds = 600;
        let err = AirQualityService::new(config).err().unwrap();
        assert!(matches!(err, AqiError::Config { .. }));
    }

    #[tokio::test]
    async fn test_score_guess_rejects_bad_guess_before_lookup() {
        let service = AirQualityService::from_parts(AqiConfig::default(), vec![], None, None);
        let location = Location::new(1.0, 1.0).unwrap();
        let err = service.score_guess(&location, 0).await.unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["user_guess"]);
        assert!(service.score_guess(&location, 3).await.is_ok());
    }
}
