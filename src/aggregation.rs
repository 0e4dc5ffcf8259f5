//! Multi-provider aggregation with ordered fallback
//!
//! Providers are consulted in priority order. For every configured parameter
//! the first usable reading from the highest-priority provider wins; any
//! parameter nobody reports is filled from the location-seeded baseline.

use crate::baseline::BaselineModel;
use crate::config::{AggregationConfig, AggregationMode};
use crate::models::{Location, Parameter, PollutantBundle, PollutantReading, Source};
use crate::providers::{PollutantProvider, ProviderResult, with_timeout};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

pub struct Aggregator {
    providers: Vec<Arc<dyn PollutantProvider>>,
    parameters: Vec<Parameter>,
    mode: AggregationMode,
    baseline: BaselineModel,
}

impl Aggregator {
    /// `providers` must already be in priority order
    #[must_use]
    pub fn new(
        providers: Vec<Arc<dyn PollutantProvider>>,
        config: &AggregationConfig,
        baseline: BaselineModel,
    ) -> Self {
        let mut parameters = config.parameters.clone();
        parameters.sort();
        parameters.dedup();
        Self {
            providers,
            parameters,
            mode: config.mode,
            baseline,
        }
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn PollutantProvider>] {
        &self.providers
    }

    #[must_use]
    pub fn baseline(&self) -> &BaselineModel {
        &self.baseline
    }

    /// Best available reading for every configured parameter
    #[instrument(skip(self), fields(location = %location.format_coordinates(), mode = ?self.mode))]
    pub async fn aggregate(&self, location: &Location) -> PollutantBundle {
        let start_time = Instant::now();
        let mut bundle = PollutantBundle::new();

        match self.mode {
            AggregationMode::Sequential => {
                for provider in &self.providers {
                    if self.is_complete(&bundle) {
                        debug!("All parameters covered, skipping remaining providers");
                        break;
                    }
                    let result = fetch_with_timeout(provider.as_ref(), location).await;
                    self.merge(&mut bundle, provider.source(), result);
                }
            }
            AggregationMode::Concurrent => {
                let results = join_all(
                    self.providers
                        .iter()
                        .map(|provider| fetch_with_timeout(provider.as_ref(), location)),
                )
                .await;
                for (provider, result) in self.providers.iter().zip(results) {
                    self.merge(&mut bundle, provider.source(), result);
                }
            }
        }

        let contributed = !bundle.data_sources().is_empty();
        let missing: Vec<Parameter> = self
            .parameters
            .iter()
            .copied()
            .filter(|p| !bundle.contains(*p))
            .collect();

        if !missing.is_empty() {
            if !contributed {
                warn!("No provider returned data, falling back to baseline estimate");
            } else {
                debug!("Filling {} missing parameter(s) from baseline", missing.len());
            }
            let now = Utc::now();
            for parameter in missing {
                bundle.offer(self.baseline.mock_reading(location, parameter, now));
            }
        }
        if !contributed {
            bundle.record_source(Source::MockData);
        }

        info!(
            sources = ?bundle.data_sources(),
            "Aggregated {} parameter(s) in {:.3}s",
            bundle.len(),
            start_time.elapsed().as_secs_f64()
        );
        bundle
    }

    fn is_complete(&self, bundle: &PollutantBundle) -> bool {
        self.parameters.iter().all(|p| bundle.contains(*p))
    }

    fn merge(&self, bundle: &mut PollutantBundle, source: Source, result: ProviderResult<Vec<PollutantReading>>) {
        match result {
            Ok(readings) => {
                let mut kept = 0;
                for reading in readings {
                    if !reading.is_usable() || !self.parameters.contains(&reading.parameter) {
                        continue;
                    }
                    if bundle.offer(reading) {
                        kept += 1;
                    }
                }
                if kept > 0 {
                    bundle.record_source(source);
                }
                debug!(provider = %source, "Kept {} reading(s)", kept);
            }
            Err(failure) => {
                warn!(provider = %source, "Provider failed: {}", failure);
            }
        }
    }
}

/// Run one provider call within its own deadline
async fn fetch_with_timeout(
    provider: &dyn PollutantProvider,
    location: &Location,
) -> ProviderResult<Vec<PollutantReading>> {
    with_timeout(provider.timeout(), provider.fetch(location)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aqi::AqiCalculator;
    use crate::config::SeedMode;
    use crate::providers::ProviderFailure;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeProvider {
        source: Source,
        result: ProviderResult<Vec<(Parameter, f64)>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn ok(source: Source, values: &[(Parameter, f64)]) -> Arc<Self> {
            Arc::new(Self {
                source,
                result: Ok(values.to_vec()),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(source: Source, failure: ProviderFailure) -> Arc<Self> {
            Arc::new(Self {
                source,
                result: Err(failure),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(source: Source, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                source,
                result: Ok(vec![(Parameter::No2, 1.0)]),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PollutantProvider for FakeProvider {
        fn source(&self) -> Source {
            self.source
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        async fn fetch(&self, _location: &Location) -> ProviderResult<Vec<PollutantReading>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.result.clone().map(|values| {
                values
                    .into_iter()
                    .map(|(p, v)| PollutantReading::new(p, v, self.source, Utc::now()))
                    .collect()
            })
        }
    }

    fn aggregator(providers: Vec<Arc<dyn PollutantProvider>>, mode: AggregationMode) -> Aggregator {
        let config = AggregationConfig {
            mode,
            ..AggregationConfig::default()
        };
        Aggregator::new(
            providers,
            &config,
            BaselineModel::new(AqiCalculator::default(), SeedMode::Location),
        )
    }

    fn location() -> Location {
        Location::new(40.71, -74.01).unwrap()
    }

    #[tokio::test]
    async fn test_priority_order_wins_per_parameter() {
        let ground = FakeProvider::ok(Source::Openaq, &[(Parameter::Pm25, 8.0), (Parameter::No2, 20.0)]);
        let satellite = FakeProvider::ok(Source::Tempo, &[(Parameter::No2, 90.0), (Parameter::O3, 40.0)]);
        let modelled = FakeProvider::ok(Source::Openweather, &[(Parameter::Pm10, 30.0), (Parameter::O3, 99.0)]);

        let bundle = aggregator(vec![ground, satellite, modelled], AggregationMode::Sequential)
            .aggregate(&location())
            .await;

        assert_eq!(bundle.get(Parameter::No2).unwrap().value, 20.0);
        assert_eq!(bundle.get(Parameter::O3).unwrap().source, Source::Tempo);
        assert_eq!(bundle.get(Parameter::Pm10).unwrap().source, Source::Openweather);
        assert_eq!(
            bundle.data_sources(),
            &[Source::Openaq, Source::Tempo, Source::Openweather]
        );
    }

    #[tokio::test]
    async fn test_failures_fall_through_to_next_tier() {
        let ground = FakeProvider::failing(Source::Openaq, ProviderFailure::Status(503));
        let satellite = FakeProvider::failing(Source::Tempo, ProviderFailure::Malformed("eof".into()));
        let modelled = FakeProvider::ok(
            Source::Openweather,
            &[
                (Parameter::No2, 1.0),
                (Parameter::O3, 2.0),
                (Parameter::Pm25, 3.0),
                (Parameter::Pm10, 4.0),
            ],
        );

        let bundle = aggregator(vec![ground, satellite, modelled], AggregationMode::Sequential)
            .aggregate(&location())
            .await;
        assert_eq!(bundle.data_sources(), &[Source::Openweather]);
        assert_eq!(bundle.len(), 4);
    }

    #[tokio::test]
    async fn test_all_failing_yields_mock_data() {
        let providers: Vec<Arc<dyn PollutantProvider>> = vec![
            FakeProvider::failing(Source::Openaq, ProviderFailure::Timeout),
            FakeProvider::failing(Source::Tempo, ProviderFailure::NotConfigured("key".into())),
            FakeProvider::ok(Source::Openweather, &[]),
        ];
        let aggregator = aggregator(providers, AggregationMode::Sequential);

        let first = aggregator.aggregate(&location()).await;
        let second = aggregator.aggregate(&location()).await;
        assert_eq!(first.data_sources(), &[Source::MockData]);
        assert_eq!(first.len(), 4);
        assert!(first.readings().all(|r| r.source == Source::MockData));
        let values = |b: &PollutantBundle| b.readings().map(|r| r.value).collect::<Vec<_>>();
        assert_eq!(values(&first), values(&second));
    }

    #[tokio::test]
    async fn test_partial_coverage_is_filled_without_mock_source() {
        let ground = FakeProvider::ok(Source::Openaq, &[(Parameter::Pm25, 8.0)]);
        let bundle = aggregator(vec![ground], AggregationMode::Sequential)
            .aggregate(&location())
            .await;
        assert_eq!(bundle.len(), 4);
        assert_eq!(bundle.data_sources(), &[Source::Openaq]);
        assert_eq!(bundle.get(Parameter::O3).unwrap().source, Source::MockData);
    }

    #[tokio::test]
    async fn test_unconfigured_and_unusable_readings_are_dropped() {
        let ground = FakeProvider::ok(Source::Openaq, &[(Parameter::Hcho, 5.0), (Parameter::No2, -4.0)]);
        let satellite = FakeProvider::ok(Source::Tempo, &[(Parameter::No2, 12.0)]);
        let bundle = aggregator(vec![ground, satellite], AggregationMode::Sequential)
            .aggregate(&location())
            .await;
        assert!(!bundle.contains(Parameter::Hcho));
        assert_eq!(bundle.get(Parameter::No2).unwrap().source, Source::Tempo);
        assert_eq!(bundle.data_sources(), &[Source::Tempo]);
    }

    #[tokio::test]
    async fn test_sequential_stops_once_complete() {
        let ground = FakeProvider::ok(
            Source::Openaq,
            &[
                (Parameter::No2, 1.0),
                (Parameter::O3, 2.0),
                (Parameter::Pm25, 3.0),
                (Parameter::Pm10, 4.0),
            ],
        );
        let satellite = FakeProvider::ok(Source::Tempo, &[(Parameter::No2, 5.0)]);
        let providers: Vec<Arc<dyn PollutantProvider>> = vec![ground, satellite.clone()];
        aggregator(providers, AggregationMode::Sequential)
            .aggregate(&location())
            .await;
        assert_eq!(satellite.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let slow = FakeProvider::slow(Source::Openaq, Duration::from_secs(30));
        let fallback = FakeProvider::ok(Source::Tempo, &[(Parameter::No2, 7.0)]);
        let bundle = aggregator(vec![slow, fallback], AggregationMode::Sequential)
            .aggregate(&location())
            .await;
        assert_eq!(bundle.get(Parameter::No2).unwrap().source, Source::Tempo);
        assert_eq!(bundle.data_sources(), &[Source::Tempo]);
    }

    #[tokio::test]
    async fn test_concurrent_mode_keeps_priority_order() {
        let ground = FakeProvider::ok(Source::Openaq, &[(Parameter::No2, 20.0)]);
        let satellite = FakeProvider::ok(Source::Tempo, &[(Parameter::No2, 90.0), (Parameter::O3, 40.0)]);
        let bundle = aggregator(vec![satellite.clone(), ground.clone()], AggregationMode::Concurrent)
            .aggregate(&location())
            .await;
        assert_eq!(bundle.get(Parameter::No2).unwrap().source, Source::Tempo);
        assert_eq!(bundle.data_sources(), &[Source::Tempo]);
        assert_eq!(ground.calls.load(Ordering::SeqCst), 1);
    }
}
