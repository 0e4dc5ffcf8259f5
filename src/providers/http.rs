//! Shared HTTP plumbing for provider adapters
//!
//! Wraps a reqwest client with transient-failure retries and converts every
//! outcome into either a decoded payload or a [`ProviderFailure`].

use super::{ProviderFailure, ProviderResult};
use crate::AqiError;
use crate::config::ProviderConfig;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("aqi-engine/", env!("CARGO_PKG_VERSION"));

/// JSON-over-HTTP fetcher bound to one upstream
#[derive(Clone)]
pub struct HttpFetcher {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    name: &'static str,
}

impl HttpFetcher {
    /// Build a fetcher from the provider's configuration
    pub fn new(name: &'static str, config: &ProviderConfig) -> Result<Self, AqiError> {
        let timeout = config.timeout();

        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AqiError::config(format!("Failed to create HTTP client for {name}: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout,
            name,
        })
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `path` relative to the base URL and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: &[(&'static str, String)],
    ) -> ProviderResult<T> {
        let url = self.url(path);
        // Never log query strings, they may carry API keys
        let endpoint = url.split('?').next().unwrap_or(&url).to_string();
        debug!(provider = self.name, %endpoint, "Starting HTTP request");
        let start_time = Instant::now();

        let mut request = self.client.get(&url);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await.map_err(|e| self.transport_failure(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(provider = self.name, %endpoint, status = status.as_u16(), "Upstream returned error status");
            return Err(ProviderFailure::Status(status.as_u16()));
        }

        let payload = response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ProviderFailure::Timeout
            } else {
                ProviderFailure::Malformed(self.redacted(e.without_url().to_string()))
            }
        })?;

        let total_duration = start_time.elapsed();
        info!(
            provider = self.name,
            "Successful API request in {:.3}s",
            total_duration.as_secs_f64()
        );
        if total_duration.as_secs() > 5 {
            warn!(
                provider = self.name,
                "Slow API response detected: {:.3}s",
                total_duration.as_secs_f64()
            );
        }

        Ok(payload)
    }

    /// Whether the upstream answers a GET on `path` with a success status
    pub async fn probe(&self, path: &str) -> bool {
        match self.client.get(self.url(path)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(provider = self.name, "Health check failed: {}", self.transport_failure(e));
                false
            }
        }
    }

    fn transport_failure(&self, error: reqwest_middleware::Error) -> ProviderFailure {
        match error {
            reqwest_middleware::Error::Reqwest(err) if err.is_timeout() => ProviderFailure::Timeout,
            reqwest_middleware::Error::Reqwest(err) => {
                ProviderFailure::Transport(self.redacted(err.without_url().to_string()))
            }
            other => ProviderFailure::Transport(self.redacted(other.to_string())),
        }
    }

    /// Error text with the API key masked. Failure values end up in logs.
    fn redacted(&self, message: String) -> String {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => message.replace(key, "[redacted]"),
            _ => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ProviderConfig {
        ProviderConfig {
            enabled: true,
            base_url: base_url.to_string(),
            api_key: None,
            timeout_seconds: 1,
            max_retries: 0,
        }
    }

    #[test]
    fn test_url_joining() {
        let fetcher = HttpFetcher::new("test", &config("https://example.org/api/")).unwrap();
        assert_eq!(fetcher.url("/latest?x=1"), "https://example.org/api/latest?x=1");
        assert_eq!(fetcher.url("status"), "https://example.org/api/status");
        assert_eq!(fetcher.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_redacted_masks_api_key() {
        let mut keyed = config("https://example.org");
        keyed.api_key = Some("SECRETKEY123".to_string());
        let fetcher = HttpFetcher::new("test", &keyed).unwrap();
        assert_eq!(
            fetcher.redacted("request to /weather?appid=SECRETKEY123 failed".to_string()),
            "request to /weather?appid=[redacted] failed"
        );

        let keyless = HttpFetcher::new("test", &config("https://example.org")).unwrap();
        assert_eq!(keyless.redacted("unchanged".to_string()), "unchanged");
    }

    #[tokio::test]
    async fn test_transport_failure_hides_url_and_key() {
        let mut keyed = config("http://127.0.0.1:9");
        keyed.api_key = Some("SECRETKEY123".to_string());
        let fetcher = HttpFetcher::new("test", &keyed).unwrap();

        let result: ProviderResult<serde_json::Value> = fetcher
            .get_json("air_pollution?lat=1&lon=1&appid=SECRETKEY123", &[])
            .await;
        let failure = result.unwrap_err();
        let text = failure.to_string();
        assert!(!text.contains("SECRETKEY123"), "{text}");
        assert!(!text.contains("appid="), "{text}");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_a_failure_value() {
        // Port 9 on loopback refuses connections on any sane test host
        let fetcher = HttpFetcher::new("test", &config("http://127.0.0.1:9")).unwrap();
        let result: ProviderResult<serde_json::Value> = fetcher.get_json("latest", &[]).await;
        assert!(matches!(
            result,
            Err(ProviderFailure::Transport(_)) | Err(ProviderFailure::Timeout)
        ));
        assert!(!fetcher.probe("status").await);
    }
}
