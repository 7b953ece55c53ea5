//! Connectivity Probe Implementation

use async_trait::async_trait;
use bridge_traits::{
    http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy},
    network::{ConnectivityProbe, NetworkStatus},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Endpoint probed when none is configured
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com";

/// Probe deadline when none is configured
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Desktop connectivity probe
///
/// Sends a single HEAD request to a stable endpoint. Any HTTP response,
/// whatever its status, counts as online; a transport error or a timeout
/// counts as offline. The request is never retried.
pub struct HttpConnectivityProbe {
    http_client: Arc<dyn HttpClient>,
    url: String,
    timeout: Duration,
}

impl HttpConnectivityProbe {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            url: DEFAULT_PROBE_URL.to_string(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn single_shot() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn probe(&self) -> NetworkStatus {
        let request = HttpRequest::new(HttpMethod::Head, &self.url).timeout(self.timeout);
        let attempt = self
            .http_client
            .execute_with_retry(request, Self::single_shot());

        let status = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(_)) => NetworkStatus::Online,
            Ok(Err(e)) => {
                debug!(url = %self.url, error = %e, "Connectivity probe failed");
                NetworkStatus::Offline
            }
            Err(_) => {
                debug!(url = %self.url, timeout_ms = self.timeout.as_millis() as u64, "Connectivity probe timed out");
                NetworkStatus::Offline
            }
        };

        debug!(status = ?status, "Network check");
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result};
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
            async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_any_response_is_online() {
        let mut http = MockHttp::new();
        http.expect_execute_with_retry()
            .withf(|req, policy| {
                req.method == HttpMethod::Head
                    && req.url == DEFAULT_PROBE_URL
                    && policy.max_attempts == 1
            })
            .times(1)
            .returning(|_, _| Ok(response(405)));

        let probe = HttpConnectivityProbe::new(Arc::new(http));
        assert_eq!(probe.probe().await, NetworkStatus::Online);
    }

    #[tokio::test]
    async fn test_transport_error_is_offline() {
        let mut http = MockHttp::new();
        http.expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Err(BridgeError::OperationFailed("dns".into())));

        let probe = HttpConnectivityProbe::new(Arc::new(http)).with_url("https://probe.test");
        assert!(!probe.is_online().await);
    }

    struct StalledHttp;

    #[async_trait]
    impl HttpClient for StalledHttp {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(response(200))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_probe_times_out_offline() {
        let probe = HttpConnectivityProbe::new(Arc::new(StalledHttp))
            .with_timeout(Duration::from_millis(50));

        assert_eq!(probe.probe().await, NetworkStatus::Offline);
    }
}
