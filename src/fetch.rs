use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::ApiError;

/// Retry policy for document downloads.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `backoff * 2^n` before the next try.
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(800),
            timeout: Duration::from_secs(10),
        }
    }
}

impl FetchPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Downloads agent cards and chat logs.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
}

impl Fetcher {
    pub fn new(policy: FetchPolicy) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Fetcher { client, policy })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// GET `url`, retrying transport errors and non-2xx responses.
    pub async fn fetch_with_retries(&self, url: &str) -> Result<String, ApiError> {
        let attempts = self.policy.max_retries.max(1);
        let mut last_err = String::new();

        for attempt in 0..attempts {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::warn!(
                        url,
                        attempt = attempt + 1,
                        of = attempts,
                        "Fetch failed: {}",
                        e
                    );
                    last_err = e.to_string();
                    if attempt + 1 < attempts {
                        sleep(self.policy.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(ApiError::BadGateway(format!(
            "Failed to fetch {}: {}",
            url, last_err
        )))
    }
}
