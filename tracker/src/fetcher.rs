use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::types::{FetchConfig, Result, TrackerError};

/// Query parameters. A key may repeat (`conditions[agencies][]`).
pub type Query = Vec<(String, String)>;

/// Shared HTTP client for every source, with per-host request spacing.
///
/// Failed requests are not retried.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub async fn get_json(&self, url: &str, query: &Query) -> Result<Value> {
        let body = self.get(url, query).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.get(url, &Vec::new()).await
    }

    async fn get(&self, url: &str, query: &Query) -> Result<String> {
        self.apply_rate_limit(url).await?;

        // Query strings may carry an api_key; only the bare URL is logged.
        debug!("GET {}", url);
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let limit = self.config.max_response_mb * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit {
                return Err(TrackerError::ResponseTooLarge {
                    url: url.to_string(),
                    size_mb: content_length as usize / (1024 * 1024),
                });
            }
        }

        let body = response.text().await?;
        if body.len() > limit {
            return Err(TrackerError::ResponseTooLarge {
                url: url.to_string(),
                size_mb: body.len() / (1024 * 1024),
            });
        }

        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }

    async fn apply_rate_limit(&self, url: &str) -> Result<()> {
        let parsed_url = Url::parse(url)?;
        let host = parsed_url.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.min_request_interval_ms);

        let mut rate_limiter = self.rate_limiter.write().await;
        if let Some(last_request) = rate_limiter.get(&host) {
            let elapsed = last_request.elapsed();
            if elapsed < min_interval {
                let wait_time = min_interval - elapsed;
                debug!("Rate limiting {}: waiting {:?}", host, wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        rate_limiter.insert(host, Instant::now());

        Ok(())
    }
}

/// Builds a `Query` from literal pairs.
pub fn query<const N: usize>(pairs: [(&str, String); N]) -> Query {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
