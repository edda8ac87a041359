use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{ApiError, ApiRateLimiter, TrafficStatsProvider};
use crate::models::{DateWindow, TrafficStats};

/// The traffic source finalizes numbers one day behind today.
pub const TRAFFIC_LATENCY_DAYS: i64 = 1;

/// Client for the property-keyed traffic-analytics source.
pub struct TrafficStatsClient {
    client: Client,
    base_url: String,
    token: String,
    rate_limiter: ApiRateLimiter,
}

impl TrafficStatsClient {
    pub fn new(base_url: &str, token: &str, requests_per_minute: u32) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("sitepulse/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            rate_limiter: ApiRateLimiter::new(requests_per_minute),
        })
    }

    async fn make_request(&self, url: &str) -> Result<Value, ApiError> {
        self.rate_limiter.wait().await;

        debug!("Making request to: {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TrafficStatsProvider for TrafficStatsClient {
    fn latency_days(&self) -> i64 {
        TRAFFIC_LATENCY_DAYS
    }

    async fn fetch_site_stats(
        &self,
        property_id: &str,
        window: DateWindow,
    ) -> Result<TrafficStats, ApiError> {
        let url = format!(
            "{}/v1/properties/{}/stats?start={}&end={}",
            self.base_url, property_id, window.start, window.end
        );

        let data = self.make_request(&url).await?;
        if !data.is_object() {
            return Err(ApiError::Decode("expected a stats object".to_string()));
        }

        let stats = TrafficStats {
            visits: data.get("visits").and_then(|v| v.as_u64()).unwrap_or(0),
            pageviews: data.get("pageviews").and_then(|v| v.as_u64()).unwrap_or(0),
            avg_visit_seconds: data
                .get("avg_visit_seconds")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            bounce_rate: data.get("bounce_rate").and_then(|v| v.as_f64()).unwrap_or(0.0),
        };

        debug!("Retrieved traffic stats for property {}", property_id);
        Ok(stats)
    }
}
