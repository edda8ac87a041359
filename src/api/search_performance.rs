use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{ApiError, ApiRateLimiter, SearchPerformanceProvider};
use crate::models::{DateWindow, SearchMetricRow, SearchTotals};

/// The search source's reporting lag: data is complete up to two days ago.
pub const SEARCH_LATENCY_DAYS: i64 = 2;

/// Client for the URL-keyed search-performance source.
pub struct SearchPerformanceClient {
    client: Client,
    base_url: String,
    token: String,
    rate_limiter: ApiRateLimiter,
}

impl SearchPerformanceClient {
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
impl SearchPerformanceProvider for SearchPerformanceClient {
    fn latency_days(&self) -> i64 {
        SEARCH_LATENCY_DAYS
    }

    /// Per-page rows for one window. The `page` strings are provider-chosen
    /// and not guaranteed to match stored URLs byte-for-byte.
    async fn fetch_page_metrics(
        &self,
        site_url: &str,
        window: DateWindow,
    ) -> Result<Vec<SearchMetricRow>, ApiError> {
        let url = format!(
            "{}/v1/search/pages?site={}&start={}&end={}",
            self.base_url, site_url, window.start, window.end
        );

        let data = self.make_request(&url).await?;
        let rows_json = data
            .get("rows")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ApiError::Decode("missing rows array".to_string()))?;

        let mut rows = Vec::new();
        for row in rows_json {
            let Some(page) = row.get("page").and_then(|v| v.as_str()) else {
                continue;
            };
            rows.push(SearchMetricRow {
                page: page.to_string(),
                clicks: row.get("clicks").and_then(|v| v.as_u64()).unwrap_or(0),
                impressions: row.get("impressions").and_then(|v| v.as_u64()).unwrap_or(0),
                position: row.get("position").and_then(|v| v.as_f64()).unwrap_or(0.0),
            });
        }

        debug!("Retrieved {} page rows for {}", rows.len(), site_url);
        Ok(rows)
    }

    /// Aggregate totals for one window.
    async fn fetch_totals(
        &self,
        site_url: &str,
        window: DateWindow,
    ) -> Result<SearchTotals, ApiError> {
        let url = format!(
            "{}/v1/search/totals?site={}&start={}&end={}",
            self.base_url, site_url, window.start, window.end
        );

        let data = self.make_request(&url).await?;

        Ok(SearchTotals {
            clicks: data.get("clicks").and_then(|v| v.as_u64()).unwrap_or(0),
            impressions: data.get("impressions").and_then(|v| v.as_u64()).unwrap_or(0),
            position: data.get("position").and_then(|v| v.as_f64()).unwrap_or(0.0),
        })
    }
}
