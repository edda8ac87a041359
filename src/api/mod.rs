use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{DateWindow, SearchMetricRow, SearchTotals, TrafficStats};

pub mod search_performance;
pub mod traffic_stats;
pub use search_performance::SearchPerformanceClient;
pub use traffic_stats::TrafficStatsClient;

/// Per-source fetch failure. The gateway downgrades these to soft
/// `api_errors` annotations; they never abort the other source.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Spaces outbound requests evenly so a batch refresh stays inside the
/// per-minute quota each source enforces.
pub struct ApiRateLimiter {
    delay: Duration,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let delay = if requests_per_minute > 0 {
            Duration::from_millis(60_000 / requests_per_minute as u64)
        } else {
            // A zero quota means the caller configured nothing sensible.
            Duration::from_secs(1)
        };

        Self { delay }
    }

    pub async fn wait(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// URL-keyed search-performance source. Rows come back keyed by whatever
/// URL string the provider chose to emit for a page.
#[async_trait]
pub trait SearchPerformanceProvider: Send + Sync {
    /// Days behind today the source's last fully-available reporting date is.
    fn latency_days(&self) -> i64;

    async fn fetch_page_metrics(
        &self,
        site_url: &str,
        window: DateWindow,
    ) -> Result<Vec<SearchMetricRow>, ApiError>;

    async fn fetch_totals(
        &self,
        site_url: &str,
        window: DateWindow,
    ) -> Result<SearchTotals, ApiError>;
}

/// Property-keyed traffic-analytics source. Metrics are keyed by a property
/// identifier only, so no URL matching is involved.
#[async_trait]
pub trait TrafficStatsProvider: Send + Sync {
    fn latency_days(&self) -> i64;

    async fn fetch_site_stats(
        &self,
        property_id: &str,
        window: DateWindow,
    ) -> Result<TrafficStats, ApiError>;
}
