use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tenant project: one site tracked by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<i64>,
    pub name: String,
    /// Site URL as registered with the search-performance source.
    pub site_url: String,
    /// Property identifier for the traffic-analytics source.
    pub analytics_property_id: String,
}

/// A landing page tracked for a project. The URL is user-entered and not
/// pre-normalized; the cached metric fields are written back by the gateway
/// after a successful search-source fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingPage {
    pub id: Option<i64>,
    pub project_id: i64,
    pub url: String,
    pub clicks: Option<i64>,
    pub impressions: Option<i64>,
    pub position: Option<f64>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_range_key: Option<String>,
}

/// One row as reported verbatim by the search-performance source.
/// The `page` string's exact form (scheme, www, trailing slash, locale
/// prefix) is provider-controlled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetricRow {
    pub page: String,
    pub clicks: u64,
    pub impressions: u64,
    pub position: f64,
}

/// Aggregate totals from the search-performance source for one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchTotals {
    pub clicks: u64,
    pub impressions: u64,
    pub position: f64,
}

/// Aggregate site statistics from the property-keyed traffic source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficStats {
    pub visits: u64,
    pub pageviews: u64,
    pub avg_visit_seconds: f64,
    pub bounce_rate: f64,
}

/// Inclusive calendar-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Current and previous reporting windows. `previous` is immediately
/// adjacent to and the same length as `current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonWindows {
    pub current: DateWindow,
    pub previous: DateWindow,
}

/// Value plus percent change against the previous window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub value: f64,
    pub change: f64,
}

/// Matched per-page metrics carried in the payload for UI tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetrics {
    pub url: String,
    pub clicks: u64,
    pub impressions: u64,
    pub position: f64,
}

/// Search-source portion of the merged payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub clicks: MetricDelta,
    pub impressions: MetricDelta,
    pub position: MetricDelta,
    pub pages: Vec<PageMetrics>,
}

/// Traffic-source portion of the merged payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSummary {
    pub visits: MetricDelta,
    pub pageviews: MetricDelta,
    pub avg_visit_seconds: MetricDelta,
    pub bounce_rate: MetricDelta,
}

/// Per-source comparison windows used for one payload. The two sources
/// report with different latency, so their windows differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadWindows {
    pub search: ComparisonWindows,
    pub traffic: ComparisonWindows,
}

/// The merged dashboard payload cached per (project, range).
/// A source that failed is `None` here and has an entry in `api_errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardPayload {
    pub range_key: String,
    pub windows: PayloadWindows,
    pub search: Option<SearchSummary>,
    pub traffic: Option<TrafficSummary>,
    #[serde(default)]
    pub api_errors: BTreeMap<String, String>,
    pub generated_at: DateTime<Utc>,
}

/// One cache row, unique on (project_id, range_key).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub project_id: i64,
    pub range_key: String,
    pub payload: String,
    pub last_fetched_at: DateTime<Utc>,
}

/// Result of a gateway lookup.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub payload: DashboardPayload,
    pub from_cache: bool,
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub search_api_base: String,
    pub search_api_token: String,
    pub traffic_api_base: String,
    pub traffic_api_token: String,
    pub staleness_hours: i64,
    pub batch_group_size: usize,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "sitepulse.db".to_string()),
            search_api_base: std::env::var("SEARCH_API_BASE")
                .map_err(|_| anyhow::anyhow!("SEARCH_API_BASE environment variable required"))?,
            search_api_token: std::env::var("SEARCH_API_TOKEN")
                .map_err(|_| anyhow::anyhow!("SEARCH_API_TOKEN environment variable required"))?,
            traffic_api_base: std::env::var("TRAFFIC_API_BASE")
                .map_err(|_| anyhow::anyhow!("TRAFFIC_API_BASE environment variable required"))?,
            traffic_api_token: std::env::var("TRAFFIC_API_TOKEN")
                .map_err(|_| anyhow::anyhow!("TRAFFIC_API_TOKEN environment variable required"))?,
            staleness_hours: std::env::var("CACHE_STALENESS_HOURS")
                .unwrap_or_else(|_| "48".to_string())
                .parse()
                .unwrap_or(48),
            batch_group_size: std::env::var("BATCH_GROUP_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            rate_limit_per_minute: std::env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
        })
    }
}
