//! Hand-written provider fakes for gateway and batch tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use sitepulse::api::{ApiError, SearchPerformanceProvider, TrafficStatsProvider};
use sitepulse::models::{DateWindow, SearchMetricRow, SearchTotals, TrafficStats};

fn fail_error() -> ApiError {
    ApiError::Status {
        status: 503,
        body: "upstream unavailable".to_string(),
    }
}

/// Fake URL-keyed source. Serves fixed totals for the current/previous
/// window and a fixed row set; can be switched to fail, and counts calls.
pub struct FakeSearch {
    pub rows: Vec<SearchMetricRow>,
    pub current_totals: SearchTotals,
    pub previous_totals: SearchTotals,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
}

impl FakeSearch {
    pub fn new(rows: Vec<SearchMetricRow>) -> Self {
        Self {
            rows,
            current_totals: SearchTotals { clicks: 150, impressions: 3000, position: 4.0 },
            previous_totals: SearchTotals { clicks: 100, impressions: 3000, position: 5.0 },
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn failing() -> Self {
        let fake = Self::new(Vec::new());
        fake.fail.store(true, Ordering::SeqCst);
        fake
    }

    async fn checkpoint(&self) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(fail_error());
        }
        Ok(())
    }

    fn is_current(&self, window: DateWindow) -> bool {
        // The gateway lays the current window out against today minus our
        // latency; anything older is the previous window.
        window.end == Utc::now().date_naive() - ChronoDuration::days(self.latency_days())
    }
}

#[async_trait]
impl SearchPerformanceProvider for FakeSearch {
    fn latency_days(&self) -> i64 {
        2
    }

    async fn fetch_page_metrics(
        &self,
        _site_url: &str,
        _window: DateWindow,
    ) -> Result<Vec<SearchMetricRow>, ApiError> {
        self.checkpoint().await?;
        Ok(self.rows.clone())
    }

    async fn fetch_totals(
        &self,
        _site_url: &str,
        window: DateWindow,
    ) -> Result<SearchTotals, ApiError> {
        self.checkpoint().await?;
        if self.is_current(window) {
            Ok(self.current_totals.clone())
        } else {
            Ok(self.previous_totals.clone())
        }
    }
}

/// Fake property-keyed source.
pub struct FakeTraffic {
    pub current: TrafficStats,
    pub previous: TrafficStats,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeTraffic {
    pub fn new() -> Self {
        Self {
            current: TrafficStats {
                visits: 220,
                pageviews: 660,
                avg_visit_seconds: 65.0,
                bounce_rate: 40.0,
            },
            previous: TrafficStats {
                visits: 200,
                pageviews: 600,
                avg_visit_seconds: 50.0,
                bounce_rate: 50.0,
            },
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let fake = Self::new();
        fake.fail.store(true, Ordering::SeqCst);
        fake
    }
}

#[async_trait]
impl TrafficStatsProvider for FakeTraffic {
    fn latency_days(&self) -> i64 {
        1
    }

    async fn fetch_site_stats(
        &self,
        _property_id: &str,
        window: DateWindow,
    ) -> Result<TrafficStats, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(fail_error());
        }
        let current_end = Utc::now().date_naive() - ChronoDuration::days(self.latency_days());
        if window.end == current_end {
            Ok(self.current.clone())
        } else {
            Ok(self.previous.clone())
        }
    }
}
