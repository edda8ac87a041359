//! Period-over-period comparison of metric values.

use crate::models::{
    MetricDelta, PageMetrics, SearchSummary, SearchTotals, TrafficStats, TrafficSummary,
};

/// Percent change of `current` against `previous`, rounded to one decimal.
///
/// The zero-previous convention is load-bearing: a previous value of zero
/// reports +100% when anything showed up in the current window and 0%
/// otherwise, never a division error.
pub fn delta(current: f64, previous: f64) -> MetricDelta {
    let change = if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    };

    MetricDelta {
        value: current,
        change: round1(change),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn build_search_summary(
    current: &SearchTotals,
    previous: &SearchTotals,
    pages: Vec<PageMetrics>,
) -> SearchSummary {
    SearchSummary {
        clicks: delta(current.clicks as f64, previous.clicks as f64),
        impressions: delta(current.impressions as f64, previous.impressions as f64),
        position: delta(current.position, previous.position),
        pages,
    }
}

pub fn build_traffic_summary(current: &TrafficStats, previous: &TrafficStats) -> TrafficSummary {
    TrafficSummary {
        visits: delta(current.visits as f64, previous.visits as f64),
        pageviews: delta(current.pageviews as f64, previous.pageviews as f64),
        avg_visit_seconds: delta(current.avg_visit_seconds, previous.avg_visit_seconds),
        bounce_rate: delta(current.bounce_rate, previous.bounce_rate),
    }
}
