//! Scheduled batch refresh driver. Walks all projects in small fixed-size
//! groups under a wall-clock budget: once the budget is spent it stops
//! scheduling new groups but never cancels calls already in flight.

use anyhow::Result;
use futures::future::join_all;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::date_range::RangeKey;
use crate::gateway::DashboardGateway;

/// Configuration for a batch refresh run.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub range: RangeKey,
    pub group_size: usize,
    pub budget: Duration,
    pub force_refresh: bool,
    /// Optional limit for testing
    pub max_projects: Option<usize>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            range: RangeKey::Days30,
            group_size: 5,
            budget: Duration::from_secs(240),
            force_refresh: false,
            max_projects: None,
        }
    }
}

/// Result of a batch refresh run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub total_projects: usize,
    pub refreshed: usize,
    pub served_from_cache: usize,
    pub failed: usize,
    /// True when the budget ran out before every group was scheduled.
    pub out_of_budget: bool,
}

/// Refresh the configured range for every project. Per-project failures are
/// logged and counted, never fatal for the run.
pub async fn refresh_all_projects(
    gateway: &DashboardGateway,
    config: &RefreshConfig,
) -> Result<RefreshReport> {
    let deadline = Instant::now() + config.budget;

    let mut projects: Vec<(i64, String)> = gateway
        .database()
        .list_projects()
        .await?
        .into_iter()
        .filter_map(|p| p.id.map(|id| (id, p.name)))
        .collect();
    if let Some(max_projects) = config.max_projects {
        projects.truncate(max_projects);
    }

    let mut report = RefreshReport {
        total_projects: projects.len(),
        ..Default::default()
    };
    info!(
        "Starting batch refresh of {} projects (range {}, groups of {})",
        report.total_projects, config.range, config.group_size
    );

    let mut scheduled = 0usize;
    for group in projects.chunks(config.group_size.max(1)) {
        // Budget is only consulted between groups, never mid-fetch.
        if Instant::now() >= deadline {
            warn!(
                "Execution budget exhausted, {} of {} projects left unscheduled",
                report.total_projects - scheduled,
                report.total_projects
            );
            report.out_of_budget = true;
            break;
        }

        let results = join_all(group.iter().map(|(id, _)| {
            gateway.get_or_fetch(*id, config.range, config.force_refresh)
        }))
        .await;
        scheduled += group.len();

        for ((id, name), result) in group.iter().zip(results) {
            match result {
                Ok(outcome) if outcome.from_cache => report.served_from_cache += 1,
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    warn!("Refresh failed for project {} ({}): {}", id, name, e);
                    report.failed += 1;
                }
            }
        }
    }

    info!(
        "Batch refresh done: {} refreshed, {} from cache, {} failed",
        report.refreshed, report.served_from_cache, report.failed
    );
    Ok(report)
}
