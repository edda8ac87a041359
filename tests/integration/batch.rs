//! Batch refresh driver: grouping, budget, and cache interplay.

use std::sync::Arc;
use std::time::Duration;

use sitepulse::batch::{refresh_all_projects, RefreshConfig};
use sitepulse::database::Database;
use sitepulse::date_range::RangeKey;
use sitepulse::gateway::DashboardGateway;
use sitepulse::models::Project;

use crate::common::fakes::{FakeSearch, FakeTraffic};

async fn seed_projects(db: &Database, count: usize) {
    for i in 0..count {
        db.insert_project(&Project {
            id: None,
            name: format!("Project {}", i),
            site_url: format!("https://site-{}.example", i),
            analytics_property_id: format!("prop-{}", i),
        })
        .await
        .unwrap();
    }
}

fn build_gateway(db: Database) -> DashboardGateway {
    DashboardGateway::new(
        db,
        Arc::new(FakeSearch::new(Vec::new())),
        Arc::new(FakeTraffic::new()),
        48,
    )
}

#[tokio::test]
async fn test_refreshes_all_projects_in_groups() {
    let db = Database::connect_memory().await.unwrap();
    seed_projects(&db, 7).await;
    let gateway = build_gateway(db);

    let config = RefreshConfig {
        range: RangeKey::Days30,
        group_size: 3,
        ..Default::default()
    };
    let report = refresh_all_projects(&gateway, &config).await.unwrap();

    assert_eq!(report.total_projects, 7);
    assert_eq!(report.refreshed, 7);
    assert_eq!(report.failed, 0);
    assert!(!report.out_of_budget);

    // A second run inside the staleness window is all cache hits.
    let report = refresh_all_projects(&gateway, &config).await.unwrap();
    assert_eq!(report.served_from_cache, 7);
    assert_eq!(report.refreshed, 0);
}

#[tokio::test]
async fn test_exhausted_budget_stops_scheduling() {
    let db = Database::connect_memory().await.unwrap();
    seed_projects(&db, 4).await;
    let gateway = build_gateway(db);

    let config = RefreshConfig {
        range: RangeKey::Days30,
        group_size: 2,
        budget: Duration::ZERO,
        ..Default::default()
    };
    let report = refresh_all_projects(&gateway, &config).await.unwrap();

    assert!(report.out_of_budget);
    assert_eq!(report.refreshed, 0);
    assert_eq!(report.total_projects, 4);
}

#[tokio::test]
async fn test_max_projects_limit() {
    let db = Database::connect_memory().await.unwrap();
    seed_projects(&db, 5).await;
    let gateway = build_gateway(db);

    let config = RefreshConfig {
        range: RangeKey::Days7,
        max_projects: Some(2),
        ..Default::default()
    };
    let report = refresh_all_projects(&gateway, &config).await.unwrap();

    assert_eq!(report.total_projects, 2);
    assert_eq!(report.refreshed, 2);
}

#[tokio::test]
async fn test_source_failures_do_not_fail_the_run() {
    let db = Database::connect_memory().await.unwrap();
    seed_projects(&db, 3).await;
    let gateway = DashboardGateway::new(
        db,
        Arc::new(FakeSearch::failing()),
        Arc::new(FakeTraffic::new()),
        48,
    );

    let config = RefreshConfig {
        range: RangeKey::Days30,
        ..Default::default()
    };
    let report = refresh_all_projects(&gateway, &config).await.unwrap();

    // Partial payloads still count as refreshed; the failure lives in
    // each payload's api_errors, not in the batch report.
    assert_eq!(report.refreshed, 3);
    assert_eq!(report.failed, 0);
}
