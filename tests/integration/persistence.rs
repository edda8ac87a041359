//! File-backed database lifecycle: data survives reconnecting.

use chrono::Utc;
use tempfile::tempdir;

use sitepulse::database::Database;
use sitepulse::models::{CacheEntry, Project};

#[test_log::test(tokio::test)]
async fn test_cache_rows_survive_reconnect() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("sitepulse.db");
    let db_path = db_path.to_str().unwrap();

    let project_id = {
        let db = Database::connect(db_path).await.unwrap();
        let project_id = db
            .insert_project(&Project {
                id: None,
                name: "Shop".to_string(),
                site_url: "https://shop.example".to_string(),
                analytics_property_id: "prop-1".to_string(),
            })
            .await
            .unwrap();

        db.upsert_cache_entry(&CacheEntry {
            project_id,
            range_key: "30d".to_string(),
            payload: r#"{"cached":true}"#.to_string(),
            last_fetched_at: Utc::now(),
        })
        .await
        .unwrap();

        project_id
    };

    // Migrations are idempotent on an existing file.
    let db = Database::connect(db_path).await.unwrap();
    let entry = db.get_cache_entry(project_id, "30d").await.unwrap().unwrap();
    assert_eq!(entry.payload, r#"{"cached":true}"#);

    let project = db.get_project(project_id).await.unwrap().unwrap();
    assert_eq!(project.name, "Shop");
}
