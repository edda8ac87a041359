use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use crate::models::{CacheEntry, LandingPage, Project, SearchMetricRow};

/// Handle on the sqlite store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database file and run migrations.
    pub async fn connect(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Database { pool };
        db.run_migrations().await?;
        info!("Database initialized at {}", database_path);

        Ok(db)
    }

    /// In-memory database for tests. Single connection, or every checkout
    /// would see its own empty database.
    pub async fn connect_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Database { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                site_url TEXT NOT NULL,
                analytics_property_id TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS landing_pages (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL,
                url TEXT NOT NULL,
                clicks INTEGER,
                impressions INTEGER,
                position REAL,
                last_updated_at DATETIME,
                last_range_key TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (project_id) REFERENCES projects(id),
                UNIQUE(project_id, url)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS dashboard_cache (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL,
                range_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                last_fetched_at DATETIME NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id),
                UNIQUE(project_id, range_key)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_landing_pages_project
             ON landing_pages(project_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_dashboard_cache_key
             ON dashboard_cache(project_id, range_key)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_project(&self, project: &Project) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO projects (name, site_url, analytics_property_id)
             VALUES (?, ?, ?)",
        )
        .bind(&project.name)
        .bind(&project.site_url)
        .bind(&project.analytics_property_id)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_project(&self, project_id: i64) -> Result<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, name, site_url, analytics_property_id
             FROM projects WHERE id = ?",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Project {
            id: Some(row.get("id")),
            name: row.get("name"),
            site_url: row.get("site_url"),
            analytics_property_id: row.get("analytics_property_id"),
        }))
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query(
            "SELECT id, name, site_url, analytics_property_id
             FROM projects ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Project {
                id: Some(row.get("id")),
                name: row.get("name"),
                site_url: row.get("site_url"),
                analytics_property_id: row.get("analytics_property_id"),
            })
            .collect())
    }

    pub async fn insert_landing_page(&self, project_id: i64, url: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO landing_pages (project_id, url) VALUES (?, ?)
             ON CONFLICT(project_id, url) DO NOTHING",
        )
        .bind(project_id)
        .bind(url)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_landing_pages(&self, project_id: i64) -> Result<Vec<LandingPage>> {
        let rows = sqlx::query(
            "SELECT id, project_id, url, clicks, impressions, position,
                    last_updated_at, last_range_key
             FROM landing_pages WHERE project_id = ? ORDER BY id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LandingPage {
                id: Some(row.get("id")),
                project_id: row.get("project_id"),
                url: row.get("url"),
                clicks: row.get("clicks"),
                impressions: row.get("impressions"),
                position: row.get("position"),
                last_updated_at: row.get("last_updated_at"),
                last_range_key: row.get("last_range_key"),
            })
            .collect())
    }

    /// Write matched per-page metrics back onto the landing-page row.
    pub async fn update_landing_page_metrics(
        &self,
        project_id: i64,
        url: &str,
        metrics: &SearchMetricRow,
        range_key: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE landing_pages
             SET clicks = ?, impressions = ?, position = ?,
                 last_updated_at = ?, last_range_key = ?
             WHERE project_id = ? AND url = ?",
        )
        .bind(metrics.clicks as i64)
        .bind(metrics.impressions as i64)
        .bind(metrics.position)
        .bind(updated_at)
        .bind(range_key)
        .bind(project_id)
        .bind(url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_cache_entry(
        &self,
        project_id: i64,
        range_key: &str,
    ) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT project_id, range_key, payload, last_fetched_at
             FROM dashboard_cache WHERE project_id = ? AND range_key = ?",
        )
        .bind(project_id)
        .bind(range_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CacheEntry {
            project_id: row.get("project_id"),
            range_key: row.get("range_key"),
            payload: row.get("payload"),
            last_fetched_at: row.get("last_fetched_at"),
        }))
    }

    /// Insert-or-overwrite the cache row for (project, range).
    pub async fn upsert_cache_entry(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO dashboard_cache (project_id, range_key, payload, last_fetched_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(project_id, range_key) DO UPDATE SET
                 payload = excluded.payload,
                 last_fetched_at = excluded.last_fetched_at",
        )
        .bind(entry.project_id)
        .bind(&entry.range_key)
        .bind(&entry.payload)
        .bind(entry.last_fetched_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Admin operation: drop every cached payload for a project.
    pub async fn clear_cache(&self, project_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM dashboard_cache WHERE project_id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        info!("Cleared {} cache rows for project {}", result.rows_affected(), project_id);
        Ok(result.rows_affected())
    }
}
