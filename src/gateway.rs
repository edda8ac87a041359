//! Fetch-or-cache gateway in front of the two external reporting sources.
//! Request handlers only ever talk to [`DashboardGateway::get_or_fetch`].

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::api::{ApiError, SearchPerformanceProvider, TrafficStatsProvider};
use crate::comparison::{build_search_summary, build_traffic_summary};
use crate::database::Database;
use crate::date_range::{compute_windows, RangeKey};
use crate::matcher::match_external_rows;
use crate::models::{
    CacheEntry, ComparisonWindows, DashboardPayload, FetchOutcome, PageMetrics, PayloadWindows,
    Project, SearchMetricRow, SearchSummary, SearchTotals, TrafficStats,
};

/// Key used in `api_errors` for the URL-keyed search-performance source.
pub const SEARCH_SOURCE: &str = "search";
/// Key used in `api_errors` for the property-keyed traffic source.
pub const TRAFFIC_SOURCE: &str = "traffic";

struct SearchFetch {
    totals_current: SearchTotals,
    totals_previous: SearchTotals,
    rows_current: Vec<SearchMetricRow>,
}

/// Orchestrates cache lookup, concurrent source fetches, URL matching and
/// the merged upsert. Clients and database are injected once at construction
/// so the gateway can run against fakes in tests.
pub struct DashboardGateway {
    db: Database,
    search: Arc<dyn SearchPerformanceProvider>,
    traffic: Arc<dyn TrafficStatsProvider>,
    staleness: Duration,
    // Per-key single-flight locks. Concurrent misses for one (project, range)
    // share the leader's round trip instead of racing upstream. Entries are
    // kept for the process lifetime; the key space is projects x five ranges.
    inflight: Mutex<HashMap<(i64, RangeKey), Arc<tokio::sync::Mutex<()>>>>,
}

impl DashboardGateway {
    pub fn new(
        db: Database,
        search: Arc<dyn SearchPerformanceProvider>,
        traffic: Arc<dyn TrafficStatsProvider>,
        staleness_hours: i64,
    ) -> Self {
        Self {
            db,
            search,
            traffic,
            staleness: Duration::hours(staleness_hours),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Return the cached payload for (project, range) when it is fresh
    /// enough, otherwise fetch from both sources, merge, persist and return.
    ///
    /// `force_refresh` bypasses the staleness check entirely. Upstream
    /// failures degrade to `api_errors` entries in the payload; database
    /// failures are fatal for the request.
    pub async fn get_or_fetch(
        &self,
        project_id: i64,
        range: RangeKey,
        force_refresh: bool,
    ) -> Result<FetchOutcome> {
        if !force_refresh {
            if let Some(outcome) = self.fresh_cached(project_id, range).await? {
                return Ok(outcome);
            }
        }

        let key_lock = {
            let mut inflight = self.inflight.lock().unwrap();
            inflight
                .entry((project_id, range))
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let _guard = key_lock.lock().await;

        // A concurrent miss may have refreshed this key while we waited for
        // the lock; followers are served from the leader's write.
        if !force_refresh {
            if let Some(outcome) = self.fresh_cached(project_id, range).await? {
                return Ok(outcome);
            }
        }

        self.refresh(project_id, range).await
    }

    async fn fresh_cached(&self, project_id: i64, range: RangeKey) -> Result<Option<FetchOutcome>> {
        let Some(entry) = self.db.get_cache_entry(project_id, range.as_str()).await? else {
            return Ok(None);
        };

        if Utc::now() - entry.last_fetched_at >= self.staleness {
            return Ok(None);
        }

        match serde_json::from_str::<DashboardPayload>(&entry.payload) {
            Ok(payload) => Ok(Some(FetchOutcome { payload, from_cache: true })),
            Err(e) => {
                // Treat an undecodable row as a miss; the refresh overwrites it.
                warn!(project_id, range = %range, "discarding corrupt cache payload: {}", e);
                Ok(None)
            }
        }
    }

    async fn refresh(&self, project_id: i64, range: RangeKey) -> Result<FetchOutcome> {
        let project = self
            .db
            .get_project(project_id)
            .await?
            .ok_or_else(|| anyhow!("project {} not found", project_id))?;

        let today = Utc::now().date_naive();
        let search_windows = compute_windows(range, self.search.latency_days(), today);
        let traffic_windows = compute_windows(range, self.traffic.latency_days(), today);

        info!(project_id, range = %range, "refreshing dashboard data");

        // Both sources run concurrently and settle independently; one source
        // failing must not cancel or fail the other.
        let (search_result, traffic_result) = tokio::join!(
            self.fetch_search(&project, search_windows),
            self.fetch_traffic(&project, traffic_windows),
        );

        let mut api_errors: BTreeMap<String, String> = BTreeMap::new();

        let search_summary = match search_result {
            Ok(fetch) => Some(self.assemble_search(&project, range, fetch).await?),
            Err(e) => {
                warn!(project_id, "search source failed: {}", e);
                api_errors.insert(SEARCH_SOURCE.to_string(), e.to_string());
                None
            }
        };

        let traffic_summary = match traffic_result {
            Ok((current, previous)) => Some(build_traffic_summary(&current, &previous)),
            Err(e) => {
                warn!(project_id, "traffic source failed: {}", e);
                api_errors.insert(TRAFFIC_SOURCE.to_string(), e.to_string());
                None
            }
        };

        let payload = DashboardPayload {
            range_key: range.as_str().to_string(),
            windows: PayloadWindows {
                search: search_windows,
                traffic: traffic_windows,
            },
            search: search_summary,
            traffic: traffic_summary,
            api_errors,
            generated_at: Utc::now(),
        };

        let entry = CacheEntry {
            project_id,
            range_key: range.as_str().to_string(),
            payload: serde_json::to_string(&payload).context("serializing payload")?,
            last_fetched_at: Utc::now(),
        };
        self.db.upsert_cache_entry(&entry).await?;

        Ok(FetchOutcome {
            payload,
            from_cache: false,
        })
    }

    async fn fetch_search(
        &self,
        project: &Project,
        windows: ComparisonWindows,
    ) -> Result<SearchFetch, ApiError> {
        let totals_current = self
            .search
            .fetch_totals(&project.site_url, windows.current)
            .await?;
        let totals_previous = self
            .search
            .fetch_totals(&project.site_url, windows.previous)
            .await?;
        let rows_current = self
            .search
            .fetch_page_metrics(&project.site_url, windows.current)
            .await?;

        Ok(SearchFetch {
            totals_current,
            totals_previous,
            rows_current,
        })
    }

    async fn fetch_traffic(
        &self,
        project: &Project,
        windows: ComparisonWindows,
    ) -> Result<(TrafficStats, TrafficStats), ApiError> {
        let current = self
            .traffic
            .fetch_site_stats(&project.analytics_property_id, windows.current)
            .await?;
        let previous = self
            .traffic
            .fetch_site_stats(&project.analytics_property_id, windows.previous)
            .await?;

        Ok((current, previous))
    }

    /// Match provider rows against the project's landing pages, write the
    /// matched metrics back and build the search half of the payload.
    async fn assemble_search(
        &self,
        project: &Project,
        range: RangeKey,
        fetch: SearchFetch,
    ) -> Result<SearchSummary> {
        let project_id = project.id.ok_or_else(|| anyhow!("project without id"))?;
        let landing_pages = self.db.list_landing_pages(project_id).await?;
        let targets: Vec<String> = landing_pages.iter().map(|p| p.url.clone()).collect();

        let matched = match_external_rows(&targets, &fetch.rows_current);

        let now = Utc::now();
        let mut pages = Vec::with_capacity(targets.len());
        for target in &targets {
            match matched.get(target).and_then(|m| m.as_ref()) {
                Some(row) => {
                    self.db
                        .update_landing_page_metrics(project_id, target, row, range.as_str(), now)
                        .await?;
                    pages.push(PageMetrics {
                        url: target.clone(),
                        clicks: row.clicks,
                        impressions: row.impressions,
                        position: row.position,
                    });
                }
                None => pages.push(PageMetrics {
                    url: target.clone(),
                    clicks: 0,
                    impressions: 0,
                    position: 0.0,
                }),
            }
        }

        Ok(build_search_summary(
            &fetch.totals_current,
            &fetch.totals_previous,
            pages,
        ))
    }
}
