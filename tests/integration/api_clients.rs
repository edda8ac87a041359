//! HTTP client tests against a local mock server.

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitepulse::api::{
    ApiError, SearchPerformanceClient, SearchPerformanceProvider, TrafficStatsClient,
    TrafficStatsProvider,
};
use sitepulse::models::DateWindow;

fn window() -> DateWindow {
    DateWindow::new(
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 7, 30).unwrap(),
    )
}

#[tokio::test]
async fn test_search_client_parses_page_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search/pages"))
        .and(query_param("site", "https://shop.example"))
        .and(query_param("start", "2025-07-01"))
        .and(query_param("end", "2025-07-30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                {"page": "https://shop.example/a", "clicks": 12, "impressions": 300, "position": 4.7},
                {"clicks": 99},
                {"page": "https://shop.example/b"}
            ]
        })))
        .mount(&server)
        .await;

    let client = SearchPerformanceClient::new(&server.uri(), "token", 60_000).unwrap();
    let rows = client
        .fetch_page_metrics("https://shop.example", window())
        .await
        .unwrap();

    // Rows without a page URL are dropped; missing metrics default to zero.
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].page, "https://shop.example/a");
    assert_eq!(rows[0].clicks, 12);
    assert_eq!(rows[0].position, 4.7);
    assert_eq!(rows[1].clicks, 0);
}

#[tokio::test]
async fn test_search_client_parses_totals() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search/totals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clicks": 150, "impressions": 3000, "position": 4.0
        })))
        .mount(&server)
        .await;

    let client = SearchPerformanceClient::new(&server.uri(), "token", 60_000).unwrap();
    let totals = client.fetch_totals("https://shop.example", window()).await.unwrap();

    assert_eq!(totals.clicks, 150);
    assert_eq!(totals.impressions, 3000);
}

#[tokio::test]
async fn test_search_client_surfaces_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search/pages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = SearchPerformanceClient::new(&server.uri(), "token", 60_000).unwrap();
    let err = client
        .fetch_page_metrics("https://shop.example", window())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_search_client_rejects_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let client = SearchPerformanceClient::new(&server.uri(), "token", 60_000).unwrap();
    let err = client
        .fetch_page_metrics("https://shop.example", window())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_traffic_client_parses_stats() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/properties/prop-1/stats"))
        .and(query_param("start", "2025-07-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "visits": 220, "pageviews": 660, "avg_visit_seconds": 65.5, "bounce_rate": 40.2
        })))
        .mount(&server)
        .await;

    let client = TrafficStatsClient::new(&server.uri(), "token", 60_000).unwrap();
    let stats = client.fetch_site_stats("prop-1", window()).await.unwrap();

    assert_eq!(stats.visits, 220);
    assert_eq!(stats.avg_visit_seconds, 65.5);
}

#[tokio::test]
async fn test_traffic_client_surfaces_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/properties/prop-1/stats"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = TrafficStatsClient::new(&server.uri(), "token", 60_000).unwrap();
    let err = client.fetch_site_stats("prop-1", window()).await.unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 403, .. }));
}
