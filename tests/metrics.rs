// tests/metrics.rs
//
// One recorder per process, so this file holds a single test.
use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use tech_digest::config::AppConfig;
use tech_digest::ingest::types::{FeedFetcher, FetchReport};
use tech_digest::metrics::Metrics;
use tech_digest::prefs::PrefsStore;
use tech_digest::store::MemoryDigestStore;
use tech_digest::{create_router, AppState, Item};

struct OneItem;

#[async_trait]
impl FeedFetcher for OneItem {
    async fn fetch(&self, _urls: &[String]) -> FetchReport {
        FetchReport {
            items: vec![Item {
                id: "1".into(),
                title: "GPU shortage eases".into(),
                url: "https://example.com/gpu".into(),
                body: None,
                source: "test".into(),
                published_at: None,
            }],
            failures: vec![],
        }
    }
}

#[tokio::test]
async fn metrics_endpoint_exposes_digest_series() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(
        AppConfig::default(),
        PrefsStore::new(dir.path().join("prefs.json")),
        Arc::new(MemoryDigestStore::new()),
        Arc::new(OneItem),
    );
    let metrics = Metrics::init().expect("recorder installs once per process");
    let app = create_router(state).merge(metrics.router());

    let run = app
        .clone()
        .oneshot(Request::post("/api/cron").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(run.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "digest_runs_total",
        "digest_groups",
        "digest_items",
        "digest_last_run_ts",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
