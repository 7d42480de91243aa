// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::ingest::providers::rss::RssFeedProvider;
use crate::ingest::types::{FeedFetcher, FeedProvider, FetchFailure, FetchReport};
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use std::time::{Duration, Instant};

/// Feeds used when the stored preferences list none.
pub const DEFAULT_SOURCES: &[&str] = &[
    "https://www.reddit.com/r/MachineLearning/.rss",
    "https://www.reddit.com/r/artificial/.rss",
    "https://hnrss.org/frontpage",
    "https://ai.googleblog.com/feeds/posts/default?alt=rss",
    "https://openai.com/blog/rss.xml",
];

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items parsed from feeds.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Feed fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_histogram!("ingest_fetch_ms", "Wall time of one fetch round in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when feeds were last fetched.");
    });
}

/// Run every provider concurrently. Items keep provider order; a failing
/// provider contributes one `FetchFailure` and never aborts the round.
pub async fn fetch_all(providers: &[Box<dyn FeedProvider>]) -> FetchReport {
    ensure_metrics_described();
    let t0 = Instant::now();

    let results = join_all(providers.iter().map(|p| p.fetch_latest())).await;

    let mut report = FetchReport::default();
    for (p, res) in providers.iter().zip(results) {
        match res {
            Ok(mut v) => report.items.append(&mut v),
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
                report.failures.push(FetchFailure {
                    source: p.name().to_string(),
                    error: format!("{e:#}"),
                });
            }
        }
    }

    histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
    tracing::info!(
        target: "ingest",
        providers = providers.len(),
        items = report.items.len(),
        failures = report.failures.len(),
        "fetch round done"
    );
    report
}

/// Live fetcher: one `RssFeedProvider` per URL over a shared reqwest client.
#[derive(Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, urls: &[String]) -> FetchReport {
        let providers: Vec<Box<dyn FeedProvider>> = urls
            .iter()
            .map(|u| {
                Box::new(RssFeedProvider::from_url(
                    u.clone(),
                    self.client.clone(),
                    self.timeout,
                )) as Box<dyn FeedProvider>
            })
            .collect();
        fetch_all(&providers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Item;
    use anyhow::{anyhow, Result};

    struct Fixed(&'static str, usize);
    struct Broken;

    #[async_trait::async_trait]
    impl FeedProvider for Fixed {
        async fn fetch_latest(&self) -> Result<Vec<Item>> {
            Ok((0..self.1)
                .map(|i| Item {
                    id: format!("{}-{i}", self.0),
                    title: format!("{} story {i}", self.0),
                    url: format!("https://{}.test/{i}", self.0),
                    body: None,
                    source: self.0.into(),
                    published_at: None,
                })
                .collect())
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    #[async_trait::async_trait]
    impl FeedProvider for Broken {
        async fn fetch_latest(&self) -> Result<Vec<Item>> {
            Err(anyhow!("connection refused"))
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_and_reported() {
        let providers: Vec<Box<dyn FeedProvider>> =
            vec![Box::new(Fixed("a", 2)), Box::new(Broken), Box::new(Fixed("b", 1))];
        let report = fetch_all(&providers).await;

        let ids: Vec<&str> = report.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a-0", "a-1", "b-0"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source, "broken");
        assert!(report.failures[0].error.contains("connection refused"));
    }

    #[tokio::test]
    async fn no_providers_is_an_empty_report() {
        let report = fetch_all(&[]).await;
        assert!(report.items.is_empty());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn default_sources_are_absolute_urls() {
        assert_eq!(DEFAULT_SOURCES.len(), 5);
        for s in DEFAULT_SOURCES {
            assert!(url::Url::parse(s).is_ok(), "{s}");
        }
    }
}
