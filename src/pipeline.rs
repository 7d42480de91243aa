// src/pipeline.rs
//! Glue between the feeds, the digest engine, the digest store and the
//! delivery channels. Shared by the HTTP routes, the scheduler and the
//! one-shot binary.

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::digest::{DigestEngine, SummaryGroup, TopicTable};
use crate::ingest::types::{FeedFetcher, FetchFailure, FetchReport};
use crate::ingest::HttpFeedFetcher;
use crate::notify::{DeliveryOutcome, Dispatcher};
use crate::prefs::{Prefs, PrefsStore};
use crate::store::{DigestStore, FileDigestStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub prefs: Arc<PrefsStore>,
    pub digests: Arc<dyn DigestStore>,
    pub fetcher: Arc<dyn FeedFetcher>,
    pub engine: Arc<DigestEngine>,
    // fixed channels instead of the ones named in prefs
    dispatcher: Option<Arc<Dispatcher>>,
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        prefs: PrefsStore,
        digests: Arc<dyn DigestStore>,
        fetcher: Arc<dyn FeedFetcher>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            prefs: Arc::new(prefs),
            digests,
            fetcher,
            engine: Arc::new(DigestEngine::default()),
            dispatcher: None,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Production wiring: prefs and digest files from `config`, live HTTP
    /// feeds, optional custom topic table.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let engine = match &config.topics_path {
            Some(p) => DigestEngine::with_topics(TopicTable::load_from(p)?),
            None => DigestEngine::default(),
        };
        let prefs = PrefsStore::new(config.prefs_path.clone());
        let digests = Arc::new(FileDigestStore::new(config.digest_store_path.clone()));
        let fetcher = Arc::new(HttpFeedFetcher::new(config.fetch_timeout));
        Ok(Self::new(config, prefs, digests, fetcher).with_engine(engine))
    }

    pub fn with_engine(mut self, engine: DigestEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    fn dispatcher_for(&self, prefs: &Prefs) -> Arc<Dispatcher> {
        match &self.dispatcher {
            Some(d) => d.clone(),
            None => Arc::new(Dispatcher::from_prefs(prefs, &self.config)),
        }
    }
}

/// Result of one full digest run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub items: usize,
    pub groups: usize,
    pub deliveries: Vec<DeliveryOutcome>,
    pub failures: Vec<FetchFailure>,
    #[serde(skip)]
    pub digest: Vec<SummaryGroup>,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_runs_total", "Completed digest runs.");
        describe_gauge!("digest_groups", "Topic groups in the last digest.");
        describe_gauge!("digest_items", "Items fetched for the last digest.");
        describe_gauge!("digest_last_run_ts", "Unix ts of the last digest run.");
        describe_counter!("deliveries_total", "Successful digest deliveries by channel.");
        describe_counter!("delivery_failures_total", "Failed digest deliveries by channel.");
    });
}

/// Fetch every effective source once.
pub async fn collect(state: &AppState) -> Result<FetchReport> {
    let prefs = state.prefs.read()?;
    let sources = prefs.effective_sources();
    tracing::debug!(target: "pipeline", sources = sources.len(), "collecting");
    Ok(state.fetcher.fetch(&sources).await)
}

/// fetch -> summarize -> store -> deliver. Runs are serialized so two
/// triggers cannot interleave their saves.
pub async fn run_digest(state: &AppState) -> Result<RunReport> {
    ensure_metrics_described();
    let _guard = state.run_lock.lock().await;

    let prefs = state.prefs.read()?;
    let report = state.fetcher.fetch(&prefs.effective_sources()).await;
    let groups = state.engine.summarize(&report.items);

    state
        .digests
        .save(&groups)
        .await
        .context("saving digest")?;

    let deliveries = state.dispatcher_for(&prefs).dispatch(&groups).await;

    counter!("digest_runs_total").increment(1);
    gauge!("digest_groups").set(groups.len() as f64);
    gauge!("digest_items").set(report.items.len() as f64);
    gauge!("digest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

    tracing::info!(
        target: "pipeline",
        items = report.items.len(),
        groups = groups.len(),
        feed_failures = report.failures.len(),
        deliveries = deliveries.len(),
        "digest run finished"
    );

    Ok(RunReport {
        items: report.items.len(),
        groups: groups.len(),
        deliveries,
        failures: report.failures,
        digest: groups,
    })
}

/// Deliver the stored digest again without fetching.
pub async fn send_latest(state: &AppState) -> Result<Vec<DeliveryOutcome>> {
    ensure_metrics_described();
    let prefs = state.prefs.read()?;
    let groups = state.digests.load().await.context("loading digest")?;
    Ok(state.dispatcher_for(&prefs).dispatch(&groups).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Item;
    use crate::notify::Notifier;
    use crate::store::MemoryDigestStore;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Echoes the requested URLs back as one item each.
    struct EchoFetcher;

    #[async_trait]
    impl FeedFetcher for EchoFetcher {
        async fn fetch(&self, urls: &[String]) -> FetchReport {
            FetchReport {
                items: urls
                    .iter()
                    .enumerate()
                    .map(|(i, u)| Item {
                        id: i.to_string(),
                        title: format!("Security advisory {i}"),
                        url: u.clone(),
                        body: None,
                        source: "echo".into(),
                        published_at: None,
                    })
                    .collect(),
                failures: vec![],
            }
        }
    }

    #[derive(Default)]
    struct Recorder(StdMutex<Vec<usize>>);

    #[async_trait]
    impl Notifier for Arc<Recorder> {
        fn channel(&self) -> &str {
            "recorder"
        }
        async fn send(&self, groups: &[SummaryGroup]) -> Result<()> {
            self.0.lock().unwrap().push(groups.len());
            Ok(())
        }
    }

    fn state(dir: &tempfile::TempDir) -> AppState {
        AppState::new(
            AppConfig::default(),
            PrefsStore::new(dir.path().join("prefs.json")),
            Arc::new(MemoryDigestStore::new()),
            Arc::new(EchoFetcher),
        )
    }

    #[tokio::test]
    async fn collect_uses_default_sources_without_prefs() {
        let dir = tempfile::tempdir().unwrap();
        let report = collect(&state(&dir)).await.unwrap();
        assert_eq!(report.items.len(), crate::ingest::DEFAULT_SOURCES.len());
    }

    #[tokio::test]
    async fn run_digest_stores_and_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let rec = Arc::new(Recorder::default());
        let st = state(&dir).with_dispatcher(Dispatcher::new(vec![Box::new(rec.clone())]));
        st.prefs
            .write(Prefs {
                sources: vec!["https://a.test/rss".into(), "https://b.test/rss".into()],
                ..Prefs::default()
            })
            .unwrap();

        let run = run_digest(&st).await.unwrap();
        assert_eq!(run.items, 2);
        assert_eq!(run.groups, 1);
        assert_eq!(run.deliveries.len(), 1);
        assert!(run.deliveries[0].ok);
        assert_eq!(st.digests.load().await.unwrap(), run.digest);
        assert_eq!(*rec.0.lock().unwrap(), vec![1]);

        let again = send_latest(&st).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(*rec.0.lock().unwrap(), vec![1, 1]);
    }
}
