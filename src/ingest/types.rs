// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::digest::Item;

/// One feed that could not be fetched or parsed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub source: String, // feed URL or provider name
    pub error: String,
}

/// Everything a fetch round produced: items from the feeds that worked,
/// one failure entry per feed that did not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchReport {
    pub items: Vec<Item>,
    pub failures: Vec<FetchFailure>,
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Item>>;
    fn name(&self) -> &str;
}

/// Resolves a list of feed URLs into items. The app state holds one of these
/// so tests can swap the network for fixtures.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, urls: &[String]) -> FetchReport;
}
