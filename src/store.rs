// src/store.rs
//! Last computed digest. Each save replaces the previous one.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::digest::SummaryGroup;

pub const DEFAULT_DIGEST_STORE_PATH: &str = "data/summaries.json";

#[async_trait]
pub trait DigestStore: Send + Sync {
    async fn save(&self, groups: &[SummaryGroup]) -> Result<()>;
    /// Empty when nothing was saved yet.
    async fn load(&self) -> Result<Vec<SummaryGroup>>;
}

#[derive(Debug, Default)]
pub struct MemoryDigestStore {
    inner: RwLock<Vec<SummaryGroup>>,
}

impl MemoryDigestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DigestStore for MemoryDigestStore {
    async fn save(&self, groups: &[SummaryGroup]) -> Result<()> {
        *self
            .inner
            .write()
            .map_err(|_| anyhow!("digest store lock poisoned"))? = groups.to_vec();
        Ok(())
    }

    async fn load(&self) -> Result<Vec<SummaryGroup>> {
        self.inner
            .read()
            .map(|g| g.clone())
            .map_err(|_| anyhow!("digest store lock poisoned"))
    }
}

/// JSON file on disk; survives restarts.
#[derive(Debug, Clone)]
pub struct FileDigestStore {
    path: PathBuf,
}

impl FileDigestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DigestStore for FileDigestStore {
    async fn save(&self, groups: &[SummaryGroup]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_vec_pretty(groups).context("serializing digest")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<SummaryGroup>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing digest at {}", self.path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{summarize_items_at, Item};
    use chrono::{TimeZone, Utc};

    fn sample() -> Vec<SummaryGroup> {
        let items = vec![Item {
            id: "1".into(),
            title: "Kernel security patch lands".into(),
            url: "https://example.com/1".into(),
            body: Some("A CVE was fixed.".into()),
            source: "test".into(),
            published_at: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        }];
        summarize_items_at(&items, Utc.timestamp_opt(1_700_000_100, 0).unwrap())
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryDigestStore::new();
        assert!(store.load().await.unwrap().is_empty());
        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), sample());
        store.save(&[]).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_reports_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryDigestStore::new());
        let s2 = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = s2.inner.write().unwrap();
            panic!("writer died");
        })
        .join();

        assert!(store.load().await.is_err());
        assert!(store.save(&sample()).await.is_err());
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("summaries.json");

        assert!(FileDigestStore::new(&path).load().await.unwrap().is_empty());
        FileDigestStore::new(&path).save(&sample()).await.unwrap();
        let loaded = FileDigestStore::new(&path).load().await.unwrap();
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summaries.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(FileDigestStore::new(&path).load().await.is_err());
    }
}
