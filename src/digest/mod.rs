// src/digest/mod.rs
//! # Digest Engine
//! Pure, testable logic that maps a flat `Item` list → ordered `SummaryGroup`s.
//! No I/O, no state between calls; safe to call from many tasks at once.
//!
//! Order:
//! 1) dedup (normalized url / normalized title, earliest publish wins)
//! 2) annotate each survivor: summary, sentiment, entities
//! 3) classify into exactly one topic
//! 4) bucket, sort items by recency, sort buckets by size then label
//! 5) stamp every bucket with one shared `created_at`

pub mod dedup;
pub mod entities;
pub mod sentiment;
pub mod summary;
pub mod topics;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::text::normalize_text;

pub use crate::digest::dedup::{dedup, normalize_title, normalize_url};
pub use crate::digest::entities::{extract_entities, MAX_ENTITIES};
pub use crate::digest::sentiment::SentimentScorer;
pub use crate::digest::summary::{summarize, NO_SUMMARY, SUMMARY_BUDGET};
pub use crate::digest::topics::{TopicDef, TopicTable, FALLBACK_TOPIC};

/// One fetched feed entry before annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Body with markup stripped and whitespace folded; `None` when blank.
    pub fn clean_body(&self) -> Option<String> {
        self.body
            .as_deref()
            .map(normalize_text)
            .filter(|b| !b.is_empty())
    }
}

/// An `Item` enriched with summary, sentiment and entities.
/// Serialized flat so consumers see the item fields next to the annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedItem {
    #[serde(flatten)]
    pub item: Item,
    pub summary: String,
    /// In `[-1.0, 1.0]`.
    pub sentiment: f32,
    pub entities: Vec<String>,
}

/// A topic bucket produced by one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryGroup {
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<AnnotatedItem>,
}

/// Engine configuration: the topic table plus the sentiment lexicon.
#[derive(Debug, Clone, Default)]
pub struct DigestEngine {
    topics: TopicTable,
    scorer: SentimentScorer,
}

static DEFAULT_ENGINE: Lazy<DigestEngine> = Lazy::new(DigestEngine::default);

impl DigestEngine {
    pub fn new(topics: TopicTable, scorer: SentimentScorer) -> Self {
        Self { topics, scorer }
    }

    pub fn with_topics(topics: TopicTable) -> Self {
        Self {
            topics,
            scorer: SentimentScorer::default(),
        }
    }

    pub fn topics(&self) -> &TopicTable {
        &self.topics
    }

    /// Enrich one item. Never fails; missing fields degrade to neutral values.
    pub fn annotate(&self, item: Item) -> AnnotatedItem {
        let body = item.clean_body();
        self.annotate_clean(item, body.as_deref())
    }

    fn annotate_clean(&self, item: Item, body: Option<&str>) -> AnnotatedItem {
        let text = match body {
            Some(b) => format!("{}\n{}", item.title, b),
            None => item.title.clone(),
        };
        let summary = summarize(&item.title, body);
        let sentiment = self.scorer.score(&text);
        let entities = extract_entities(&item.title, body);
        AnnotatedItem {
            item,
            summary,
            sentiment,
            entities,
        }
    }

    /// Topic label for one item.
    pub fn classify(&self, item: &Item) -> &str {
        let body = item.clean_body();
        self.topics.classify(&item.title, body.as_deref())
    }

    /// Full pipeline with an explicit invocation stamp.
    pub fn summarize_at(&self, items: &[Item], created_at: DateTime<Utc>) -> Vec<SummaryGroup> {
        if items.is_empty() {
            return Vec::new();
        }

        let unique = dedup(items);
        let removed = items.len() - unique.len();

        // label -> (input position, annotated item)
        let mut buckets: HashMap<&str, Vec<(usize, AnnotatedItem)>> = HashMap::new();
        for (pos, item) in unique.into_iter().enumerate() {
            let body = item.clean_body();
            let topic = self.topics.classify(&item.title, body.as_deref());
            let annotated = self.annotate_clean(item, body.as_deref());
            buckets.entry(topic).or_default().push((pos, annotated));
        }

        let mut groups: Vec<SummaryGroup> = buckets
            .into_iter()
            .map(|(topic, mut members)| {
                members.sort_by(|(pa, a), (pb, b)| {
                    recency_order(a.item.published_at, b.item.published_at).then(pa.cmp(pb))
                });
                SummaryGroup {
                    topic: topic.to_string(),
                    created_at,
                    items: members.into_iter().map(|(_, it)| it).collect(),
                }
            })
            .collect();

        groups.sort_by(|a, b| {
            b.items
                .len()
                .cmp(&a.items.len())
                .then_with(|| a.topic.cmp(&b.topic))
        });

        tracing::debug!(
            target: "digest",
            input = items.len(),
            duplicates = removed,
            groups = groups.len(),
            "digest computed"
        );

        groups
    }

    pub fn summarize(&self, items: &[Item]) -> Vec<SummaryGroup> {
        self.summarize_at(items, Utc::now())
    }
}

/// Newest first; undated items last.
fn recency_order(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Entry point with the built-in tables, stamped with the current time.
pub fn summarize_items(items: &[Item]) -> Vec<SummaryGroup> {
    DEFAULT_ENGINE.summarize(items)
}

/// Same as [`summarize_items`] but with a caller-supplied `created_at`,
/// which makes the output fully reproducible.
pub fn summarize_items_at(items: &[Item], created_at: DateTime<Utc>) -> Vec<SummaryGroup> {
    DEFAULT_ENGINE.summarize_at(items, created_at)
}
