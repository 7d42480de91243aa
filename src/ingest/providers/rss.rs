// src/ingest/providers/rss.rs
//! RSS 2.0 / Atom provider. Works against a live URL (reqwest) or an
//! in-memory document (fixtures, tests).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::digest::Item;
use crate::ingest::types::FeedProvider;
use crate::text::normalize_text;

const USER_AGENT: &str = concat!("tech-digest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Text>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    title: Option<Text>,
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<Text>,
    content: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Element text that may carry attributes (`<guid isPermaLink="false">`, `<title type="html">`).
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

pub struct RssFeedProvider {
    feed_url: String,
    mode: Mode,
}

enum Mode {
    // own copy so tests can pass any &str
    Fixture(String),
    Http {
        client: reqwest::Client,
        timeout: Duration,
    },
}

impl RssFeedProvider {
    pub fn from_url(url: impl Into<String>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            feed_url: url.into(),
            mode: Mode::Http { client, timeout },
        }
    }

    /// `feed_url` is only used for naming and as the source fallback.
    pub fn from_fixture(feed_url: impl Into<String>, xml: &str) -> Self {
        Self {
            feed_url: feed_url.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    async fn download(&self, client: &reqwest::Client, timeout: Duration) -> Result<String> {
        let resp = client
            .get(&self.feed_url)
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .with_context(|| format!("GET {}", self.feed_url))?
            .error_for_status()
            .with_context(|| format!("non-2xx from {}", self.feed_url))?;
        resp.text().await.context("reading feed body")
    }
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<Item>> {
        let xml = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { client, timeout } => self.download(client, *timeout).await?,
        };

        let t0 = std::time::Instant::now();
        let items = parse_feed(&xml, &self.feed_url)?;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_items_total").increment(items.len() as u64);
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.feed_url
    }
}

/// Parse an RSS 2.0 or Atom document into items.
pub fn parse_feed(xml: &str, feed_url: &str) -> Result<Vec<Item>> {
    let xml = scrub_html_entities_for_xml(xml);
    if is_atom(&xml) {
        parse_atom(&xml, feed_url)
    } else {
        parse_rss(&xml, feed_url)
    }
}

fn is_atom(xml: &str) -> bool {
    match (xml.find("<feed"), xml.find("<rss")) {
        (Some(f), Some(r)) => f < r,
        (Some(_), None) => true,
        _ => false,
    }
}

fn parse_rss(xml: &str, feed_url: &str) -> Result<Vec<Item>> {
    let rss: Rss = from_str(xml).context("parsing rss xml")?;
    let source = source_name(rss.channel.title.as_deref(), feed_url);

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = normalize_text(it.title.as_deref().unwrap_or_default());
        let url = it.link.unwrap_or_default().trim().to_string();
        if title.is_empty() && url.is_empty() {
            continue;
        }
        let id = it
            .guid
            .map(|g| g.value.trim().to_string())
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| item_id(&url, &title));

        out.push(Item {
            id,
            title,
            url,
            body: clean_body(it.description.as_deref()),
            source: source.clone(),
            published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
        });
    }
    Ok(out)
}

fn parse_atom(xml: &str, feed_url: &str) -> Result<Vec<Item>> {
    let feed: AtomFeed = from_str(xml).context("parsing atom xml")?;
    let source = source_name(feed.title.as_ref().map(|t| t.value.as_str()), feed_url);

    let mut out = Vec::with_capacity(feed.entry.len());
    for e in feed.entry {
        let title = normalize_text(e.title.as_ref().map(|t| t.value.as_str()).unwrap_or_default());
        // rel="alternate" (or no rel) is the article link
        let url = e
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
            .or_else(|| e.links.first())
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default();
        if title.is_empty() && url.is_empty() {
            continue;
        }
        let id = e
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| item_id(&url, &title));
        let body_raw = e.content.or(e.summary).map(|t| t.value);

        out.push(Item {
            id,
            title,
            url,
            body: clean_body(body_raw.as_deref()),
            source: source.clone(),
            published_at: e
                .published
                .as_deref()
                .or(e.updated.as_deref())
                .and_then(parse_rfc3339),
        });
    }
    Ok(out)
}

fn clean_body(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_text).filter(|b| !b.is_empty())
}

/// Channel title, else the feed host, else the raw feed URL.
fn source_name(title: Option<&str>, feed_url: &str) -> String {
    if let Some(t) = title.map(normalize_text).filter(|t| !t.is_empty()) {
        return t;
    }
    url::Url::parse(feed_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| feed_url.to_string())
}

/// Stable id for entries without a GUID: hex prefix of sha256(url + title).
pub fn item_id(url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn to_chrono(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .and_then(to_chrono)
        // obsolete zone names ("GMT", "EST") that `time` rejects
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .and_then(to_chrono)
}

/// HTML named entities are not valid XML; fold the common ones before parsing.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
        .replace("&copy;", "(c)")
}
