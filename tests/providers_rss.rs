// tests/providers_rss.rs
//
// Fixture-backed feed parsing and the concurrent fetch round.

use chrono::{TimeZone, Utc};
use tech_digest::digest::summarize_items_at;
use tech_digest::ingest::fetch_all;
use tech_digest::ingest::providers::rss::{parse_feed, RssFeedProvider};
use tech_digest::ingest::types::FeedProvider;

const HN: &str = include_str!("fixtures/hn_frontpage.xml");
const ATOM: &str = include_str!("fixtures/openai_atom.xml");

#[test]
fn rss_fixture_parses_all_items() {
    let items = parse_feed(HN, "https://hnrss.org/frontpage").expect("parse rss fixture");
    assert_eq!(items.len(), 4);

    let first = &items[0];
    assert_eq!(first.id, "hn-1001");
    assert_eq!(first.source, "Hacker News: Front Page");
    assert_eq!(
        first.body.as_deref(),
        Some("The model improves inference speed. Weights are not public.")
    );
    assert_eq!(
        first.published_at,
        Some(Utc.with_ymd_and_hms(2025, 10, 7, 11, 0, 0).unwrap())
    );

    assert_eq!(
        items[1].body.as_deref(),
        Some("Attackers can exploit the flaw & run code remotely.")
    );

    // no guid: derived id, no body
    assert_eq!(items[2].id.len(), 16);
    assert!(items[2].body.is_none());
}

#[test]
fn atom_fixture_prefers_alternate_link_and_published() {
    let items = parse_feed(ATOM, "https://research.example.org/feed").expect("parse atom fixture");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].source, "Research Blog");
    assert_eq!(items[0].url, "https://research.example.org/gpu-clusters");
    assert_eq!(
        items[0].published_at,
        Some(Utc.with_ymd_and_hms(2025, 10, 7, 8, 0, 0).unwrap())
    );
    assert_eq!(
        items[0].body.as_deref(),
        Some("New datacenter chips from Nvidia cut costs.")
    );
    // only <updated> present
    assert_eq!(
        items[1].published_at,
        Some(Utc.with_ymd_and_hms(2025, 10, 6, 15, 30, 0).unwrap())
    );
}

#[tokio::test]
async fn fetch_round_merges_feeds_and_reports_broken_ones() {
    let providers: Vec<Box<dyn FeedProvider>> = vec![
        Box::new(RssFeedProvider::from_fixture("https://hnrss.org/frontpage", HN)),
        Box::new(RssFeedProvider::from_fixture("https://broken.example/feed", "<html>nope")),
        Box::new(RssFeedProvider::from_fixture("https://research.example.org/feed", ATOM)),
    ];
    let report = fetch_all(&providers).await;

    assert_eq!(report.items.len(), 6);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, "https://broken.example/feed");
}

#[tokio::test]
async fn fixture_feeds_digest_end_to_end() {
    let providers: Vec<Box<dyn FeedProvider>> = vec![
        Box::new(RssFeedProvider::from_fixture("https://hnrss.org/frontpage", HN)),
        Box::new(RssFeedProvider::from_fixture("https://research.example.org/feed", ATOM)),
    ];
    let report = fetch_all(&providers).await;
    let groups = summarize_items_at(&report.items, Utc.timestamp_opt(0, 0).unwrap());

    // the repeated transformer story collapses onto the earlier copy
    let total: usize = groups.iter().map(|g| g.items.len()).sum();
    assert_eq!(total, 5);

    let topic_of = |id: &str| {
        groups
            .iter()
            .find(|g| g.items.iter().any(|a| a.item.id == id))
            .map(|g| g.topic.clone())
    };
    assert_eq!(topic_of("hn-1001").as_deref(), Some("Machine Learning"));
    assert_eq!(topic_of("hn-1002").as_deref(), Some("Security"));
    assert_eq!(topic_of("urn:uuid:entry-1").as_deref(), Some("Hardware"));
    assert_eq!(topic_of("urn:uuid:entry-2").as_deref(), Some("Business"));
    assert!(topic_of("hn-1004").is_none());
}
