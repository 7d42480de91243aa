// src/digest/dedup.rs
//! Semantic deduplication of feed items.
//!
//! Two items are duplicates when they share an id, a normalized URL or a
//! normalized title. The relation is transitive (A~B by url, B~C by title ⇒ one cluster).
//! Per cluster exactly one item survives:
//! - earliest `published_at` wins,
//! - dated beats undated,
//! - otherwise the first one in input order.
//!
//! Survivors keep their relative input order, so `dedup(dedup(x)) == dedup(x)`.

use std::collections::HashMap;
use url::Url;

use super::Item;
use crate::text::collapse_whitespace;

/// Query parameters that only carry campaign/referral tracking.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "yclid", "mc_cid", "mc_eid", "igshid", "ref", "ref_src",
    "_hsenc", "_hsmi",
];

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}

/// Canonical form of a URL for duplicate detection.
///
/// Scheme and host are lowercased (the `url` crate does that on parse),
/// default ports and fragments are dropped, tracking parameters removed and
/// a trailing slash stripped. Unparseable input falls back to a trimmed,
/// lowercased string without trailing slashes.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let Ok(mut u) = Url::parse(raw) else {
        return raw.trim_end_matches('/').to_lowercase();
    };

    u.set_fragment(None);

    let kept: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        u.set_query(None);
    } else {
        u.query_pairs_mut().clear().extend_pairs(kept);
    }

    let mut out = format!("{}://", u.scheme());
    if let Some(host) = u.host_str() {
        out.push_str(host);
    }
    if let Some(port) = u.port() {
        out.push_str(&format!(":{port}"));
    }
    out.push_str(u.path().trim_end_matches('/'));
    if let Some(q) = u.query() {
        out.push('?');
        out.push_str(q);
    }
    out
}

/// Case-insensitive title key with whitespace folded.
pub fn normalize_title(title: &str) -> String {
    collapse_whitespace(title).to_lowercase()
}

/// Tiny union-find over item indices.
struct Clusters {
    parent: Vec<usize>,
}

impl Clusters {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // lower index stays root
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// `true` if `cand` should replace `best` as the cluster survivor.
fn beats(cand: &Item, best: &Item) -> bool {
    match (cand.published_at, best.published_at) {
        (Some(c), Some(b)) => c < b,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Remove semantic duplicates. Never fails.
pub fn dedup(items: &[Item]) -> Vec<Item> {
    let n = items.len();
    let mut clusters = Clusters::new(n);
    let mut by_url: HashMap<String, usize> = HashMap::new();
    let mut by_title: HashMap<String, usize> = HashMap::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();

    for (i, it) in items.iter().enumerate() {
        let id_key = it.id.trim();
        if !id_key.is_empty() {
            match by_id.get(id_key) {
                Some(&j) => clusters.union(i, j),
                None => {
                    by_id.insert(id_key, i);
                }
            }
        }
        let url_key = normalize_url(&it.url);
        if !url_key.is_empty() {
            match by_url.get(&url_key) {
                Some(&j) => clusters.union(i, j),
                None => {
                    by_url.insert(url_key, i);
                }
            }
        }
        let title_key = normalize_title(&it.title);
        if !title_key.is_empty() {
            match by_title.get(&title_key) {
                Some(&j) => clusters.union(i, j),
                None => {
                    by_title.insert(title_key, i);
                }
            }
        }
    }

    // root -> index of current survivor; input order means the first seen wins ties
    let mut survivor: HashMap<usize, usize> = HashMap::new();
    for i in 0..n {
        let root = clusters.find(i);
        match survivor.get(&root) {
            Some(&best) if !beats(&items[i], &items[best]) => {}
            _ => {
                survivor.insert(root, i);
            }
        }
    }

    let mut keep: Vec<usize> = survivor.into_values().collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| items[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn it(id: &str, title: &str, url: &str, ts: Option<i64>) -> Item {
        Item {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            body: None,
            source: "t".into(),
            published_at: ts.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
        }
    }

    #[test]
    fn url_normalization_rules() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM/Post/1/?utm_source=x&id=7#top"),
            "https://example.com/Post/1?id=7"
        );
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
        assert_eq!(normalize_url("http://example.com:80/a"), "http://example.com/a");
        assert_eq!(
            normalize_url("https://example.com:8443/a/"),
            "https://example.com:8443/a"
        );
        assert_eq!(normalize_url("  not a url/ "), "not a url");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn title_key_folds_case_and_whitespace() {
        assert_eq!(normalize_title("  Big   News\tToday "), "big news today");
    }

    #[test]
    fn earlier_published_wins_even_if_later_in_input() {
        let items = vec![
            it("late", "A", "https://x.io/a", Some(200)),
            it("early", "B", "https://X.io/a/", Some(100)),
        ];
        let out = dedup(&items);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "early");
    }

    #[test]
    fn first_seen_wins_without_timestamps() {
        let items = vec![
            it("first", "Same title", "https://a.io/1", None),
            it("second", "same  TITLE", "https://b.io/2", None),
        ];
        let out = dedup(&items);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "first");
    }

    #[test]
    fn dated_beats_undated() {
        let items = vec![
            it("undated", "T", "https://a.io/1", None),
            it("dated", "t", "https://b.io/2", Some(5)),
        ];
        assert_eq!(dedup(&items)[0].id, "dated");
    }

    #[test]
    fn clusters_are_transitive() {
        let items = vec![
            it("a", "Alpha", "https://a.io/1", Some(30)),
            it("b", "Beta", "https://a.io/1/", Some(20)),
            it("c", "beta", "https://c.io/3", Some(10)),
            it("d", "Delta", "https://d.io/4", None),
        ];
        let out = dedup(&items);
        let ids: Vec<&str> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn empty_keys_never_merge() {
        let items = vec![it("a", "", "", None), it("b", "  ", "", None)];
        assert_eq!(dedup(&items).len(), 2);
    }

    #[test]
    fn shared_id_merges_unrelated_stories() {
        let items = vec![
            it("1", "New LLM benchmark", "https://blog-a.io/post", Some(50)),
            it("1", "Rust compiler speedups", "https://blog-b.io/post", Some(10)),
            it("2", "Something else", "https://blog-c.io/post", None),
        ];
        let out = dedup(&items);
        let kept: Vec<(&str, &str)> = out.iter().map(|i| (i.id.as_str(), i.title.as_str())).collect();
        assert_eq!(kept, vec![("1", "Rust compiler speedups"), ("2", "Something else")]);
    }

    #[test]
    fn idempotent() {
        let items = vec![
            it("a", "Alpha", "https://a.io/1?utm_medium=rss", Some(3)),
            it("b", "alpha", "https://b.io/2", Some(1)),
            it("c", "Gamma", "https://a.io/1", None),
            it("d", "Delta", "https://d.io", Some(9)),
        ];
        let once = dedup(&items);
        assert_eq!(dedup(&once), once);
    }
}
