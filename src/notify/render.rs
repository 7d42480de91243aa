// src/notify/render.rs
//! Digest renderings for the delivery channels: plain text, HTML mail body
//! and Telegram Markdown.

use std::fmt::Write;

use crate::digest::{AnnotatedItem, SummaryGroup};

pub const DIGEST_TITLE: &str = "Tech Intelligence Digest";
/// Entities shown per item; the rest are only in the JSON digest.
pub const ENTITIES_SHOWN: usize = 6;
const SENTIMENT_THRESHOLD: f32 = 0.2;

pub fn sentiment_label(score: f32) -> &'static str {
    if score >= SENTIMENT_THRESHOLD {
        "positive"
    } else if score <= -SENTIMENT_THRESHOLD {
        "negative"
    } else {
        "neutral"
    }
}

/// "Tech Intelligence Digest — 3 topics"
pub fn subject(groups: &[SummaryGroup]) -> String {
    let n = groups.len();
    let noun = if n == 1 { "topic" } else { "topics" };
    format!("{DIGEST_TITLE} \u{2014} {n} {noun}")
}

fn shown_entities(it: &AnnotatedItem) -> Option<String> {
    if it.entities.is_empty() {
        return None;
    }
    Some(
        it.entities
            .iter()
            .take(ENTITIES_SHOWN)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    )
}

pub fn render_text(groups: &[SummaryGroup]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{DIGEST_TITLE}");
    if groups.is_empty() {
        out.push_str("\nNo new items.\n");
        return out;
    }
    for g in groups {
        let _ = writeln!(out, "\n== {} ({}) ==", g.topic, g.items.len());
        for it in &g.items {
            let _ = writeln!(
                out,
                "\n* {} [{}]",
                it.item.title,
                sentiment_label(it.sentiment)
            );
            let _ = writeln!(out, "  {}", it.summary);
            if let Some(e) = shown_entities(it) {
                let _ = writeln!(out, "  Entities: {e}");
            }
            if !it.item.url.is_empty() {
                let _ = writeln!(out, "  {}", it.item.url);
            }
        }
    }
    out
}

pub fn render_html(groups: &[SummaryGroup]) -> String {
    use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

    let mut out = String::new();
    let _ = write!(out, "<h1>{DIGEST_TITLE}</h1>");
    if groups.is_empty() {
        out.push_str("<p>No new items.</p>");
        return out;
    }
    for g in groups {
        let _ = write!(out, "<h2>{} ({})</h2><ul>", text(&g.topic), g.items.len());
        for it in &g.items {
            out.push_str("<li>");
            if it.item.url.is_empty() {
                let _ = write!(out, "<strong>{}</strong>", text(&it.item.title));
            } else {
                let _ = write!(
                    out,
                    "<a href=\"{}\"><strong>{}</strong></a>",
                    attr(&it.item.url),
                    text(&it.item.title)
                );
            }
            let _ = write!(
                out,
                " <em>{}</em><p>{}</p>",
                sentiment_label(it.sentiment),
                text(&it.summary)
            );
            if let Some(e) = shown_entities(it) {
                let _ = write!(out, "<small>Entities: {}</small>", text(&e));
            }
            out.push_str("</li>");
        }
        out.push_str("</ul>");
    }
    out
}

/// Telegram legacy Markdown, where underscores, asterisks, brackets and backticks are markup.
pub fn render_markdown(groups: &[SummaryGroup]) -> String {
    let mut out = format!("*{DIGEST_TITLE}*\n");
    if groups.is_empty() {
        out.push_str("\nNo new items.\n");
        return out;
    }
    for g in groups {
        let _ = writeln!(out, "\n*{}* ({})", escape_md(&g.topic), g.items.len());
        for it in &g.items {
            if it.item.url.is_empty() {
                let _ = writeln!(out, "\u{2022} {}", escape_md(&it.item.title));
            } else {
                // brackets would break the link span
                let _ = writeln!(
                    out,
                    "\u{2022} [{}]({})",
                    it.item.title.replace(['[', ']'], ""),
                    it.item.url.replace(')', "%29")
                );
            }
            let _ = writeln!(
                out,
                "_{}_ \u{2014} {}",
                sentiment_label(it.sentiment),
                escape_md(&it.summary)
            );
            if let Some(e) = shown_entities(it) {
                let _ = writeln!(out, "Entities: {}", escape_md(&e));
            }
        }
    }
    out
}

fn escape_md(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '*' | '[' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Item;
    use chrono::{TimeZone, Utc};

    fn group(topic: &str, title: &str, sentiment: f32, entities: usize) -> SummaryGroup {
        SummaryGroup {
            topic: topic.into(),
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            items: vec![AnnotatedItem {
                item: Item {
                    id: "1".into(),
                    title: title.into(),
                    url: "https://example.com/a?x=1&y=2".into(),
                    body: None,
                    source: "s".into(),
                    published_at: None,
                },
                summary: "Short summary.".into(),
                sentiment,
                entities: (0..entities).map(|i| format!("E{i}")).collect(),
            }],
        }
    }

    #[test]
    fn labels_use_symmetric_threshold() {
        assert_eq!(sentiment_label(0.2), "positive");
        assert_eq!(sentiment_label(0.19), "neutral");
        assert_eq!(sentiment_label(-0.2), "negative");
        assert_eq!(sentiment_label(0.0), "neutral");
    }

    #[test]
    fn subject_counts_topics() {
        let gs = vec![group("A", "t", 0.0, 0), group("B", "t", 0.0, 0)];
        assert_eq!(subject(&gs), "Tech Intelligence Digest \u{2014} 2 topics");
        assert_eq!(subject(&gs[..1]), "Tech Intelligence Digest \u{2014} 1 topic");
    }

    #[test]
    fn text_caps_entities() {
        let out = render_text(&[group("Security", "Patch Tuesday", -0.5, 9)]);
        assert!(out.contains("== Security (1) =="));
        assert!(out.contains("[negative]"));
        assert!(out.contains("Entities: E0, E1, E2, E3, E4, E5\n"));
        assert!(!out.contains("E6"));
    }

    #[test]
    fn html_is_escaped() {
        let out = render_html(&[group("UI/UX", "<script>x</script> & more", 0.5, 1)]);
        assert!(out.contains("&lt;script&gt;x&lt;/script&gt; &amp; more"));
        assert!(out.contains("href=\"https://example.com/a?x=1&amp;y=2\""));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn markdown_escapes_markers() {
        let out = render_markdown(&[group("Dev_Tools", "t", 0.0, 0)]);
        assert!(out.contains("*Dev\\_Tools* (1)"));
        assert!(out.contains("[t](https://example.com/a?x=1&y=2)"));
    }

    #[test]
    fn empty_digest_says_so() {
        assert!(render_text(&[]).contains("No new items."));
        assert!(render_html(&[]).contains("No new items."));
    }
}
