// src/digest/summary.rs
//! Extractive synopsis: leading whole sentences of the body up to
//! [`SUMMARY_BUDGET`] characters, `…` appended when anything was dropped.
//! Falls back to the title, then to [`NO_SUMMARY`]. Always non-empty.

use crate::text::collapse_whitespace;

pub const SUMMARY_BUDGET: usize = 280;
pub const NO_SUMMARY: &str = "(no summary available)";
const ELLIPSIS: char = '\u{2026}';

/// `body` is expected to be plain text already (see `Item::clean_body`).
pub fn summarize(title: &str, body: Option<&str>) -> String {
    let body = body.map(collapse_whitespace).unwrap_or_default();
    if !body.is_empty() {
        return truncate_sentences(&body, SUMMARY_BUDGET);
    }
    if !title.trim().is_empty() {
        return title.to_string();
    }
    NO_SUMMARY.to_string()
}

/// Byte offsets just past each sentence terminator run (`.`, `!`, `?`,
/// plus closing quotes/brackets) that is followed by whitespace or the end.
fn sentence_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, n)) = iter.peek() {
            if matches!(n, '.' | '!' | '?' | '"' | '\'' | ')' | ']') {
                end = j + n.len_utf8();
                iter.next();
            } else {
                break;
            }
        }
        match iter.peek() {
            None => ends.push(end),
            Some(&(_, n)) if n.is_whitespace() => ends.push(end),
            _ => {}
        }
    }
    ends
}

fn truncate_sentences(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }

    let mut keep = 0;
    for end in sentence_ends(text) {
        if text[..end].chars().count() <= budget {
            keep = end;
        } else {
            break;
        }
    }
    if keep > 0 {
        return format!("{}{ELLIPSIS}", text[..keep].trim_end());
    }

    // first sentence alone is over budget: cut on a word boundary
    let cut = text
        .char_indices()
        .nth(budget)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..cut];
    let next_is_space = text[cut..].starts_with(char::is_whitespace);
    let head = if next_is_space {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(ws) => &head[..ws],
            // one giant token; nothing better than a hard cut
            None => head,
        }
    };
    let head = head.trim_end().trim_end_matches([',', ';', ':', '-']).trim_end();
    format!("{head}{ELLIPSIS}")
}
