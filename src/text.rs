// src/text.rs
//! Text helpers shared by the feed providers and the digest engine:
//! HTML-ish body cleanup, whitespace folding and word tokenization.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_BLOCK_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)</?(p|br|div|li|ul|ol|h[1-6]|tr|td|th|table|blockquote|section|article|pre|hr)\b[^>]*>",
    )
    .unwrap()
});
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[a-z!][^>]*>").unwrap());
static RE_BLOCK_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize lightly-marked feed text into plain prose.
///
/// Order: drop `<script>`/`<style>` blocks, turn block-level tags into
/// spaces, drop inline tags, decode HTML entities, fold typographic quotes
/// to ASCII, collapse whitespace, trim.
/// Entities are decoded after tag stripping so escaped markup in text
/// (`&lt;b&gt;`) survives as literal characters.
pub fn normalize_text(s: &str) -> String {
    let out = RE_BLOCK_TAGS.replace_all(s, " ");
    let out = RE_BLOCK_BOUNDARY.replace_all(&out, " ");
    let out = RE_TAGS.replace_all(&out, "");
    let out = html_escape::decode_html_entities(&out).to_string();

    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    collapse_whitespace(&out)
}

/// Collapse every whitespace run (incl. NBSP, tabs, newlines) to one space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

/// A lowercase word token with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Alphanumeric tokens, lowercased. Apostrophes inside a word are kept
/// (`isn't`), everything else splits.
pub fn tokenize(s: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;

    let bytes_end = s.len();
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    for (i, &(pos, c)) in chars.iter().enumerate() {
        let inner_apostrophe = (c == '\'' || c == '\u{2019}')
            && start.is_some()
            && chars
                .get(i + 1)
                .is_some_and(|&(_, next)| next.is_alphanumeric());
        if c.is_alphanumeric() || inner_apostrophe {
            if start.is_none() {
                start = Some(pos);
            }
        } else if let Some(st) = start.take() {
            out.push(mk_token(s, st, pos));
        }
    }
    if let Some(st) = start {
        out.push(mk_token(s, st, bytes_end));
    }
    out
}

fn mk_token(s: &str, start: usize, end: usize) -> Token {
    Token {
        text: s[start..end].to_lowercase().replace('\u{2019}', "'"),
        start,
        end,
    }
}

/// Lowercase word list of a phrase, used to match multi-word triggers.
pub fn phrase_words(phrase: &str) -> Vec<String> {
    tokenize(phrase).into_iter().map(|t| t.text).collect()
}

/// Start indices of every occurrence of `phrase` (already tokenized) in `tokens`.
pub fn phrase_positions(tokens: &[Token], phrase: &[String]) -> Vec<usize> {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return Vec::new();
    }
    (0..=tokens.len() - phrase.len())
        .filter(|&i| {
            phrase
                .iter()
                .enumerate()
                .all(|(k, w)| tokens[i + k].text == *w)
        })
        .collect()
}
