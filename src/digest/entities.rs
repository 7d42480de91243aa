// src/digest/entities.rs
//! Naive entity extraction.
//!
//! Two candidate sources, merged by position:
//! - curated organization/technology names (case-insensitive, whole words),
//!   emitted with the casing found in the text;
//! - capitalized multi-word runs ("Hugging Face", "New York Times"), with
//!   leading function words ("The", "A", ...) stripped.
//!
//! Title is scanned before body. Output is deduplicated case-insensitively
//! (first casing wins) and capped at [`MAX_ENTITIES`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

pub const MAX_ENTITIES: usize = 20;

const KNOWN_NAMES: &[&str] = &[
    "OpenAI",
    "Anthropic",
    "Google",
    "DeepMind",
    "Microsoft",
    "Apple",
    "Meta",
    "Amazon",
    "AWS",
    "Nvidia",
    "AMD",
    "Intel",
    "IBM",
    "Samsung",
    "Tesla",
    "Hugging Face",
    "Stability AI",
    "Mistral",
    "Cohere",
    "GitHub",
    "GitLab",
    "Mozilla",
    "Reddit",
    "ChatGPT",
    "GPT-4",
    "Gemini",
    "Llama",
    "PyTorch",
    "TensorFlow",
    "Rust",
    "Python",
    "TypeScript",
    "JavaScript",
    "WebAssembly",
    "Kubernetes",
    "Docker",
    "Linux",
    "Figma",
    "Hacker News",
    "arXiv",
];

/// Function words that often start a capitalized run at sentence start.
const LEADING_STOPWORDS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "in", "on", "at", "for", "of", "and",
    "but", "or", "with", "from", "by", "to", "as", "is", "why", "how", "what", "when",
];

static RE_KNOWN: Lazy<Regex> = Lazy::new(|| {
    let mut names: Vec<&str> = KNOWN_NAMES.to_vec();
    // longest first so "Hugging Face" wins over a hypothetical "Hugging"
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    let alts: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alts.join("|"))).expect("known-names regex")
});

static RE_CAP_RUN: Lazy<Regex> = Lazy::new(|| {
    let word = r"\p{Lu}[\p{L}\p{N}&'\-]*";
    Regex::new(&format!(r"\b{word}(?:[ \t]+{word})+")).expect("capitalized-run regex")
});

/// Candidates from one text segment as `(byte offset, span)`.
fn candidates(text: &str) -> Vec<(usize, String)> {
    let mut out: Vec<(usize, String)> = RE_KNOWN
        .find_iter(text)
        .map(|m| (m.start(), m.as_str().to_string()))
        .collect();

    for m in RE_CAP_RUN.find_iter(text) {
        let run = m.as_str();
        let words: Vec<&str> = run.split_whitespace().collect();
        let skip = words
            .iter()
            .take_while(|w| LEADING_STOPWORDS.contains(&w.to_lowercase().as_str()))
            .count();
        let kept = &words[skip..];
        if kept.len() < 2 {
            continue;
        }
        let span = kept.join(" ");
        // the run starts on a word, so skipped words plus their gaps lead to kept[0]
        let mut rel = 0;
        for w in &words[..skip] {
            rel += w.len();
            rel += run[rel..].len() - run[rel..].trim_start().len();
        }
        out.push((m.start() + rel, span));
    }

    // position first, longer span first on the same offset
    out.sort_by(|(pa, a), (pb, b)| pa.cmp(pb).then(b.len().cmp(&a.len())));
    out
}

/// Ordered, deduplicated, capped entity list for one item.
pub fn extract_entities(title: &str, body: Option<&str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    let segments = std::iter::once(title).chain(body);
    for seg in segments {
        for (_, span) in candidates(seg) {
            if out.len() >= MAX_ENTITIES {
                return out;
            }
            if seen.insert(span.to_lowercase()) {
                out.push(span);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_keep_text_casing() {
        let e = extract_entities("openai and NVIDIA team up", None);
        assert_eq!(e, vec!["openai".to_string(), "NVIDIA".to_string()]);
    }

    #[test]
    fn single_known_name_from_headline() {
        let e = extract_entities("OpenAI releases new transformer model", None);
        assert_eq!(e, vec!["OpenAI".to_string()]);
    }

    #[test]
    fn capitalized_runs_strip_leading_stopwords() {
        let e = extract_entities("The New York Times sues over data", None);
        assert_eq!(e, vec!["New York Times".to_string()]);
        let e = extract_entities("Report from Jane Street Capital today", None);
        assert_eq!(e, vec!["Jane Street Capital".to_string()]);
    }

    #[test]
    fn run_offset_skips_leading_stopwords() {
        let c = candidates("The T Mobile merger");
        assert_eq!(c, vec![(4, "T Mobile".to_string())]);
    }

    #[test]
    fn dedup_case_insensitive_first_casing_wins() {
        let e = extract_entities("GitHub ships", Some("Later github said more. GITHUB again."));
        assert_eq!(e, vec!["GitHub".to_string()]);
    }

    #[test]
    fn title_before_body() {
        let e = extract_entities("Docker update", Some("Built on Linux by Docker"));
        assert_eq!(e, vec!["Docker".to_string(), "Linux".to_string()]);
    }

    #[test]
    fn runs_do_not_cross_sentences() {
        let e = extract_entities("Went to Paris. London was next", None);
        assert!(e.is_empty(), "got {e:?}");
    }

    #[test]
    fn capped_at_max() {
        let body: String = (0..40)
            .map(|i| format!("Alpha{i} Beta{i}. "))
            .collect();
        let e = extract_entities("", Some(&body));
        assert_eq!(e.len(), MAX_ENTITIES);
        assert_eq!(e[0], "Alpha0 Beta0");
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(extract_entities("", None).is_empty());
        assert!(extract_entities("lowercase only here", Some("")).is_empty());
    }
}
