// src/digest/topics.rs
//! Keyword topic classifier.
//!
//! A topic table is an ordered list of `{ label, triggers }`. Each item is
//! scanned for whole-word, case-insensitive trigger hits; title hits count
//! twice, body hits once. The highest total wins, ties go to the earlier
//! definition, zero hits fall back to [`FALLBACK_TOPIC`].
//!
//! The built-in table lives in `BUILTIN_TOPICS`. A replacement can be loaded
//! from TOML or JSON:
//!
//! ```toml
//! [[topics]]
//! label = "Machine Learning"
//! triggers = ["machine learning", "llm"]
//! ```

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::text::{phrase_positions, phrase_words, tokenize, Token};

pub const FALLBACK_TOPIC: &str = "General";

const TITLE_WEIGHT: usize = 2;
const BODY_WEIGHT: usize = 1;

const BUILTIN_TOPICS: &[(&str, &[&str])] = &[
    (
        "Machine Learning",
        &[
            "machine learning",
            "neural network",
            "neural networks",
            "llm",
            "llms",
            "transformer",
            "transformers",
            "deep learning",
            "language model",
            "language models",
            "diffusion model",
            "fine-tuning",
            "reinforcement learning",
            "embedding",
            "embeddings",
            "inference",
            "gpt",
            "artificial intelligence",
        ],
    ),
    (
        "Developer Tools",
        &[
            "sdk",
            "api",
            "apis",
            "framework",
            "compiler",
            "ide",
            "debugger",
            "cli",
            "library",
            "programming language",
            "open source",
            "package manager",
            "rust",
            "python",
            "typescript",
            "javascript",
            "kubernetes",
            "docker",
        ],
    ),
    (
        "UI/UX",
        &[
            "design system",
            "accessibility",
            "user experience",
            "user interface",
            "ux",
            "ui",
            "usability",
            "typography",
            "figma",
            "prototype",
        ],
    ),
    (
        "Security",
        &[
            "vulnerability",
            "vulnerabilities",
            "exploit",
            "malware",
            "ransomware",
            "phishing",
            "breach",
            "cve",
            "zero-day",
            "encryption",
        ],
    ),
    (
        "Hardware",
        &[
            "gpu",
            "gpus",
            "cpu",
            "chip",
            "chips",
            "semiconductor",
            "processor",
            "datacenter",
            "data center",
        ],
    ),
    (
        "Business",
        &[
            "funding",
            "acquisition",
            "acquires",
            "ipo",
            "revenue",
            "earnings",
            "layoffs",
            "startup",
            "valuation",
        ],
    ),
];

/// One topic definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDef {
    pub label: String,
    pub triggers: Vec<String>,
}

#[derive(Debug, Clone)]
struct CompiledTopic {
    label: String,
    triggers: Vec<Vec<String>>,
}

/// Ordered, validated topic table ready for matching.
#[derive(Debug, Clone)]
pub struct TopicTable {
    topics: Vec<CompiledTopic>,
}

impl Default for TopicTable {
    fn default() -> Self {
        let defs = BUILTIN_TOPICS
            .iter()
            .map(|(label, triggers)| TopicDef {
                label: label.to_string(),
                triggers: triggers.iter().map(|t| t.to_string()).collect(),
            })
            .collect();
        Self::from_defs(defs).expect("builtin topic table is valid")
    }
}

#[derive(Deserialize)]
struct TopicFile {
    topics: Vec<TopicDef>,
}

impl TopicTable {
    /// Validate and compile definitions. Labels must be non-empty, unique
    /// (case-insensitive) and must not shadow the fallback label.
    pub fn from_defs(defs: Vec<TopicDef>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut topics = Vec::with_capacity(defs.len());
        for d in defs {
            let label = d.label.trim().to_string();
            if label.is_empty() {
                bail!("topic label must not be empty");
            }
            if label.eq_ignore_ascii_case(FALLBACK_TOPIC) {
                bail!("topic label '{FALLBACK_TOPIC}' is reserved for the fallback");
            }
            if !seen.insert(label.to_lowercase()) {
                bail!("duplicate topic label '{label}'");
            }
            let triggers = d
                .triggers
                .iter()
                .map(|t| phrase_words(t))
                .filter(|w| !w.is_empty())
                .collect();
            topics.push(CompiledTopic { label, triggers });
        }
        Ok(Self { topics })
    }

    /// Load a table from a `.toml` or `.json` file (`{ topics = [...] }`).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading topic table from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let file: TopicFile = match ext.as_str() {
            "toml" => toml::from_str(&content).context("parsing topic table toml")?,
            "json" => serde_json::from_str(&content).context("parsing topic table json")?,
            other => return Err(anyhow!("unsupported topic table format '{other}'")),
        };
        Self::from_defs(file.topics)
    }

    /// Labels in definition order (fallback excluded).
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|t| t.label.as_str())
    }

    fn hits(topic: &CompiledTopic, tokens: &[Token]) -> usize {
        topic
            .triggers
            .iter()
            .map(|p| phrase_positions(tokens, p).len())
            .sum()
    }

    /// Weighted match count per topic, in table order.
    pub fn scores(&self, title: &str, body: Option<&str>) -> Vec<(&str, usize)> {
        let title_toks = tokenize(title);
        let body_toks = body.map(tokenize).unwrap_or_default();
        self.topics
            .iter()
            .map(|t| {
                let n = Self::hits(t, &title_toks) * TITLE_WEIGHT
                    + Self::hits(t, &body_toks) * BODY_WEIGHT;
                (t.label.as_str(), n)
            })
            .collect()
    }

    /// Pick exactly one label for the item.
    pub fn classify(&self, title: &str, body: Option<&str>) -> &str {
        let mut best: Option<(&str, usize)> = None;
        for (label, n) in self.scores(title, body) {
            // strict `>` keeps the earlier definition on ties
            if n > 0 && best.map_or(true, |(_, b)| n > b) {
                best = Some((label, n));
            }
        }
        best.map(|(l, _)| l).unwrap_or(FALLBACK_TOPIC)
    }
}
