// src/digest/sentiment.rs
//! Lexicon sentiment in `[-1, 1]`.
//!
//! raw = (Σ positive weights − Σ negative weights) / (1 + matched terms),
//! then clamped. No matches → 0.0.
//!
//! Negation: if a negator sits in the previous 1..=3 tokens, the match is
//! booked on the opposite side ("not stable" counts as negative).

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::text::{phrase_positions, phrase_words, tokenize, Token};

#[derive(Debug, Deserialize)]
struct Lexicon {
    positive: BTreeMap<String, f32>,
    negative: BTreeMap<String, f32>,
}

static LEXICON: Lazy<Lexicon> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<Lexicon>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone)]
struct Term {
    words: Vec<String>,
    weight: f32,
    polarity: Polarity,
}

/// Scorer over a fixed weighted term list. Cheap to clone, immutable once built.
#[derive(Debug, Clone)]
pub struct SentimentScorer {
    terms: Vec<Term>,
}

impl Default for SentimentScorer {
    fn default() -> Self {
        let pos = LEXICON.positive.iter().map(|(k, v)| (k.as_str(), *v));
        let neg = LEXICON.negative.iter().map(|(k, v)| (k.as_str(), *v));
        Self::from_terms(pos, neg)
    }
}

impl SentimentScorer {
    /// Build from explicit term lists. Weights are taken as absolute values;
    /// zero-weight and empty terms are ignored.
    pub fn from_terms<'a>(
        positive: impl IntoIterator<Item = (&'a str, f32)>,
        negative: impl IntoIterator<Item = (&'a str, f32)>,
    ) -> Self {
        let mut terms = Vec::new();
        let mut push = |t: &str, w: f32, polarity: Polarity| {
            let words = phrase_words(t);
            let weight = w.abs();
            if !words.is_empty() && weight > 0.0 && weight.is_finite() {
                terms.push(Term {
                    words,
                    weight,
                    polarity,
                });
            }
        };
        for (t, w) in positive {
            push(t, w, Polarity::Positive);
        }
        for (t, w) in negative {
            push(t, w, Polarity::Negative);
        }
        Self { terms }
    }

    /// Score free text. Never fails; empty text is neutral.
    pub fn score(&self, text: &str) -> f32 {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return 0.0;
        }

        let mut pos = 0.0f32;
        let mut neg = 0.0f32;
        let mut matched = 0usize;

        for term in &self.terms {
            for at in phrase_positions(&tokens, &term.words) {
                let flipped = negated(&tokens, at);
                let side = match (term.polarity, flipped) {
                    (Polarity::Positive, false) | (Polarity::Negative, true) => &mut pos,
                    _ => &mut neg,
                };
                *side += term.weight;
                matched += 1;
            }
        }

        if matched == 0 {
            return 0.0;
        }
        ((pos - neg) / (1.0 + matched as f32)).clamp(-1.0, 1.0)
    }
}

/// Is there a negator in the previous 1..=3 tokens?
fn negated(tokens: &[Token], at: usize) -> bool {
    (1..=3).any(|k| at >= k && is_negator(tokens[at - k].text.as_str()))
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "without"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
    )
}
