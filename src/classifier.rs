//! TF-IDF intent classifier.
//!
//! Each training pattern becomes an L2-normalized TF-IDF vector over word
//! 1–2 grams. Classification scores a query against every pattern vector
//! and reports the best cosine similarity together with that pattern's tag.
//! Because patterns are stored normalized, repeating a stored pattern
//! verbatim scores 1.0, which is what makes taught answers retrievable.
//!
//! The model is rebuilt from scratch by every [`IntentClassifier::train`]
//! call; there is no incremental state.

use std::collections::{HashMap, HashSet};

use crate::intents::Intent;
use crate::text::tokenize;

/// Best-scoring tag for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub tag: String,
    /// Cosine similarity in `[0, 1]`.
    pub score: f32,
}

/// Nearest-pattern TF-IDF scorer.
#[derive(Debug, Default)]
pub struct IntentClassifier {
    /// Token -> smoothed inverse document frequency.
    idf: HashMap<String, f32>,
    /// One entry per training pattern: its tag and unit-length vector.
    patterns: Vec<(String, HashMap<String, f32>)>,
}

impl IntentClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the model from the full intent list.
    pub fn train(&mut self, intents: &[Intent]) {
        let docs: Vec<(String, Vec<String>)> = intents
            .iter()
            .flat_map(|intent| {
                intent
                    .patterns
                    .iter()
                    .map(|p| (intent.tag.clone(), tokenize(p)))
            })
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();

        let mut df: HashMap<&str, u32> = HashMap::new();
        for (_, tokens) in &docs {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for token in unique {
                *df.entry(token).or_insert(0) += 1;
            }
        }

        // Smoothed IDF, always positive even for a term present in every
        // document. Keeps single-pattern stores classifiable.
        let n = docs.len() as f32;
        self.idf = df
            .into_iter()
            .map(|(token, count)| {
                let idf = ((1.0 + n) / (1.0 + count as f32)).ln() + 1.0;
                (token.to_string(), idf)
            })
            .collect();

        self.patterns = docs
            .into_iter()
            .map(|(tag, tokens)| {
                let vector = self.vectorize_tokens(&tokens);
                (tag, vector)
            })
            .collect();
    }

    /// Number of trained pattern vectors.
    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Score a query against every pattern and return the best match.
    ///
    /// `None` when the model is untrained, the query is empty, or none of
    /// the query tokens appear in the training vocabulary. Ties keep the
    /// earliest pattern, so file order makes results deterministic.
    #[must_use]
    pub fn classify(&self, text: &str) -> Option<Prediction> {
        let query = self.vectorize_tokens(&tokenize(text));
        if query.is_empty() {
            return None;
        }

        let mut best: Option<Prediction> = None;
        for (tag, vector) in &self.patterns {
            let score = dot(&query, vector);
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Prediction {
                    tag: tag.clone(),
                    score,
                });
            }
        }

        best.filter(|b| b.score > 0.0)
    }

    /// TF-IDF weigh and L2-normalize. Tokens outside the trained
    /// vocabulary drop out.
    fn vectorize_tokens(&self, tokens: &[String]) -> HashMap<String, f32> {
        let mut tf: HashMap<&str, f32> = HashMap::new();
        for token in tokens {
            *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let mut vector: HashMap<String, f32> = tf
            .into_iter()
            .filter_map(|(token, freq)| {
                self.idf.get(token).map(|idf| (token.to_string(), freq * idf))
            })
            .collect();

        let norm = vector.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for weight in vector.values_mut() {
                *weight /= norm;
            }
        }
        vector
    }
}

/// Both sides are unit length, so the dot product is the cosine.
fn dot(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .map(|(token, w)| large.get(token).map_or(0.0, |v| w * v))
        .sum()
}
