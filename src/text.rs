//! Text normalization and tokenization shared by the classifier and the
//! chat engine.
//!
//! Normalization is intentionally blunt: lowercase everything, drop any
//! character that is neither alphanumeric nor whitespace, collapse runs of
//! whitespace. Patterns are stored normalized, so a question asked again
//! after a teach event normalizes back to the exact stored pattern.

/// Lowercase, strip punctuation, and collapse whitespace.
///
/// Unicode letters and digits survive, so non-ASCII input ("merhaba",
/// "café") keeps its words intact.
#[must_use]
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tokenize normalized text into word unigrams plus adjacent-pair bigrams.
///
/// The bigrams give short pattern phrases ("how are") some word-order
/// signal without a real language model.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let norm = normalize(text);
    let words: Vec<&str> = norm.split_whitespace().collect();

    let mut tokens: Vec<String> = words.iter().map(|w| (*w).to_string()).collect();
    for pair in words.windows(2) {
        tokens.push(format!("{} {}", pair[0], pair[1]));
    }
    tokens
}
