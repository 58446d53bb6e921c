//! Tokenization shared by trending keywords, the word cloud, and per-keyword
//! history/sentiment matching (spec §4.3.3).
//!
//! Grounded in `text_analyzer.py::_tokenize_text`: lowercase, split on
//! whitespace, drop short tokens, stop words, and pure-digit tokens.
//! `STOP_WORDS` is the original's actual list (`Analysis/config.py`'s
//! `stop_words`), including its web-token entries (`http`, `https`, `com`,
//! `www`, `$`) — nothing upstream strips URLs or `$SYMBOL` tokens before
//! they reach this filter.

use once_cell::sync::Lazy;
use std::collections::HashSet;

const MIN_TOKEN_LEN: usize = 3;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "was", "were", "be", "been", "being", "this", "that", "these", "those",
        "it", "its", "it's", "i", "you", "he", "she", "we", "they", "my", "your", "his", "her",
        "our", "their", "me", "him", "us", "them", "what", "which", "who", "whom", "whose",
        "where", "when", "why", "how", "all", "any", "both", "each", "few", "more", "most",
        "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too",
        "very", "s", "t", "can", "will", "just", "don", "should", "now", "d", "ll", "m", "o",
        "re", "ve", "y", "ain", "aren", "couldn", "didn", "doesn", "hadn", "hasn", "haven",
        "isn", "ma", "mightn", "mustn", "needn", "shan", "shouldn", "wasn", "weren", "won",
        "wouldn", "$", "http", "https", "com", "www", "has", "have",
    ]
    .into_iter()
    .collect()
});

/// Lowercases, splits on whitespace, and keeps tokens that are at least
/// [`MIN_TOKEN_LEN`] characters, not a stop word, and not purely digits.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(clean_token)
        .filter(|t| {
            t.chars().count() >= MIN_TOKEN_LEN
                && !STOP_WORDS.contains(t.as_str())
                && !t.chars().all(|c| c.is_ascii_digit())
        })
        .collect()
}

/// Strips leading/trailing punctuation a whitespace split leaves behind
/// (e.g. `"stocks,"` or `"(bullish)"`).
fn clean_token(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_short_stop_and_numeric_tokens() {
        let tokens = tokenize("The Fed held rates at 525 basis points and it was fine");
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"525".to_string()));
        assert!(tokens.contains(&"fed".to_string()));
        assert!(tokens.contains(&"held".to_string()));
        assert!(tokens.contains(&"rates".to_string()));
        assert!(tokens.contains(&"basis".to_string()));
        assert!(tokens.contains(&"points".to_string()));
    }

    #[test]
    fn strips_surrounding_punctuation() {
        let tokens = tokenize("(bullish), momentum!");
        assert!(tokens.contains(&"bullish".to_string()));
        assert!(tokens.contains(&"momentum".to_string()));
    }
}
