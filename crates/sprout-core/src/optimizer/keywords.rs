//! Bag-of-keyword extraction for history summarization
//!
//! A documented heuristic, not language understanding: rank words by
//! frequency after dropping stopwords and short tokens.

use std::collections::HashMap;

/// Common words that carry no topical signal
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "you", "your", "what", "when", "where", "how",
    "why", "can", "could", "would", "should", "does", "did", "have", "has", "had", "are", "was",
    "were", "will", "just", "like", "about", "because", "there", "their", "them", "they", "then",
    "than", "but", "not", "yes", "very", "really", "okay", "know", "want", "tell", "please",
    "thanks", "thank", "dont", "cant", "lets", "its", "got", "get", "make", "made", "more", "some",
    "any", "all", "out", "now", "one", "two", "too", "also", "into", "from", "over", "under",
];

/// Extract the top keywords across a set of texts, most frequent first
///
/// Ties break alphabetically so the output is deterministic.
pub fn extract_keywords<'a>(texts: impl IntoIterator<Item = &'a str>, max: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for text in texts {
        for raw in text.split_whitespace() {
            let word: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if word.len() < 3 || STOPWORDS.contains(&word.as_str()) {
                continue;
            }
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(max).map(|(word, _)| word).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_ranking() {
        let texts = [
            "fractions are tricky",
            "I like fractions",
            "fractions and decimals",
            "decimals too",
        ];
        let keywords = extract_keywords(texts, 3);
        assert_eq!(keywords[0], "fractions");
        assert_eq!(keywords[1], "decimals");
    }

    #[test]
    fn test_stopwords_and_short_tokens_dropped() {
        let keywords = extract_keywords(["the and you it is to"], 10);
        assert!(keywords.is_empty());
    }

    #[test]
    fn test_punctuation_stripped() {
        let keywords = extract_keywords(["Volcanoes! Volcanoes? volcanoes..."], 5);
        assert_eq!(keywords, vec!["volcanoes"]);
    }

    #[test]
    fn test_deterministic_tie_break() {
        let first = extract_keywords(["zebra apple zebra apple"], 2);
        let second = extract_keywords(["apple zebra apple zebra"], 2);
        assert_eq!(first, second);
    }
}
