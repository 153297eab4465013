// src/trigram.rs
//
// In-process trigram decomposition compatible with PostgreSQL's pg_trgm, so a
// store without a database can produce the same candidate-pair contract.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\W_]+").unwrap_or_else(|_| Regex::new(r"[[:alnum:]]+").unwrap()));

/// Sorted, deduplicated trigrams of `name`, the way `show_trgm` reports them:
/// lowercased words padded with two leading blanks and one trailing blank.
pub fn trigrams(name: &str) -> Vec<String> {
    let lowered = name.to_lowercase();
    let mut grams = BTreeSet::new();

    for word in WORD_REGEX.find_iter(&lowered) {
        let padded: Vec<char> = format!("  {} ", word.as_str()).chars().collect();
        for window in padded.windows(3) {
            grams.insert(window.iter().collect::<String>());
        }
    }

    grams.into_iter().collect()
}

/// Jaccard similarity of two sorted trigram sets, as `similarity()` computes it.
pub fn similarity_of(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.iter().filter(|t| b.binary_search(t).is_ok()).count();
    let union = a.len() + b.len() - shared;
    shared as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn similarity(a: &str, b: &str) -> f32 {
        similarity_of(&trigrams(a), &trigrams(b))
    }

    #[test]
    fn test_trigrams_match_show_trgm() {
        // SELECT show_trgm('Cat') => {"  c"," ca","at ",cat}
        assert_eq!(trigrams("Cat"), vec!["  c", " ca", "at ", "cat"]);
    }

    #[test]
    fn test_trigrams_split_on_punctuation() {
        let grams = trigrams("A&B");
        assert_eq!(grams, vec!["  a", "  b", " a ", " b "]);
    }

    #[test]
    fn test_identical_names_fully_similar() {
        assert_eq!(similarity("Smith Realty", "smith realty"), 1.0);
    }

    #[test]
    fn test_similarity_drops_with_extra_words() {
        let close = similarity("Smith Realty", "Smith Realty Inc");
        let far = similarity("Smith Realty", "Jones Homes");
        assert!(close > 0.7, "close was {}", close);
        assert!(far < 0.1, "far was {}", far);
    }

    #[test]
    fn test_empty_names_have_zero_similarity() {
        assert_eq!(similarity("", "!!"), 0.0);
    }
}
