// src/matching/fuzzy.rs
//
// Weighted string similarity on a 0-100 scale. Combines a plain edit ratio
// with word-order-insensitive variants and, for names of very different
// length, best-aligned substring variants.

use std::collections::BTreeSet;

const UNBASE_SCALE: f64 = 0.95;
const PARTIAL_SCALE: f64 = 0.9;
const LONG_PARTIAL_SCALE: f64 = 0.6;

/// Lowercase, turn every non-alphanumeric character into a blank, trim.
fn process(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

fn lcs_length(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// 2 * matches / total characters, in [0, 1].
fn raw_ratio(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    2.0 * lcs_length(a, b) as f64 / (a.len() + b.len()) as f64
}

fn to_score(raw: f64) -> f64 {
    (raw * 100.0).round_ties_even()
}

fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    to_score(raw_ratio(&a, &b))
}

/// Ratio of the shorter string against its best-aligned window of the longer.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let mut best: f64 = 0.0;
    for window in longer.windows(shorter.len()) {
        let r = raw_ratio(&shorter, window);
        if r > 0.995 {
            return 100.0;
        }
        best = best.max(r);
    }
    to_score(best)
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn token_sort_ratio(a: &str, b: &str, partial: bool) -> f64 {
    let (a, b) = (sorted_tokens(a), sorted_tokens(b));
    if partial {
        partial_ratio(&a, &b)
    } else {
        ratio(&a, &b)
    }
}

/// Compares the shared words alone against the shared words plus each side's
/// remainder, so extra words on one side cost little.
fn token_set_ratio(a: &str, b: &str, partial: bool) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let join = |tokens: Vec<&str>| tokens.join(" ");
    let section = join(tokens_a.intersection(&tokens_b).copied().collect());
    let only_a = join(tokens_a.difference(&tokens_b).copied().collect());
    let only_b = join(tokens_b.difference(&tokens_a).copied().collect());

    let combined_a = format!("{} {}", section, only_a).trim().to_string();
    let combined_b = format!("{} {}", section, only_b).trim().to_string();

    let score = |x: &str, y: &str| {
        if partial {
            partial_ratio(x, y)
        } else {
            ratio(x, y)
        }
    };
    score(&section, &combined_a)
        .max(score(&section, &combined_b))
        .max(score(&combined_a, &combined_b))
}

/// Best of several similarity measures, 0-100. Word order never lowers the
/// score by more than the 0.95 unbase factor, and a short name fully
/// contained in a long one scores high.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let p1 = process(a);
    let p2 = process(b);
    if p1.is_empty() || p2.is_empty() {
        return 0;
    }

    let base = ratio(&p1, &p2);
    let (len1, len2) = (p1.chars().count() as f64, p2.chars().count() as f64);
    let len_ratio = len1.max(len2) / len1.min(len2);

    let best = if len_ratio < 1.5 {
        let tsor = token_sort_ratio(&p1, &p2, false) * UNBASE_SCALE;
        let tser = token_set_ratio(&p1, &p2, false) * UNBASE_SCALE;
        base.max(tsor).max(tser)
    } else {
        let partial_scale = if len_ratio > 8.0 {
            LONG_PARTIAL_SCALE
        } else {
            PARTIAL_SCALE
        };
        let partial = partial_ratio(&p1, &p2) * partial_scale;
        let ptsor = token_sort_ratio(&p1, &p2, true) * UNBASE_SCALE * partial_scale;
        let ptser = token_set_ratio(&p1, &p2, true) * UNBASE_SCALE * partial_scale;
        base.max(partial).max(ptsor).max(ptser)
    };

    best.round_ties_even().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_after_processing() {
        assert_eq!(weighted_ratio("Smith Realty", "SMITH-realty"), 100);
    }

    #[test]
    fn test_word_order_costs_unbase_factor() {
        assert_eq!(weighted_ratio("Smith Realty", "Realty Smith"), 95);
    }

    #[test]
    fn test_extra_suffix_word_scores_high() {
        // shared words "realty smith" match one side exactly
        assert_eq!(weighted_ratio("Smith Realty Inc", "Smith Realty"), 95);
    }

    #[test]
    fn test_contained_short_name_uses_partial() {
        // length ratio >= 1.5 so the partial window match applies (100 * 0.9)
        assert_eq!(weighted_ratio("Acme", "Acme Realty Group"), 90);
    }

    #[test]
    fn test_unrelated_names_score_low() {
        assert!(weighted_ratio("Acme Homes", "Zenith Partners") < 50);
    }

    #[test]
    fn test_empty_input_scores_zero() {
        assert_eq!(weighted_ratio("", "Acme"), 0);
        assert_eq!(weighted_ratio("&&", "Acme"), 0);
    }

    #[test]
    fn test_ratio_counts_common_subsequence() {
        // lcs("abcd", "abed") = 3 -> 2 * 3 / 8
        assert_eq!(ratio("abcd", "abed"), 75.0);
    }
}
