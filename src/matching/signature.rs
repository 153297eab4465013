// src/matching/signature.rs

use log::{debug, info};
use std::collections::{HashMap, HashSet};

use crate::config::ClusteringConfig;
use crate::models::CandidatePair;

/// Frequency band a trigram falls into for one clustering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrigramClass {
    Signal,
    /// Among the most frequent trigrams of the batch
    NoiseCommon,
    /// Among the rarest trigrams of the batch
    NoiseRare,
}

/// Classification of every trigram seen in one batch of candidate pairs.
///
/// Built once per pass and handed to the cluster builder explicitly; it is
/// never shared between entity kinds or reused across runs.
#[derive(Debug, Clone, Default)]
pub struct TrigramClassification {
    classes: HashMap<String, TrigramClass>,
    /// Highly frequent trigrams used only to judge how generic a pair is
    top: HashSet<String>,
}

impl TrigramClassification {
    /// Assemble a classification from precomputed bands. `top` may overlap any
    /// band; it only feeds the commonality measure.
    pub fn from_parts(classes: HashMap<String, TrigramClass>, top: HashSet<String>) -> Self {
        Self { classes, top }
    }

    pub fn class_of(&self, trigram: &str) -> Option<TrigramClass> {
        self.classes.get(trigram).copied()
    }

    pub fn is_signal(&self, trigram: &str) -> bool {
        self.class_of(trigram) == Some(TrigramClass::Signal)
    }

    pub fn is_top(&self, trigram: &str) -> bool {
        self.top.contains(trigram)
    }

    pub fn distinct_trigrams(&self) -> usize {
        self.classes.len()
    }

    pub fn signal_count(&self) -> usize {
        self.classes
            .values()
            .filter(|c| **c == TrigramClass::Signal)
            .count()
    }

    pub fn top_count(&self) -> usize {
        self.top.len()
    }
}

/// Ranks every trigram of the batch by frequency and splits the ranking into
/// the common head, the signal band and the rare tail.
///
/// Trigrams are counted across both sides of every pair. Equal counts are
/// ranked by first appearance in the batch, so a fixed pair order always
/// yields the same classification.
pub fn analyze_signatures(pairs: &[CandidatePair], config: &ClusteringConfig) -> TrigramClassification {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut first_seen = 0;
    for pair in pairs {
        for trigram in pair.trigrams_a.iter().chain(pair.trigrams_b.iter()) {
            let entry = counts.entry(trigram.as_str()).or_insert_with(|| {
                first_seen += 1;
                (0, first_seen)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(trigram, (count, seen))| (trigram, count, seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let n = ranked.len();
    let n_too_high = n.saturating_sub((n as f64 * config.signal_high_quantile).floor() as usize);
    let n_too_low = (n as f64 * config.signal_low_quantile).floor() as usize;
    let signal_end = n.saturating_sub(n_too_low);
    let n_top = (n_too_high as f64 * config.top_trigram_factor).floor() as usize;

    let mut classes = HashMap::with_capacity(n);
    let mut top = HashSet::with_capacity(n_top);
    let mut band_sizes = [0usize; 3];
    for (rank, (trigram, _, _)) in ranked.iter().enumerate() {
        let class = if rank < n_too_high {
            TrigramClass::NoiseCommon
        } else if rank < signal_end {
            TrigramClass::Signal
        } else {
            TrigramClass::NoiseRare
        };
        band_sizes[class as usize] += 1;
        classes.insert(trigram.to_string(), class);
        if rank < n_top {
            top.insert(trigram.to_string());
        }
    }

    if let Some((head, count, _)) = ranked.first() {
        debug!("Most frequent trigram '{}' appears {} times", head, count);
    }
    info!(
        "Classified {} distinct trigrams: {} signal, {} common, {} rare, {} in top set",
        n,
        band_sizes[TrigramClass::Signal as usize],
        band_sizes[TrigramClass::NoiseCommon as usize],
        band_sizes[TrigramClass::NoiseRare as usize],
        top.len()
    );

    TrigramClassification { classes, top }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &[&str], b: &[&str]) -> CandidatePair {
        CandidatePair {
            name_a: "a".to_string(),
            name_b: "b".to_string(),
            trigrams_a: a.iter().map(|s| s.to_string()).collect(),
            trigrams_b: b.iter().map(|s| s.to_string()).collect(),
            similarity: 0.8,
        }
    }

    /// 20 distinct trigrams t00..t19 where tNN appears 20 - NN times.
    fn graded_batch() -> Vec<CandidatePair> {
        let mut pairs = Vec::new();
        for i in 0..20usize {
            let name = format!("t{:02}", i);
            for _ in 0..(20 - i) {
                pairs.push(pair(&[name.as_str()], &[]));
            }
        }
        pairs
    }

    #[test]
    fn test_frequency_bands() {
        let classification = analyze_signatures(&graded_batch(), &ClusteringConfig::default());

        // n = 20: n_too_high = 20 - floor(19.8) = 1, n_too_low = floor(2.0) = 2
        assert_eq!(classification.distinct_trigrams(), 20);
        assert_eq!(classification.class_of("t00"), Some(TrigramClass::NoiseCommon));
        assert_eq!(classification.class_of("t01"), Some(TrigramClass::Signal));
        assert_eq!(classification.class_of("t17"), Some(TrigramClass::Signal));
        assert_eq!(classification.class_of("t18"), Some(TrigramClass::NoiseRare));
        assert_eq!(classification.class_of("t19"), Some(TrigramClass::NoiseRare));
        assert_eq!(classification.signal_count(), 17);

        // top = floor(1 * 1.5) = 1
        assert!(classification.is_top("t00"));
        assert!(!classification.is_top("t01"));
        assert_eq!(classification.top_count(), 1);
    }

    #[test]
    fn test_both_sides_are_counted() {
        // "x" appears on the b side only, but three times.
        let pairs = vec![pair(&["y"], &["x"]), pair(&[], &["x"]), pair(&[], &["x"])];
        let classification = analyze_signatures(&pairs, &ClusteringConfig::default());
        assert!(classification.is_top("x"));
        assert_eq!(classification.class_of("x"), Some(TrigramClass::NoiseCommon));
    }

    #[test]
    fn test_ties_break_by_first_appearance() {
        let pairs = vec![pair(&["late", "early"], &[]), pair(&["early", "late"], &[])];
        let first = analyze_signatures(&pairs, &ClusteringConfig::default());
        // Both counted twice; "late" was seen first and takes the common slot.
        assert_eq!(first.class_of("late"), Some(TrigramClass::NoiseCommon));
        assert_eq!(first.class_of("early"), Some(TrigramClass::Signal));

        let again = analyze_signatures(&pairs, &ClusteringConfig::default());
        assert_eq!(again.class_of("late"), first.class_of("late"));
    }

    #[test]
    fn test_empty_batch_classifies_nothing() {
        let classification = analyze_signatures(&[], &ClusteringConfig::default());
        assert_eq!(classification.distinct_trigrams(), 0);
        assert_eq!(classification.signal_count(), 0);
        assert!(!classification.is_signal("abc"));
    }
}
