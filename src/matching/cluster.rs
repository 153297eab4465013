// src/matching/cluster.rs

use log::{debug, info, trace};
use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;

use crate::config::ClusteringConfig;
use crate::matching::fuzzy::weighted_ratio;
use crate::matching::signature::TrigramClassification;
use crate::models::{CandidatePair, Cluster, ClusterKey};

/// Outcome of checking one candidate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairDecision {
    /// Keep the pair under `key`. `rescued` marks a weak pair that passed the
    /// de-noised string check.
    Accepted { key: ClusterKey, rescued: bool },
    /// Weak pair whose de-noised names scored below the rescue threshold.
    Rejected { score: u8 },
}

/// Clusters of one pass plus the counters logged for it.
#[derive(Debug, Clone, Default)]
pub struct ClusterSet {
    pub clusters: Vec<Cluster>,
    pub pairs_accepted: usize,
    pub pairs_rescued: usize,
    pub pairs_rejected: usize,
    /// Signature buckets before buckets sharing a member were merged
    pub buckets: usize,
}

impl ClusterSet {
    pub fn member_count(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum()
    }
}

/// Removes each generic fragment from `name`, in list order, case-sensitively.
pub fn strip_generic_fragments(name: &str, fragments: &[String]) -> String {
    fragments
        .iter()
        .fold(name.to_string(), |cleaned, fragment| cleaned.replace(fragment.as_str(), ""))
}

/// Decide whether a candidate pair joins a cluster, and under which key.
///
/// A pair is weak when it shares fewer than `min_signal_trigrams` signal
/// trigrams or when more than `max_commonality` of its shared trigrams are
/// top-frequency ones. Weak pairs are kept only if the first name, with
/// generic fragments removed, still scores at least `rescue_score_threshold`
/// against the second.
pub fn assess_pair(
    pair: &CandidatePair,
    classification: &TrigramClassification,
    config: &ClusteringConfig,
) -> PairDecision {
    let trigrams_a: HashSet<&str> = pair.trigrams_a.iter().map(String::as_str).collect();
    let shared: BTreeSet<&str> = pair
        .trigrams_b
        .iter()
        .map(String::as_str)
        .filter(|t| trigrams_a.contains(t))
        .collect();

    let commonality = if shared.is_empty() {
        0.0
    } else {
        shared.iter().filter(|t| classification.is_top(t)).count() as f64 / shared.len() as f64
    };
    let key = ClusterKey::from_trigrams(
        shared
            .iter()
            .copied()
            .filter(|t| classification.is_signal(t)),
    );

    let few_distinctions = key.len() < config.min_signal_trigrams;
    let mostly_common = commonality > config.max_commonality;
    if !(few_distinctions || mostly_common) {
        return PairDecision::Accepted {
            key,
            rescued: false,
        };
    }

    let cleaned = strip_generic_fragments(&pair.name_a, &config.generic_fragments);
    let score = weighted_ratio(&cleaned, &pair.name_b);
    if score < config.rescue_score_threshold {
        trace!(
            "Rejecting '{}' ~ '{}': {} signal trigrams, commonality {:.2}, de-noised score {}",
            pair.name_a,
            pair.name_b,
            key.len(),
            commonality,
            score
        );
        return PairDecision::Rejected { score };
    }

    trace!(
        "Keeping weak pair '{}' ~ '{}' (de-noised score {})",
        pair.name_a,
        pair.name_b,
        score
    );
    PairDecision::Accepted { key, rescued: true }
}

/// Groups accepted pairs by their shared signal-trigram signature.
///
/// Pairs with identical signatures share a bucket even when they never
/// co-occurred; pairs accepted with an empty signature all share the empty
/// key's bucket. Buckets that share a member are then merged, so every accepted name
/// ends up in exactly one cluster; a merged cluster keeps the trigrams common
/// to all of its signatures as its key.
pub fn build_clusters(
    pairs: &[CandidatePair],
    classification: &TrigramClassification,
    config: &ClusteringConfig,
) -> ClusterSet {
    let start_time = Instant::now();
    let mut set = ClusterSet::default();

    let mut buckets: Vec<(ClusterKey, BTreeSet<String>)> = Vec::new();
    let mut bucket_by_key: HashMap<ClusterKey, usize> = HashMap::new();

    for pair in pairs {
        let (key, rescued) = match assess_pair(pair, classification, config) {
            PairDecision::Accepted { key, rescued } => (key, rescued),
            PairDecision::Rejected { .. } => {
                set.pairs_rejected += 1;
                continue;
            }
        };
        set.pairs_accepted += 1;
        if rescued {
            set.pairs_rescued += 1;
        }

        let idx = *bucket_by_key.entry(key.clone()).or_insert_with(|| {
            buckets.push((key, BTreeSet::new()));
            buckets.len() - 1
        });
        buckets[idx].1.insert(pair.name_a.clone());
        buckets[idx].1.insert(pair.name_b.clone());
    }
    set.buckets = buckets.len();

    // Merge buckets that share a member
    let mut union_find = UnionFind::<usize>::new(buckets.len());
    let mut home_bucket: HashMap<&str, usize> = HashMap::new();
    for (idx, (_, members)) in buckets.iter().enumerate() {
        for member in members {
            match home_bucket.get(member.as_str()) {
                Some(&home) => {
                    union_find.union(home, idx);
                }
                None => {
                    home_bucket.insert(member.as_str(), idx);
                }
            }
        }
    }

    let mut merged: BTreeMap<usize, Cluster> = BTreeMap::new();
    for (idx, (key, members)) in buckets.iter().enumerate() {
        let root = union_find.find(idx);
        match merged.get_mut(&root) {
            Some(cluster) => {
                cluster.key = cluster.key.intersection(key);
                cluster.members.extend(members.iter().cloned());
            }
            None => {
                merged.insert(
                    root,
                    Cluster {
                        key: key.clone(),
                        members: members.clone(),
                    },
                );
            }
        }
    }

    set.clusters = merged.into_values().collect();
    set.clusters
        .sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.members.cmp(&b.members)));

    for cluster in &set.clusters {
        debug!(
            "Cluster [{}] has {} members",
            cluster.key,
            cluster.members.len()
        );
    }
    info!(
        "Bucketed {} pairs ({} kept after de-noising, {} rejected) into {} signatures, consolidated to {} clusters covering {} names in {:.2?}",
        set.pairs_accepted,
        set.pairs_rescued,
        set.pairs_rejected,
        set.buckets,
        set.clusters.len(),
        set.member_count(),
        start_time.elapsed()
    );

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::signature::TrigramClass;

    const SIGNAL: [&str; 8] = ["s1", "s2", "s3", "s4", "s5", "s6", "s7", "s8"];

    fn classification() -> TrigramClassification {
        let mut classes = HashMap::new();
        for t in SIGNAL {
            classes.insert(t.to_string(), TrigramClass::Signal);
        }
        for t in ["c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8"] {
            classes.insert(t.to_string(), TrigramClass::NoiseCommon);
        }
        classes.insert("r1".to_string(), TrigramClass::NoiseRare);
        let top = ["c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        TrigramClassification::from_parts(classes, top)
    }

    fn pair(a: &str, b: &str, shared: &[&str]) -> CandidatePair {
        let grams: Vec<String> = shared.iter().map(|s| s.to_string()).collect();
        let mut trigrams_b = grams.clone();
        trigrams_b.push("r1".to_string());
        CandidatePair {
            name_a: a.to_string(),
            name_b: b.to_string(),
            trigrams_a: grams,
            trigrams_b,
            similarity: 0.8,
        }
    }

    fn names(cluster: &Cluster) -> Vec<&str> {
        cluster.members.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_distinctive_pair_is_accepted_without_rescue() {
        let p = pair("Acme Holdings", "Zenith Partners", &SIGNAL[..6]);
        let decision = assess_pair(&p, &classification(), &ClusteringConfig::default());
        assert_eq!(
            decision,
            PairDecision::Accepted {
                key: ClusterKey(SIGNAL[..6].iter().map(|s| s.to_string()).collect()),
                rescued: false,
            }
        );
    }

    #[test]
    fn test_weak_dissimilar_pair_is_rejected() {
        let p = pair("Acme Homes", "Zenith Partners", &SIGNAL[..5]);
        match assess_pair(&p, &classification(), &ClusteringConfig::default()) {
            PairDecision::Rejected { score } => assert!(score < 90),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_mostly_common_pair_needs_rescue() {
        // 6 signal and 8 top-frequency trigrams shared: commonality 8/14
        let mut shared: Vec<&str> = SIGNAL[..6].to_vec();
        shared.extend(["c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8"]);
        let p = pair("Acme Homes", "Zenith Partners", &shared);
        let decision = assess_pair(&p, &classification(), &ClusteringConfig::default());
        assert!(matches!(decision, PairDecision::Accepted { rescued: false, .. }));

        let mut config = ClusteringConfig::default();
        config.max_commonality = 0.5;
        let decision = assess_pair(&p, &classification(), &config);
        assert!(matches!(decision, PairDecision::Rejected { .. }));
    }

    #[test]
    fn test_weak_but_similar_pair_is_rescued() {
        // word order only: scores 95
        let p = pair("Jane Doe", "Doe Jane", &SIGNAL[..2]);
        let decision = assess_pair(&p, &classification(), &ClusteringConfig::default());
        assert!(matches!(decision, PairDecision::Accepted { rescued: true, .. }));
    }

    #[test]
    fn test_rescue_threshold_is_configurable() {
        let p = pair("Jane Doe", "Doe Jane", &SIGNAL[..2]);
        let mut config = ClusteringConfig::default();
        config.rescue_score_threshold = 96;
        assert_eq!(
            assess_pair(&p, &classification(), &config),
            PairDecision::Rejected { score: 95 }
        );
    }

    #[test]
    fn test_fragments_strip_first_name_only() {
        let fragments = vec!["inc".to_string(), " co".to_string()];
        assert_eq!(strip_generic_fragments("acme co inc", &fragments), "acme ");
        assert_eq!(strip_generic_fragments("Acme Inc", &fragments), "Acme Inc");
    }

    #[test]
    fn test_generic_fragment_turns_rejection_into_rescue() {
        let mut config = ClusteringConfig::default();
        config.rescue_score_threshold = 95;
        config.generic_fragments = Vec::new();

        // "acme holdings" vs "acme": best partial window 100 * 0.9
        let p = pair("Acme Holdings", "Acme", &SIGNAL[..2]);
        assert_eq!(
            assess_pair(&p, &classification(), &config),
            PairDecision::Rejected { score: 90 }
        );

        config.generic_fragments = vec!["Holdings".to_string()];
        assert!(matches!(
            assess_pair(&p, &classification(), &config),
            PairDecision::Accepted { rescued: true, .. }
        ));

        // Only the first name is cleaned; the fragment on the second still counts
        let reversed = pair("Acme", "Acme Holdings", &SIGNAL[..2]);
        assert_eq!(
            assess_pair(&reversed, &classification(), &config),
            PairDecision::Rejected { score: 90 }
        );
    }

    #[test]
    fn test_identical_signatures_share_a_cluster() {
        let pairs = vec![
            pair("Acme Realty", "Acme Realty LLC", &SIGNAL[..6]),
            pair("Acme Rlty", "ACME Realty", &SIGNAL[..6]),
        ];
        let set = build_clusters(&pairs, &classification(), &ClusteringConfig::default());
        assert_eq!(set.clusters.len(), 1);
        assert_eq!(
            names(&set.clusters[0]),
            vec!["ACME Realty", "Acme Realty", "Acme Realty LLC", "Acme Rlty"]
        );
    }

    #[test]
    fn test_overlapping_signatures_merge_so_each_name_has_one_cluster() {
        let pairs = vec![
            pair("Acme Realty", "Acme Realty LLC", &SIGNAL[..6]),
            pair("Acme Realty", "Acme Realty Inc", &SIGNAL[1..7]),
            pair("Beta Homes", "Beta Homes Co", &SIGNAL[2..8]),
        ];
        let set = build_clusters(&pairs, &classification(), &ClusteringConfig::default());
        assert_eq!(set.buckets, 3);
        assert_eq!(set.clusters.len(), 2);

        let mut seen = HashSet::new();
        for cluster in &set.clusters {
            for member in &cluster.members {
                assert!(seen.insert(member.clone()), "{} is in two clusters", member);
            }
        }
        let acme = set
            .clusters
            .iter()
            .find(|c| c.members.contains("Acme Realty"))
            .unwrap();
        assert_eq!(acme.members.len(), 3);
        assert_eq!(acme.key.0, vec!["s2", "s3", "s4", "s5", "s6"]);
    }

    #[test]
    fn test_unsigned_rescued_pairs_share_the_empty_key_cluster() {
        let pairs = vec![
            pair("Jane Doe", "Doe Jane", &[]),
            pair("John Roe", "Roe John", &[]),
        ];
        let set = build_clusters(&pairs, &classification(), &ClusteringConfig::default());
        assert_eq!(set.pairs_rescued, 2);
        assert_eq!(set.buckets, 1);
        assert_eq!(set.clusters.len(), 1);
        assert!(set.clusters[0].key.is_empty());
        assert_eq!(
            names(&set.clusters[0]),
            vec!["Doe Jane", "Jane Doe", "John Roe", "Roe John"]
        );
    }

    #[test]
    fn test_cluster_keys_are_unique() {
        let pairs = vec![
            pair("Jane Doe", "Doe Jane", &[]),
            pair("Acme Realty", "Acme Realty LLC", &SIGNAL[..6]),
            pair("John Roe", "Roe John", &[]),
            pair("Acme Rlty", "ACME Realty", &SIGNAL[..6]),
        ];
        let set = build_clusters(&pairs, &classification(), &ClusteringConfig::default());
        let keys: HashSet<&ClusterKey> = set.clusters.iter().map(|c| &c.key).collect();
        assert_eq!(keys.len(), set.clusters.len());
        assert_eq!(set.clusters.len(), 2);
    }

    #[test]
    fn test_rejected_pairs_contribute_no_members() {
        let pairs = vec![
            pair("Acme Realty", "Acme Realty LLC", &SIGNAL[..6]),
            pair("Acme Homes", "Zenith Partners", &SIGNAL[..3]),
        ];
        let set = build_clusters(&pairs, &classification(), &ClusteringConfig::default());
        assert_eq!(set.pairs_rejected, 1);
        assert_eq!(set.member_count(), 2);
        assert!(!set.clusters[0].members.contains("Zenith Partners"));
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let pairs = vec![
            pair("Beta Homes", "Beta Homes Co", &SIGNAL[2..8]),
            pair("Acme Realty", "Acme Realty LLC", &SIGNAL[..6]),
            pair("Acme Realty", "Acme Realty Inc", &SIGNAL[1..7]),
        ];
        let first = build_clusters(&pairs, &classification(), &ClusteringConfig::default());
        let second = build_clusters(&pairs, &classification(), &ClusteringConfig::default());
        assert_eq!(first.clusters, second.clusters);
    }

    #[test]
    fn test_empty_batch_builds_nothing() {
        let set = build_clusters(&[], &classification(), &ClusteringConfig::default());
        assert!(set.clusters.is_empty());
        assert_eq!(set.buckets, 0);
    }
}
