// src/models.rs

use std::collections::{BTreeSet, HashMap};
use std::fmt;

//------------------------------------------------------------------------------
// ENTITY KINDS
//------------------------------------------------------------------------------

/// The two clustered entity types. Each kind owns a disjoint set of tables,
/// so passes over different kinds never touch the same rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Individual agents named on transaction records
    Broker,
    /// Firms the agents work for
    Brokerage,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Broker, EntityKind::Brokerage];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Broker => "broker",
            EntityKind::Brokerage => "brokerage",
        }
    }

    /// Table holding `name -> count` of distinct records crediting the name.
    pub fn importance_table(&self) -> &'static str {
        match self {
            EntityKind::Broker => "broker_importance",
            EntityKind::Brokerage => "company_importance",
        }
    }

    /// Table of trigram-similar name pairs produced by the similarity index.
    pub fn similarity_table(&self) -> &'static str {
        match self {
            EntityKind::Broker => "similar_brokers",
            EntityKind::Brokerage => "similar_companies",
        }
    }

    /// Table of `name -> standard` links written by a clustering pass.
    pub fn standardization_table(&self) -> &'static str {
        match self {
            EntityKind::Broker => "broker_standardization",
            EntityKind::Brokerage => "company_standardization",
        }
    }

    /// Table of the total `name -> best name` mapping.
    pub fn alias_table(&self) -> &'static str {
        match self {
            EntityKind::Broker => "broker_aliases",
            EntityKind::Brokerage => "brokerage_aliases",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//------------------------------------------------------------------------------
// CLUSTERING INPUTS AND OUTPUTS
//------------------------------------------------------------------------------

/// A pair of distinct names the similarity index judged close, together with
/// each side's trigram decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePair {
    pub name_a: String,
    pub name_b: String,
    pub trigrams_a: Vec<String>,
    pub trigrams_b: Vec<String>,
    /// Index similarity in (0, 1]
    pub similarity: f32,
}

/// Sorted, deduplicated signal trigrams shared by the pairs of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey(pub Vec<String>);

impl ClusterKey {
    pub fn from_trigrams<'a>(trigrams: impl IntoIterator<Item = &'a str>) -> Self {
        let set: BTreeSet<&str> = trigrams.into_iter().collect();
        ClusterKey(set.into_iter().map(str::to_string).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Trigrams present in both keys, still sorted.
    pub fn intersection(&self, other: &ClusterKey) -> ClusterKey {
        ClusterKey(
            self.0
                .iter()
                .filter(|t| other.0.binary_search(t).is_ok())
                .cloned()
                .collect(),
        )
    }
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// A set of names judged to denote the same real-world entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub key: ClusterKey,
    pub members: BTreeSet<String>,
}

/// One `name -> standard` row. `standard` is always a member of the cluster
/// that produced the row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StandardizationLink {
    pub name: String,
    pub standard: String,
}

/// `name -> count` of distinct records crediting each name.
pub type ImportanceRanking = HashMap<String, i64>;

//------------------------------------------------------------------------------
// LINKAGE
//------------------------------------------------------------------------------

/// Best name for a known name: its cluster standard, or itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Alias {
    pub name: String,
    pub standard: String,
}

/// A transaction record credited to both a broker and a brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoOccurrence {
    pub record_id: String,
    pub broker_name: String,
    pub brokerage_name: String,
}

/// Weighted edge of the broker/brokerage bipartite graph. `weight` counts the
/// distinct records crediting the pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssociationEdge {
    pub broker_standard: String,
    pub brokerage_standard: String,
    pub weight: u32,
}

/// Brokerage standards tied for the heaviest edge under one broker standard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAssignment {
    pub broker_standard: String,
    pub best_brokerage_standards: BTreeSet<String>,
}

impl OutputAssignment {
    /// More than one brokerage shares the maximum weight.
    pub fn is_ambiguous(&self) -> bool {
        self.best_brokerage_standards.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_key_sorts_and_dedupes() {
        let key = ClusterKey::from_trigrams(["smi", "abc", "smi", " sm"]);
        assert_eq!(key.0, vec![" sm", "abc", "smi"]);
        assert_eq!(key.to_string(), " sm,abc,smi");
    }

    #[test]
    fn test_cluster_key_intersection() {
        let a = ClusterKey(vec!["abc".into(), "bcd".into(), "cde".into()]);
        let b = ClusterKey(vec!["bcd".into(), "cde".into(), "def".into()]);
        assert_eq!(a.intersection(&b).0, vec!["bcd", "cde"]);
    }

    #[test]
    fn test_entity_kind_tables_are_disjoint() {
        let broker = EntityKind::Broker;
        let brokerage = EntityKind::Brokerage;
        assert_ne!(broker.standardization_table(), brokerage.standardization_table());
        assert_ne!(broker.similarity_table(), brokerage.similarity_table());
        assert_ne!(broker.alias_table(), brokerage.alias_table());
    }
}
