// src/linkage/association.rs

use log::{debug, info};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::ResolutionError;
use crate::linkage::aliases::AliasTable;
use crate::models::{AssociationEdge, CoOccurrence, EntityKind};

/// Weighted bipartite graph between broker standards and brokerage standards.
///
/// Edges point from a broker node to a brokerage node. Broker and brokerage
/// nodes live in separate maps, so a broker and a firm sharing a name stay
/// distinct.
#[derive(Debug, Default)]
pub struct AssociationGraph {
    graph: DiGraph<String, u32>,
    brokers: BTreeMap<String, NodeIndex>,
    brokerages: HashMap<String, NodeIndex>,
}

impl AssociationGraph {
    pub fn broker_count(&self) -> usize {
        self.brokers.len()
    }

    pub fn brokerage_count(&self) -> usize {
        self.brokerages.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Broker standards in ascending order.
    pub fn broker_standards(&self) -> impl Iterator<Item = &str> {
        self.brokers.keys().map(String::as_str)
    }

    /// `(brokerage standard, weight)` for every edge leaving `broker_standard`.
    pub fn neighbors(&self, broker_standard: &str) -> Vec<(&str, u32)> {
        match self.brokers.get(broker_standard) {
            Some(&node) => self
                .graph
                .edges(node)
                .map(|edge| (self.graph[edge.target()].as_str(), *edge.weight()))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn weight(&self, broker_standard: &str, brokerage_standard: &str) -> Option<u32> {
        let from = *self.brokers.get(broker_standard)?;
        let to = *self.brokerages.get(brokerage_standard)?;
        self.graph
            .find_edge(from, to)
            .map(|edge| self.graph[edge])
    }

    /// All edges sorted by broker, then brokerage.
    pub fn edges(&self) -> Vec<AssociationEdge> {
        let mut edges: Vec<AssociationEdge> = self
            .graph
            .edge_references()
            .map(|edge| AssociationEdge {
                broker_standard: self.graph[edge.source()].clone(),
                brokerage_standard: self.graph[edge.target()].clone(),
                weight: *edge.weight(),
            })
            .collect();
        edges.sort();
        edges
    }
}

fn resolve<'t>(table: &'t AliasTable, name: &str, record_id: &str) -> Result<&'t str, ResolutionError> {
    table.resolve(name).ok_or_else(|| ResolutionError::UnknownName {
        kind: table.kind(),
        name: name.to_string(),
        record_id: record_id.to_string(),
    })
}

/// Builds the graph from co-occurrence records, mapping both sides through
/// their alias tables.
///
/// A record crediting the same standard pair several times (duplicate rows, or
/// two names of one cluster) counts once.
pub fn aggregate_associations(
    broker_aliases: &AliasTable,
    brokerage_aliases: &AliasTable,
    records: &[CoOccurrence],
) -> Result<AssociationGraph, ResolutionError> {
    debug_assert_eq!(broker_aliases.kind(), EntityKind::Broker);
    debug_assert_eq!(brokerage_aliases.kind(), EntityKind::Brokerage);

    let mut credited: BTreeSet<(&str, &str, &str)> = BTreeSet::new();
    for record in records {
        let broker = resolve(broker_aliases, &record.broker_name, &record.record_id)?;
        let brokerage = resolve(brokerage_aliases, &record.brokerage_name, &record.record_id)?;
        credited.insert((broker, brokerage, record.record_id.as_str()));
    }

    let mut weights: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for (broker, brokerage, _) in &credited {
        *weights.entry((*broker, *brokerage)).or_insert(0) += 1;
    }

    let mut association = AssociationGraph::default();
    for ((broker, brokerage), weight) in weights {
        let from = match association.brokers.get(broker) {
            Some(&node) => node,
            None => {
                let node = association.graph.add_node(broker.to_string());
                association.brokers.insert(broker.to_string(), node);
                node
            }
        };
        let to = match association.brokerages.get(brokerage) {
            Some(&node) => node,
            None => {
                let node = association.graph.add_node(brokerage.to_string());
                association.brokerages.insert(brokerage.to_string(), node);
                node
            }
        };
        association.graph.add_edge(from, to, weight);
    }

    debug!(
        "{} co-occurrence rows collapsed to {} distinct credits",
        records.len(),
        credited.len()
    );
    info!(
        "Association graph: {} broker standards, {} brokerage standards, {} weighted edges",
        association.broker_count(),
        association.brokerage_count(),
        association.edge_count()
    );
    Ok(association)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linkage::aliases::resolve_aliases;
    use crate::models::{ImportanceRanking, StandardizationLink};

    fn table(kind: EntityKind, names: &[&str], links: &[(&str, &str)]) -> AliasTable {
        let ranking: ImportanceRanking = names.iter().map(|n| (n.to_string(), 1)).collect();
        let links: Vec<StandardizationLink> = links
            .iter()
            .map(|(n, s)| StandardizationLink {
                name: n.to_string(),
                standard: s.to_string(),
            })
            .collect();
        resolve_aliases(kind, &ranking, &links).unwrap()
    }

    fn record(id: &str, broker: &str, brokerage: &str) -> CoOccurrence {
        CoOccurrence {
            record_id: id.to_string(),
            broker_name: broker.to_string(),
            brokerage_name: brokerage.to_string(),
        }
    }

    #[test]
    fn test_weights_count_distinct_records_per_standard_pair() {
        let brokers = table(EntityKind::Broker, &["Jane Doe", "Doe Jane"], &[("Doe Jane", "Jane Doe"), ("Jane Doe", "Jane Doe")]);
        let brokerages = table(EntityKind::Brokerage, &["Acme Realty", "Beta Homes"], &[]);
        let records = vec![
            record("r1", "Jane Doe", "Acme Realty"),
            record("r1", "Doe Jane", "Acme Realty"), // same record, same standard pair
            record("r1", "Jane Doe", "Acme Realty"), // duplicate row
            record("r2", "Doe Jane", "Acme Realty"),
            record("r3", "Jane Doe", "Beta Homes"),
        ];
        let graph = aggregate_associations(&brokers, &brokerages, &records).unwrap();

        assert_eq!(graph.weight("Jane Doe", "Acme Realty"), Some(2));
        assert_eq!(graph.weight("Jane Doe", "Beta Homes"), Some(1));
        assert_eq!(graph.weight("Doe Jane", "Acme Realty"), None);
        assert_eq!(graph.broker_count(), 1);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_edges_are_sorted() {
        let brokers = table(EntityKind::Broker, &["b2", "b1"], &[]);
        let brokerages = table(EntityKind::Brokerage, &["g2", "g1"], &[]);
        let records = vec![
            record("1", "b2", "g1"),
            record("2", "b1", "g2"),
            record("3", "b1", "g1"),
        ];
        let graph = aggregate_associations(&brokers, &brokerages, &records).unwrap();
        let pairs: Vec<(String, String)> = graph
            .edges()
            .into_iter()
            .map(|e| (e.broker_standard, e.brokerage_standard))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("b1".to_string(), "g1".to_string()),
                ("b1".to_string(), "g2".to_string()),
                ("b2".to_string(), "g1".to_string()),
            ]
        );
    }

    #[test]
    fn test_shared_name_across_kinds_stays_separate() {
        let brokers = table(EntityKind::Broker, &["Jane Doe"], &[]);
        let brokerages = table(EntityKind::Brokerage, &["Jane Doe"], &[]);
        let graph = aggregate_associations(&brokers, &brokerages, &[record("1", "Jane Doe", "Jane Doe")]).unwrap();
        assert_eq!(graph.broker_count(), 1);
        assert_eq!(graph.brokerage_count(), 1);
        assert_eq!(graph.weight("Jane Doe", "Jane Doe"), Some(1));
    }

    #[test]
    fn test_unknown_name_is_a_data_error() {
        let brokers = table(EntityKind::Broker, &["Jane Doe"], &[]);
        let brokerages = table(EntityKind::Brokerage, &["Acme Realty"], &[]);
        let err = aggregate_associations(&brokers, &brokerages, &[record("r9", "Jane Doe", "Ghost LLC")]).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::UnknownName {
                kind: EntityKind::Brokerage,
                name: "Ghost LLC".to_string(),
                record_id: "r9".to_string(),
            }
        );
    }

    #[test]
    fn test_no_records_no_graph() {
        let brokers = table(EntityKind::Broker, &["Jane Doe"], &[]);
        let brokerages = table(EntityKind::Brokerage, &["Acme Realty"], &[]);
        let graph = aggregate_associations(&brokers, &brokerages, &[]).unwrap();
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.edges().is_empty());
    }
}
