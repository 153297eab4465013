// src/linkage/best_match.rs

use log::{debug, info};
use std::collections::BTreeSet;

use crate::linkage::association::AssociationGraph;
use crate::models::OutputAssignment;

/// For every broker standard, the brokerage standards sharing the heaviest
/// edge. Ties are all kept; the result is ordered by broker standard.
pub fn select_best_matches(graph: &AssociationGraph) -> Vec<OutputAssignment> {
    let mut assignments = Vec::with_capacity(graph.broker_count());
    for broker in graph.broker_standards() {
        let neighbors = graph.neighbors(broker);
        let Some(max_weight) = neighbors.iter().map(|(_, weight)| *weight).max() else {
            continue;
        };
        let best: BTreeSet<String> = neighbors
            .iter()
            .filter(|(_, weight)| *weight == max_weight)
            .map(|(brokerage, _)| brokerage.to_string())
            .collect();
        if best.len() > 1 {
            debug!(
                "Broker '{}' is tied between {} brokerages at weight {}",
                broker,
                best.len(),
                max_weight
            );
        }
        assignments.push(OutputAssignment {
            broker_standard: broker.to_string(),
            best_brokerage_standards: best,
        });
    }

    let ambiguous = assignments.iter().filter(|a| a.is_ambiguous()).count();
    info!(
        "Selected best brokerages for {} brokers ({} tied)",
        assignments.len(),
        ambiguous
    );
    assignments
}
