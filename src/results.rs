// src/results.rs

use chrono::NaiveDateTime;
use log::info;
use std::time::Duration;

use crate::models::EntityKind;

/// Statistics for one standardization pass
#[derive(Debug, Clone)]
pub struct PassStats {
    pub kind: EntityKind,
    pub candidate_pairs: usize,
    pub distinct_trigrams: usize,
    pub signal_trigrams: usize,
    /// Pairs kept under a signature, rescued ones included
    pub pairs_accepted: usize,
    pub pairs_rescued: usize,
    pub pairs_rejected: usize,
    pub clusters: usize,
    /// Size of the largest cluster in names
    pub largest_cluster: usize,
    pub links_written: usize,
    pub elapsed: Duration,
}

impl PassStats {
    pub fn empty(kind: EntityKind, elapsed: Duration) -> Self {
        Self {
            kind,
            candidate_pairs: 0,
            distinct_trigrams: 0,
            signal_trigrams: 0,
            pairs_accepted: 0,
            pairs_rescued: 0,
            pairs_rejected: 0,
            clusters: 0,
            largest_cluster: 0,
            links_written: 0,
            elapsed,
        }
    }
}

/// Statistics for alias resolution and best-match selection
#[derive(Debug, Clone, Default)]
pub struct LinkageStats {
    pub broker_aliases: usize,
    pub brokerage_aliases: usize,
    pub co_occurrences: usize,
    pub edges: usize,
    pub assignments: usize,
    /// Brokers whose best brokerage is tied
    pub ambiguous_assignments: usize,
    pub elapsed: Duration,
}

/// Complete pipeline run statistics
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub passes: Vec<PassStats>,
    pub linkage: LinkageStats,
    pub total_processing_time: f64,
}

impl PipelineStats {
    pub fn pass(&self, kind: EntityKind) -> Option<&PassStats> {
        self.passes.iter().find(|p| p.kind == kind)
    }

    pub fn log_summary(&self) {
        info!("=== Run {} ({}) ===", self.run_id, self.run_timestamp);
        for pass in &self.passes {
            info!(
                "{}: {} pairs, {} rejected, {} rescued, {} clusters (largest {}), {} links in {:.2?}",
                pass.kind,
                pass.candidate_pairs,
                pass.pairs_rejected,
                pass.pairs_rescued,
                pass.clusters,
                pass.largest_cluster,
                pass.links_written,
                pass.elapsed
            );
        }
        info!(
            "Linkage: {} broker aliases, {} brokerage aliases, {} records, {} edges, {} brokers assigned ({} tied) in {:.2?}",
            self.linkage.broker_aliases,
            self.linkage.brokerage_aliases,
            self.linkage.co_occurrences,
            self.linkage.edges,
            self.linkage.assignments,
            self.linkage.ambiguous_assignments,
            self.linkage.elapsed
        );
        info!("Total processing time: {:.2}s", self.total_processing_time);
    }
}
