// src/standardize.rs
//
// Picks each cluster's standard name and writes the cluster's links.

use anyhow::{Context, Result};
use log::{debug, info};

use crate::error::ResolutionError;
use crate::models::{Cluster, EntityKind, ImportanceRanking, StandardizationLink};
use crate::store::LinkageStore;

/// The member credited on the most distinct records. Equal counts go to the
/// lexicographically smallest name.
///
/// Every member must have an importance entry; the first one missing aborts
/// the cluster.
pub fn select_standard(
    kind: EntityKind,
    cluster: &Cluster,
    ranking: &ImportanceRanking,
) -> Result<String, ResolutionError> {
    let mut best: Option<(&String, i64)> = None;
    // members iterate in ascending order, so a strict comparison keeps the smallest name on ties
    for member in &cluster.members {
        let count = *ranking
            .get(member)
            .ok_or_else(|| ResolutionError::MissingImportance {
                kind,
                name: member.clone(),
            })?;
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((member, count)),
        }
    }

    best.map(|(name, _)| name.clone())
        .ok_or_else(|| ResolutionError::EmptyCluster {
            kind,
            key: cluster.key.to_string(),
        })
}

/// One link per member, the standard included.
pub fn links_for_cluster(cluster: &Cluster, standard: &str) -> Vec<StandardizationLink> {
    cluster
        .members
        .iter()
        .map(|name| StandardizationLink {
            name: name.clone(),
            standard: standard.to_string(),
        })
        .collect()
}

/// Writes a pass's standardization table cluster by cluster.
pub struct LinkWriter<'a, S> {
    store: &'a S,
    kind: EntityKind,
    clusters_written: usize,
    links_written: usize,
}

impl<'a, S: LinkageStore> LinkWriter<'a, S> {
    pub fn new(store: &'a S, kind: EntityKind) -> Self {
        Self {
            store,
            kind,
            clusters_written: 0,
            links_written: 0,
        }
    }

    /// Drops whatever the previous run left in the table.
    pub async fn reset(&mut self) -> Result<()> {
        self.store
            .reset_links(self.kind)
            .await
            .with_context(|| format!("Failed to reset {}", self.kind.standardization_table()))?;
        self.clusters_written = 0;
        self.links_written = 0;
        Ok(())
    }

    /// Appends every link of one cluster in a single write.
    pub async fn write_cluster(&mut self, cluster: &Cluster, standard: &str) -> Result<usize> {
        let links = links_for_cluster(cluster, standard);
        self.store
            .append_links(self.kind, &links)
            .await
            .with_context(|| {
                format!(
                    "Failed to write {} cluster [{}] with standard '{}'",
                    self.kind, cluster.key, standard
                )
            })?;
        debug!(
            "Linked {} {} names to '{}'",
            links.len(),
            self.kind,
            standard
        );
        self.clusters_written += 1;
        self.links_written += links.len();
        Ok(links.len())
    }

    pub fn links_written(&self) -> usize {
        self.links_written
    }

    pub fn finish(self) -> usize {
        info!(
            "Wrote {} {} links across {} clusters to {}",
            self.links_written,
            self.kind,
            self.clusters_written,
            self.kind.standardization_table()
        );
        self.links_written
    }
}
