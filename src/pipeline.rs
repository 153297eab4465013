// src/pipeline.rs

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::try_join;
use log::{info, warn};
use std::time::Instant;
use uuid::Uuid;

use crate::config::ClusteringConfig;
use crate::linkage::{aggregate_associations, resolve_aliases, select_best_matches, AliasTable};
use crate::matching::{analyze_signatures, build_clusters};
use crate::models::{Cluster, EntityKind};
use crate::results::{LinkageStats, PassStats, PipelineStats};
use crate::standardize::{select_standard, LinkWriter};
use crate::store::{CoOccurrenceSource, ImportanceSource, LinkageStore, SimilaritySource, Store};

/// Clusters the names of one kind and rewrites its standardization table.
///
/// Every cluster's standard is resolved before the table is touched, so a
/// missing importance entry leaves the previous table in place.
pub async fn run_standardization_pass<S>(
    store: &S,
    kind: EntityKind,
    config: &ClusteringConfig,
) -> Result<PassStats>
where
    S: SimilaritySource + ImportanceSource + LinkageStore,
{
    let start_time = Instant::now();
    info!("Standardizing {} names...", kind);

    let pairs = store
        .candidate_pairs(kind, config.min_similarity)
        .await
        .with_context(|| format!("Failed to fetch {} candidate pairs", kind))?;

    let mut writer = LinkWriter::new(store, kind);
    if pairs.is_empty() {
        info!(
            "No {} pairs above similarity {}; {} left empty",
            kind,
            config.min_similarity,
            kind.standardization_table()
        );
        writer.reset().await?;
        writer.finish();
        return Ok(PassStats::empty(kind, start_time.elapsed()));
    }

    let classification = analyze_signatures(&pairs, config);
    let cluster_set = build_clusters(&pairs, &classification, config);

    let members: Vec<String> = cluster_set
        .clusters
        .iter()
        .flat_map(|c| c.members.iter().cloned())
        .collect();
    let ranking = store
        .importance_of(kind, &members)
        .await
        .with_context(|| format!("Failed to fetch {} importance", kind))?;

    let resolved: Vec<(&Cluster, String)> = cluster_set
        .clusters
        .iter()
        .map(|cluster| select_standard(kind, cluster, &ranking).map(|standard| (cluster, standard)))
        .collect::<Result<_, _>>()
        .with_context(|| format!("Failed to select {} standards", kind))?;

    writer.reset().await?;
    for (cluster, standard) in &resolved {
        writer.write_cluster(cluster, standard).await?;
    }
    let links_written = writer.finish();

    let stats = PassStats {
        kind,
        candidate_pairs: pairs.len(),
        distinct_trigrams: classification.distinct_trigrams(),
        signal_trigrams: classification.signal_count(),
        pairs_accepted: cluster_set.pairs_accepted,
        pairs_rescued: cluster_set.pairs_rescued,
        pairs_rejected: cluster_set.pairs_rejected,
        clusters: cluster_set.clusters.len(),
        largest_cluster: cluster_set
            .clusters
            .iter()
            .map(|c| c.members.len())
            .max()
            .unwrap_or(0),
        links_written,
        elapsed: start_time.elapsed(),
    };
    info!(
        "{} standardization complete: {} clusters, {} links in {:.2?}",
        kind, stats.clusters, stats.links_written, stats.elapsed
    );
    Ok(stats)
}

async fn resolve_and_store_aliases<S>(store: &S, kind: EntityKind) -> Result<AliasTable>
where
    S: ImportanceSource + LinkageStore,
{
    let ranking = store
        .importance_ranking(kind)
        .await
        .with_context(|| format!("Failed to fetch {} importance ranking", kind))?;
    let links = store
        .standardization_links(kind)
        .await
        .with_context(|| format!("Failed to read {}", kind.standardization_table()))?;
    let table = resolve_aliases(kind, &ranking, &links)
        .with_context(|| format!("Failed to resolve {} aliases", kind))?;
    store
        .replace_aliases(kind, &table.to_rows())
        .await
        .with_context(|| format!("Failed to write {}", kind.alias_table()))?;
    Ok(table)
}

/// Maps every name to its best name, weights broker/brokerage standard pairs
/// by shared records, and writes each broker's heaviest brokerages.
///
/// Reads both standardization tables, so it must run after both passes.
pub async fn run_linkage<S>(store: &S) -> Result<LinkageStats>
where
    S: ImportanceSource + CoOccurrenceSource + LinkageStore,
{
    let start_time = Instant::now();
    info!("Linking brokers to brokerages...");

    let broker_aliases = resolve_and_store_aliases(store, EntityKind::Broker).await?;
    let brokerage_aliases = resolve_and_store_aliases(store, EntityKind::Brokerage).await?;

    let records = store
        .co_occurrences()
        .await
        .context("Failed to fetch co-occurrence records")?;
    if records.is_empty() {
        warn!("No broker/brokerage co-occurrences; output will be empty");
    }

    let graph = aggregate_associations(&broker_aliases, &brokerage_aliases, &records)
        .context("Failed to aggregate broker/brokerage associations")?;
    let edges = graph.edges();
    store
        .replace_edges(&edges)
        .await
        .context("Failed to write weighted_cluster_map")?;

    let assignments = select_best_matches(&graph);
    store
        .replace_assignments(&assignments)
        .await
        .context("Failed to write output")?;

    let stats = LinkageStats {
        broker_aliases: broker_aliases.len(),
        brokerage_aliases: brokerage_aliases.len(),
        co_occurrences: records.len(),
        edges: edges.len(),
        assignments: assignments.len(),
        ambiguous_assignments: assignments.iter().filter(|a| a.is_ambiguous()).count(),
        elapsed: start_time.elapsed(),
    };
    info!(
        "Linkage complete: {} brokers assigned in {:.2?}",
        stats.assignments, stats.elapsed
    );
    Ok(stats)
}

/// Both standardization passes side by side, then linkage.
pub async fn run_pipeline<S: Store>(store: &S, config: &ClusteringConfig) -> Result<PipelineStats> {
    let start_time = Instant::now();
    let run_id = Uuid::new_v4().to_string();
    let run_timestamp = Utc::now().naive_utc();
    info!("Pipeline run {} started", run_id);

    info!("Phase 1: Name standardization");
    let (broker_pass, brokerage_pass) = try_join(
        run_standardization_pass(store, EntityKind::Broker, config),
        run_standardization_pass(store, EntityKind::Brokerage, config),
    )
    .await?;
    info!("Phase 1 complete in {:.2?}", start_time.elapsed());

    info!("Phase 2: Alias resolution and best-match linkage");
    let linkage = run_linkage(store).await?;

    Ok(PipelineStats {
        run_id,
        run_timestamp,
        passes: vec![broker_pass, brokerage_pass],
        linkage,
        total_processing_time: start_time.elapsed().as_secs_f64(),
    })
}
