// src/store/postgres.rs

use anyhow::{Context, Result};
use log::{debug, info};
use std::time::Instant;
use tokio_postgres::Row;

use crate::db::PgPool;
use crate::models::{
    Alias, AssociationEdge, CandidatePair, CoOccurrence, EntityKind, ImportanceRanking,
    OutputAssignment, StandardizationLink,
};
use crate::store::{CoOccurrenceSource, ImportanceSource, LinkageStore, SimilaritySource};

const IMPORTANCE_BATCH_SIZE: usize = 1000;

/// Postgres-backed collaborators. Similarity comes from `pg_trgm`; every
/// write table is dropped and recreated on each run.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn recreate_table(&self, table: &str, columns: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for table reset")?;
        conn.batch_execute(&format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({columns});"
        ))
        .await
        .with_context(|| format!("Failed to recreate {}", table))?;
        debug!("Recreated table {}", table);
        Ok(())
    }
}

fn trigram_list(raw: Vec<String>) -> Vec<String> {
    let mut trigrams = raw;
    trigrams.sort();
    trigrams
}

fn candidate_pair_from_row(row: &Row) -> Result<CandidatePair> {
    Ok(CandidatePair {
        name_a: row.try_get("name_1").context("Failed to read name_1")?,
        name_b: row.try_get("name_2").context("Failed to read name_2")?,
        trigrams_a: trigram_list(row.try_get("trigrams_1").context("Failed to read trigrams_1")?),
        trigrams_b: trigram_list(row.try_get("trigrams_2").context("Failed to read trigrams_2")?),
        similarity: row.try_get("similarity").context("Failed to read similarity")?,
    })
}

fn importance_from_rows(rows: &[Row]) -> Result<ImportanceRanking> {
    let mut ranking = ImportanceRanking::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("name").context("Failed to read importance name")?;
        let count: i64 = row.try_get("count").context("Failed to read importance count")?;
        ranking.insert(name, count);
    }
    Ok(ranking)
}

impl SimilaritySource for PgStore {
    async fn candidate_pairs(
        &self,
        kind: EntityKind,
        min_similarity: f32,
    ) -> Result<Vec<CandidatePair>> {
        let start_time = Instant::now();
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for candidate pairs")?;

        // Quotes and "$ " are stripped before decomposition, matching how the
        // similarity table was scored.
        let query = format!(
            "SELECT
                name_1,
                show_trgm(replace(replace(name_1, '\"', ''), '$ ', '')) AS trigrams_1,
                name_2,
                show_trgm(replace(replace(name_2, '\"', ''), '$ ', '')) AS trigrams_2,
                similarity
            FROM {}
            WHERE similarity > $1
            ORDER BY name_1, name_2",
            kind.similarity_table()
        );
        let rows = conn
            .query(query.as_str(), &[&min_similarity])
            .await
            .with_context(|| format!("Failed to query {}", kind.similarity_table()))?;

        let pairs = rows
            .iter()
            .map(candidate_pair_from_row)
            .collect::<Result<Vec<_>>>()?;
        info!(
            "Fetched {} {} candidate pairs above {} in {:.2?}",
            pairs.len(),
            kind,
            min_similarity,
            start_time.elapsed()
        );
        Ok(pairs)
    }
}

impl ImportanceSource for PgStore {
    async fn importance_ranking(&self, kind: EntityKind) -> Result<ImportanceRanking> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for importance ranking")?;
        let query = format!("SELECT name, count FROM {}", kind.importance_table());
        let rows = conn
            .query(query.as_str(), &[])
            .await
            .with_context(|| format!("Failed to query {}", kind.importance_table()))?;
        importance_from_rows(&rows)
    }

    async fn importance_of(&self, kind: EntityKind, names: &[String]) -> Result<ImportanceRanking> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for importance lookup")?;
        let query = format!(
            "SELECT name, count FROM {} WHERE name = ANY($1)",
            kind.importance_table()
        );
        let stmt = conn
            .prepare(query.as_str())
            .await
            .context("Failed to prepare importance lookup")?;

        let mut ranking = ImportanceRanking::with_capacity(names.len());
        for chunk in names.chunks(IMPORTANCE_BATCH_SIZE) {
            let rows = conn
                .query(&stmt, &[&chunk])
                .await
                .with_context(|| format!("Failed to query {}", kind.importance_table()))?;
            ranking.extend(importance_from_rows(&rows)?);
        }
        debug!(
            "Found importance for {} of {} {} names",
            ranking.len(),
            names.len(),
            kind
        );
        Ok(ranking)
    }
}

impl CoOccurrenceSource for PgStore {
    async fn co_occurrences(&self) -> Result<Vec<CoOccurrence>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for co-occurrences")?;
        let rows = conn
            .query(
                "SELECT DISTINCT
                    cb.comp_id::text AS record_id,
                    nb.name AS broker_name,
                    g.name AS brokerage_name
                FROM comp_broker_link cb
                JOIN named_brokers nb ON nb.realty_broker_id = cb.realty_broker_id
                JOIN comp_brokerage_link cg ON cg.comp_id = cb.comp_id
                JOIN brokerages g ON g.id = cg.realty_company_id
                WHERE nb.name IS NOT NULL AND g.name IS NOT NULL",
                &[],
            )
            .await
            .context("Failed to query broker/brokerage co-occurrences")?;

        let records = rows
            .iter()
            .map(|row| {
                Ok(CoOccurrence {
                    record_id: row.try_get("record_id").context("Failed to read record_id")?,
                    broker_name: row.try_get("broker_name").context("Failed to read broker_name")?,
                    brokerage_name: row
                        .try_get("brokerage_name")
                        .context("Failed to read brokerage_name")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        info!("Fetched {} co-occurrence records", records.len());
        Ok(records)
    }
}

impl LinkageStore for PgStore {
    async fn reset_links(&self, kind: EntityKind) -> Result<()> {
        self.recreate_table(kind.standardization_table(), "name text, standard text")
            .await
    }

    async fn append_links(&self, kind: EntityKind, links: &[StandardizationLink]) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for link insert")?;
        let transaction = conn
            .transaction()
            .await
            .context("Failed to start link transaction")?;
        let names: Vec<&str> = links.iter().map(|l| l.name.as_str()).collect();
        let standards: Vec<&str> = links.iter().map(|l| l.standard.as_str()).collect();
        transaction
            .execute(
                format!(
                    "INSERT INTO {} (name, standard) SELECT * FROM unnest($1::text[], $2::text[])",
                    kind.standardization_table()
                )
                .as_str(),
                &[&names, &standards],
            )
            .await
            .with_context(|| format!("Failed to insert into {}", kind.standardization_table()))?;
        transaction
            .commit()
            .await
            .context("Failed to commit link transaction")?;
        Ok(())
    }

    async fn standardization_links(&self, kind: EntityKind) -> Result<Vec<StandardizationLink>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for link read")?;
        let query = format!(
            "SELECT name, standard FROM {}",
            kind.standardization_table()
        );
        let rows = conn
            .query(query.as_str(), &[])
            .await
            .with_context(|| format!("Failed to query {}", kind.standardization_table()))?;
        rows.iter()
            .map(|row| {
                Ok(StandardizationLink {
                    name: row.try_get("name").context("Failed to read link name")?,
                    standard: row.try_get("standard").context("Failed to read link standard")?,
                })
            })
            .collect()
    }

    async fn replace_aliases(&self, kind: EntityKind, aliases: &[Alias]) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for alias write")?;
        let transaction = conn
            .transaction()
            .await
            .context("Failed to start alias transaction")?;
        let table = kind.alias_table();
        transaction
            .batch_execute(&format!(
                "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} (name text, standard text);"
            ))
            .await
            .with_context(|| format!("Failed to recreate {}", table))?;
        let names: Vec<&str> = aliases.iter().map(|a| a.name.as_str()).collect();
        let standards: Vec<&str> = aliases.iter().map(|a| a.standard.as_str()).collect();
        transaction
            .execute(
                format!("INSERT INTO {table} (name, standard) SELECT * FROM unnest($1::text[], $2::text[])")
                    .as_str(),
                &[&names, &standards],
            )
            .await
            .with_context(|| format!("Failed to insert into {}", table))?;
        transaction
            .commit()
            .await
            .context("Failed to commit alias transaction")?;
        info!("Wrote {} rows to {}", aliases.len(), table);
        Ok(())
    }

    async fn replace_edges(&self, edges: &[AssociationEdge]) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for edge write")?;
        let transaction = conn
            .transaction()
            .await
            .context("Failed to start edge transaction")?;
        transaction
            .batch_execute(
                "DROP TABLE IF EXISTS weighted_cluster_map;
                CREATE TABLE weighted_cluster_map (broker_name text, brokerage_name text, cnt bigint);",
            )
            .await
            .context("Failed to recreate weighted_cluster_map")?;
        let brokers: Vec<&str> = edges.iter().map(|e| e.broker_standard.as_str()).collect();
        let brokerages: Vec<&str> = edges.iter().map(|e| e.brokerage_standard.as_str()).collect();
        let weights: Vec<i64> = edges.iter().map(|e| i64::from(e.weight)).collect();
        transaction
            .execute(
                "INSERT INTO weighted_cluster_map (broker_name, brokerage_name, cnt)
                SELECT * FROM unnest($1::text[], $2::text[], $3::bigint[])",
                &[&brokers, &brokerages, &weights],
            )
            .await
            .context("Failed to insert into weighted_cluster_map")?;
        transaction
            .commit()
            .await
            .context("Failed to commit edge transaction")?;
        info!("Wrote {} rows to weighted_cluster_map", edges.len());
        Ok(())
    }

    async fn replace_assignments(&self, assignments: &[OutputAssignment]) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for output write")?;
        let transaction = conn
            .transaction()
            .await
            .context("Failed to start output transaction")?;
        transaction
            .batch_execute(
                "DROP TABLE IF EXISTS output;
                CREATE TABLE output (broker_name text, distinct_top_brokerages text[]);",
            )
            .await
            .context("Failed to recreate output")?;
        let stmt = transaction
            .prepare("INSERT INTO output (broker_name, distinct_top_brokerages) VALUES ($1, $2)")
            .await
            .context("Failed to prepare output insert")?;
        for assignment in assignments {
            let best: Vec<&str> = assignment
                .best_brokerage_standards
                .iter()
                .map(String::as_str)
                .collect();
            transaction
                .execute(&stmt, &[&assignment.broker_standard, &best])
                .await
                .with_context(|| {
                    format!("Failed to insert output row for '{}'", assignment.broker_standard)
                })?;
        }
        transaction
            .commit()
            .await
            .context("Failed to commit output transaction")?;
        info!("Wrote {} rows to output", assignments.len());
        Ok(())
    }
}
