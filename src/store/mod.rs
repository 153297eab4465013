// src/store/mod.rs
//
// Contracts with the collaborators the resolution core runs against. Every
// call is a plain request/response; a failure is fatal for the pass that made
// it, so nothing here retries.

use anyhow::Result;
use std::future::Future;

use crate::models::{
    Alias, AssociationEdge, CandidatePair, CoOccurrence, EntityKind, ImportanceRanking,
    OutputAssignment, StandardizationLink,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Trigram similarity index over the known names of each kind.
pub trait SimilaritySource {
    /// Pairs of distinct names with `similarity > min_similarity`, each side
    /// decomposed into trigrams, ordered by `(name_a, name_b)`.
    fn candidate_pairs(
        &self,
        kind: EntityKind,
        min_similarity: f32,
    ) -> impl Future<Output = Result<Vec<CandidatePair>>> + Send;
}

/// `name -> count` of distinct records crediting each name.
pub trait ImportanceSource {
    /// Every known name of `kind`.
    fn importance_ranking(
        &self,
        kind: EntityKind,
    ) -> impl Future<Output = Result<ImportanceRanking>> + Send;

    /// Only the given names; names without an entry are simply absent.
    fn importance_of(
        &self,
        kind: EntityKind,
        names: &[String],
    ) -> impl Future<Output = Result<ImportanceRanking>> + Send;
}

/// Records credited to both a broker and a brokerage.
pub trait CoOccurrenceSource {
    fn co_occurrences(&self) -> impl Future<Output = Result<Vec<CoOccurrence>>> + Send;
}

/// Destination tables. Every table is dropped and rebuilt per pass.
pub trait LinkageStore {
    /// Drop and recreate the standardization table of `kind`.
    fn reset_links(&self, kind: EntityKind) -> impl Future<Output = Result<()>> + Send;

    /// Append the links of one fully resolved cluster, atomically.
    fn append_links(
        &self,
        kind: EntityKind,
        links: &[StandardizationLink],
    ) -> impl Future<Output = Result<()>> + Send;

    fn standardization_links(
        &self,
        kind: EntityKind,
    ) -> impl Future<Output = Result<Vec<StandardizationLink>>> + Send;

    fn replace_aliases(
        &self,
        kind: EntityKind,
        aliases: &[Alias],
    ) -> impl Future<Output = Result<()>> + Send;

    fn replace_edges(&self, edges: &[AssociationEdge]) -> impl Future<Output = Result<()>> + Send;

    fn replace_assignments(
        &self,
        assignments: &[OutputAssignment],
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Everything a full pipeline run needs.
pub trait Store: SimilaritySource + ImportanceSource + CoOccurrenceSource + LinkageStore + Sync {}

impl<T> Store for T where
    T: SimilaritySource + ImportanceSource + CoOccurrenceSource + LinkageStore + Sync
{
}
