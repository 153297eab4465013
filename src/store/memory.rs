// src/store/memory.rs

use anyhow::Result;
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::Mutex;

use crate::models::{
    Alias, AssociationEdge, CandidatePair, CoOccurrence, EntityKind, ImportanceRanking,
    OutputAssignment, StandardizationLink,
};
use crate::store::{CoOccurrenceSource, ImportanceSource, LinkageStore, SimilaritySource};
use crate::trigram;

/// In-process collaborators for runs without a database. Candidate pairs are
/// scored with the same trigram similarity the Postgres index uses.
#[derive(Debug, Default)]
pub struct MemoryStore {
    importance: HashMap<EntityKind, ImportanceRanking>,
    co_occurrences: Vec<CoOccurrence>,
    links: Mutex<HashMap<EntityKind, Vec<StandardizationLink>>>,
    aliases: Mutex<HashMap<EntityKind, Vec<Alias>>>,
    edges: Mutex<Vec<AssociationEdge>>,
    assignments: Mutex<Vec<OutputAssignment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds both importance rankings from the records themselves: each name
    /// counts the distinct records crediting it.
    pub fn from_co_occurrences(records: Vec<CoOccurrence>) -> Self {
        let mut brokers: HashMap<&str, HashSet<&str>> = HashMap::new();
        let mut brokerages: HashMap<&str, HashSet<&str>> = HashMap::new();
        for record in &records {
            brokers
                .entry(record.broker_name.as_str())
                .or_default()
                .insert(record.record_id.as_str());
            brokerages
                .entry(record.brokerage_name.as_str())
                .or_default()
                .insert(record.record_id.as_str());
        }
        let to_ranking = |credits: HashMap<&str, HashSet<&str>>| -> ImportanceRanking {
            credits
                .into_iter()
                .map(|(name, ids)| (name.to_string(), ids.len() as i64))
                .collect()
        };
        let broker_ranking = to_ranking(brokers);
        let brokerage_ranking = to_ranking(brokerages);

        Self::new()
            .with_importance(EntityKind::Broker, broker_ranking)
            .with_importance(EntityKind::Brokerage, brokerage_ranking)
            .with_co_occurrences(records)
    }

    pub fn with_importance(mut self, kind: EntityKind, ranking: ImportanceRanking) -> Self {
        self.importance.insert(kind, ranking);
        self
    }

    pub fn with_co_occurrences(mut self, records: Vec<CoOccurrence>) -> Self {
        self.co_occurrences = records;
        self
    }

    pub async fn aliases(&self, kind: EntityKind) -> Vec<Alias> {
        self.aliases.lock().await.get(&kind).cloned().unwrap_or_default()
    }

    pub async fn edges(&self) -> Vec<AssociationEdge> {
        self.edges.lock().await.clone()
    }

    pub async fn assignments(&self) -> Vec<OutputAssignment> {
        self.assignments.lock().await.clone()
    }

    fn ranking(&self, kind: EntityKind) -> Option<&ImportanceRanking> {
        self.importance.get(&kind)
    }
}

impl SimilaritySource for MemoryStore {
    async fn candidate_pairs(
        &self,
        kind: EntityKind,
        min_similarity: f32,
    ) -> Result<Vec<CandidatePair>> {
        let Some(ranking) = self.ranking(kind) else {
            return Ok(Vec::new());
        };
        let names: BTreeSet<&String> = ranking.keys().collect();
        let decomposed: Vec<(&String, Vec<String>)> = names
            .into_iter()
            .map(|name| (name, trigram::trigrams(name)))
            .collect();

        // Both orientations of every pair, like a self-join would return
        let mut pairs = Vec::new();
        for (name_a, trigrams_a) in &decomposed {
            for (name_b, trigrams_b) in &decomposed {
                if name_a == name_b {
                    continue;
                }
                let similarity = trigram::similarity_of(trigrams_a, trigrams_b);
                if similarity > min_similarity {
                    pairs.push(CandidatePair {
                        name_a: (*name_a).clone(),
                        name_b: (*name_b).clone(),
                        trigrams_a: trigrams_a.clone(),
                        trigrams_b: trigrams_b.clone(),
                        similarity,
                    });
                }
            }
        }
        debug!("Scored {} {} candidate pairs in memory", pairs.len(), kind);
        Ok(pairs)
    }
}

impl ImportanceSource for MemoryStore {
    async fn importance_ranking(&self, kind: EntityKind) -> Result<ImportanceRanking> {
        Ok(self.ranking(kind).cloned().unwrap_or_default())
    }

    async fn importance_of(&self, kind: EntityKind, names: &[String]) -> Result<ImportanceRanking> {
        let Some(ranking) = self.ranking(kind) else {
            return Ok(ImportanceRanking::new());
        };
        Ok(names
            .iter()
            .filter_map(|name| ranking.get(name).map(|count| (name.clone(), *count)))
            .collect())
    }
}

impl CoOccurrenceSource for MemoryStore {
    async fn co_occurrences(&self) -> Result<Vec<CoOccurrence>> {
        Ok(self.co_occurrences.clone())
    }
}

impl LinkageStore for MemoryStore {
    async fn reset_links(&self, kind: EntityKind) -> Result<()> {
        self.links.lock().await.insert(kind, Vec::new());
        Ok(())
    }

    async fn append_links(&self, kind: EntityKind, links: &[StandardizationLink]) -> Result<()> {
        self.links
            .lock()
            .await
            .entry(kind)
            .or_default()
            .extend_from_slice(links);
        Ok(())
    }

    async fn standardization_links(&self, kind: EntityKind) -> Result<Vec<StandardizationLink>> {
        Ok(self.links.lock().await.get(&kind).cloned().unwrap_or_default())
    }

    async fn replace_aliases(&self, kind: EntityKind, aliases: &[Alias]) -> Result<()> {
        self.aliases.lock().await.insert(kind, aliases.to_vec());
        Ok(())
    }

    async fn replace_edges(&self, edges: &[AssociationEdge]) -> Result<()> {
        *self.edges.lock().await = edges.to_vec();
        Ok(())
    }

    async fn replace_assignments(&self, assignments: &[OutputAssignment]) -> Result<()> {
        *self.assignments.lock().await = assignments.to_vec();
        Ok(())
    }
}
