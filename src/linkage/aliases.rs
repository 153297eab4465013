// src/linkage/aliases.rs

use log::{debug, info};
use std::collections::HashMap;

use crate::error::ResolutionError;
use crate::models::{Alias, EntityKind, ImportanceRanking, StandardizationLink};

/// Total `name -> best name` mapping for one entity kind.
#[derive(Debug, Clone)]
pub struct AliasTable {
    kind: EntityKind,
    standards: HashMap<String, String>,
    clustered: usize,
}

impl AliasTable {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Best name for a known name; `None` only for names outside the ranking.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.standards.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.standards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standards.is_empty()
    }

    /// Names that came from a cluster rather than mapping to themselves.
    pub fn clustered(&self) -> usize {
        self.clustered
    }

    /// Rows sorted by name.
    pub fn to_rows(&self) -> Vec<Alias> {
        let mut rows: Vec<Alias> = self
            .standards
            .iter()
            .map(|(name, standard)| Alias {
                name: name.clone(),
                standard: standard.clone(),
            })
            .collect();
        rows.sort();
        rows
    }
}

/// Maps every name in `ranking` to its cluster standard, or to itself when no
/// link mentions it.
///
/// Links naming something outside the ranking, or linking one name to two
/// different standards, mean the standardization table and the ranking come
/// from different snapshots.
pub fn resolve_aliases(
    kind: EntityKind,
    ranking: &ImportanceRanking,
    links: &[StandardizationLink],
) -> Result<AliasTable, ResolutionError> {
    let mut linked: HashMap<&str, &str> = HashMap::with_capacity(links.len());
    for link in links {
        if !ranking.contains_key(&link.name) {
            return Err(ResolutionError::UnknownLinkMember {
                kind,
                name: link.name.clone(),
            });
        }
        if let Some(previous) = linked.insert(link.name.as_str(), link.standard.as_str()) {
            if previous != link.standard {
                return Err(ResolutionError::ConflictingLink {
                    kind,
                    name: link.name.clone(),
                    first: previous.to_string(),
                    second: link.standard.clone(),
                });
            }
        }
    }

    let standards: HashMap<String, String> = ranking
        .keys()
        .map(|name| {
            let standard = linked.get(name.as_str()).copied().unwrap_or(name.as_str());
            (name.clone(), standard.to_string())
        })
        .collect();

    let clustered = linked.len();
    debug!(
        "{} of {} {} names resolved through a cluster",
        clustered,
        standards.len(),
        kind
    );
    info!(
        "Resolved {} {} aliases ({} clustered)",
        standards.len(),
        kind,
        clustered
    );

    Ok(AliasTable {
        kind,
        standards,
        clustered,
    })
}
