//! Error types for the resolution stages.
//!
//! Every variant is a data-integrity failure: the collaborators handed the
//! core an inconsistent snapshot. They abort the current pass instead of
//! being skipped.

use thiserror::Error;

use crate::models::EntityKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("{kind} cluster [{key}] has no members")]
    EmptyCluster { kind: EntityKind, key: String },

    #[error("{kind} cluster member '{name}' has no importance entry")]
    MissingImportance { kind: EntityKind, name: String },

    #[error("record {record_id} references unknown {kind} name '{name}'")]
    UnknownName {
        kind: EntityKind,
        name: String,
        record_id: String,
    },

    #[error("{kind} name '{name}' is linked to both '{first}' and '{second}'")]
    ConflictingLink {
        kind: EntityKind,
        name: String,
        first: String,
        second: String,
    },

    #[error("{kind} standardization link for '{name}' does not match any known name")]
    UnknownLinkMember { kind: EntityKind, name: String },
}
