// src/lib.rs
pub mod config;
pub mod db;
pub mod error;
pub mod linkage;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod results;
pub mod standardize;
pub mod store;
pub mod trigram;

// Re-export common types for easier access
pub use config::ClusteringConfig;
pub use error::ResolutionError;
pub use models::{
    Alias, AssociationEdge, CandidatePair, Cluster, ClusterKey, CoOccurrence, EntityKind,
    ImportanceRanking, OutputAssignment, StandardizationLink,
};

// Re-export important functionality
pub use db::PgPool;
pub use pipeline::{run_linkage, run_pipeline, run_standardization_pass};
pub use store::{MemoryStore, PgStore, Store};
