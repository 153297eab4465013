// src/matching/mod.rs
pub mod cluster;
pub mod fuzzy;
pub mod signature;

pub use cluster::{build_clusters, ClusterSet, PairDecision};
pub use signature::{analyze_signatures, TrigramClass, TrigramClassification};
