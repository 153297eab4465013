// src/linkage/mod.rs
pub mod aliases;
pub mod association;
pub mod best_match;

pub use aliases::{resolve_aliases, AliasTable};
pub use association::{aggregate_associations, AssociationGraph};
pub use best_match::select_best_matches;
