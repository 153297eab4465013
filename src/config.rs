// src/config.rs

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;

// Similarity index threshold for candidate pairs
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.7;

// Trigram frequency band treated as signal: drop the top 1% and the rarest 10%
pub const SIGNAL_HIGH_QUANTILE: f64 = 0.99;
pub const SIGNAL_LOW_QUANTILE: f64 = 0.10;

// Size of the "top" trigram set relative to the excluded high band
pub const TOP_TRIGRAM_FACTOR: f64 = 1.5;

// Signatures usually share >10 trigrams, so 5 or fewer is weak
pub const MIN_SIGNAL_TRIGRAMS: usize = 6;

// Share of shared trigrams drawn from the top set above which a pair is weak
pub const MAX_COMMONALITY: f64 = 0.6;

// Weak pairs survive only if the de-noised names still score this (0-100)
pub const RESCUE_SCORE_THRESHOLD: u8 = 90;

// Character fragments of generic corporate and real-estate vocabulary
// ("Inc", "Company", "Corp", "Commercial", "Properties", "Real Estate", ...)
pub const GENERIC_FRAGMENTS: [&str; 42] = [
    "  c", "  e", "  p", "  r", " co", " es", " pr", " re", "al ", "es ", "te ", "ani", "ate",
    "cia", "com", "eal", "erc", "ert", "est", "ial", "ies", "mer", "mme", "mpa", "nie", "omm",
    "omp", "ope", "pan", "per", "pro", "rci", "rea", "rop", "rti", "sta", "tat", "tie", "  i",
    " in", "inc", "nc ",
];

const CONFIG_PATH_VAR: &str = "FUSE_CONFIG";
const MIN_SIMILARITY_VAR: &str = "FUSE_MIN_SIMILARITY";
const RESCUE_SCORE_VAR: &str = "FUSE_RESCUE_SCORE";

/// Tuning knobs for one clustering pass.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub min_similarity: f32,
    pub signal_high_quantile: f64,
    pub signal_low_quantile: f64,
    pub top_trigram_factor: f64,
    pub min_signal_trigrams: usize,
    pub max_commonality: f64,
    pub rescue_score_threshold: u8,
    /// Stripped from the first name of a weak pair before re-scoring
    pub generic_fragments: Vec<String>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_similarity: DEFAULT_MIN_SIMILARITY,
            signal_high_quantile: SIGNAL_HIGH_QUANTILE,
            signal_low_quantile: SIGNAL_LOW_QUANTILE,
            top_trigram_factor: TOP_TRIGRAM_FACTOR,
            min_signal_trigrams: MIN_SIGNAL_TRIGRAMS,
            max_commonality: MAX_COMMONALITY,
            rescue_score_threshold: RESCUE_SCORE_THRESHOLD,
            generic_fragments: GENERIC_FRAGMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClusteringConfig {
    /// Defaults, overlaid by the JSON file named in `FUSE_CONFIG` (if set),
    /// overlaid by individual env overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        info!(
            "Clustering config: min_similarity={}, min_signal_trigrams={}, max_commonality={}, rescue_score={}, {} generic fragments",
            config.min_similarity,
            config.min_signal_trigrams,
            config.max_commonality,
            config.rescue_score_threshold,
            config.generic_fragments.len()
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read clustering config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse clustering config {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(MIN_SIMILARITY_VAR) {
            match raw.parse::<f32>() {
                Ok(value) if value > 0.0 && value < 1.0 => self.min_similarity = value,
                _ => warn!(
                    "Ignoring {}='{}': expected a number in (0, 1)",
                    MIN_SIMILARITY_VAR, raw
                ),
            }
        }
        if let Ok(raw) = std::env::var(RESCUE_SCORE_VAR) {
            match raw.parse::<u8>() {
                Ok(value) if value <= 100 => self.rescue_score_threshold = value,
                _ => warn!(
                    "Ignoring {}='{}': expected an integer in 0..=100",
                    RESCUE_SCORE_VAR, raw
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_constants() {
        let config = ClusteringConfig::default();
        assert_eq!(config.min_similarity, DEFAULT_MIN_SIMILARITY);
        assert_eq!(config.min_signal_trigrams, 6);
        assert_eq!(config.rescue_score_threshold, 90);
        assert_eq!(config.generic_fragments.len(), GENERIC_FRAGMENTS.len());
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rescue_score_threshold": 85, "generic_fragments": ["inc"]}}"#
        )
        .unwrap();

        let config = ClusteringConfig::from_file(file.path()).unwrap();
        assert_eq!(config.rescue_score_threshold, 85);
        assert_eq!(config.generic_fragments, vec!["inc".to_string()]);
        assert_eq!(config.min_similarity, DEFAULT_MIN_SIMILARITY);
        assert_eq!(config.max_commonality, MAX_COMMONALITY);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(ClusteringConfig::from_file(file.path()).is_err());
    }
}
