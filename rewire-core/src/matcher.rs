// Cross-codebase class matching: identity first, then nearest neighbor
// gated by the primary similarity threshold.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::SimilarityIndex;

/// Outcome of matching one migrated class against the legacy tree.
///
/// Computed fresh per query — source mutates between passes, so results are
/// never cached across passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// The migrated class the query was made for.
    pub source_class: String,
    /// Best legacy counterpart, when one cleared the threshold.
    pub matched_class: Option<String>,
    /// Cosine similarity of the accepted match, or the best rejected score.
    pub score: f64,
    /// Threshold in force when the decision was made.
    pub threshold_used: f64,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        self.matched_class.is_some()
    }
}

/// Pairs migrated classes with their legacy counterparts.
#[derive(Debug)]
pub struct CrossCodebaseMatcher<'a> {
    legacy: &'a SimilarityIndex,
    migrated: &'a SimilarityIndex,
    threshold: f64,
}

impl<'a> CrossCodebaseMatcher<'a> {
    pub fn new(legacy: &'a SimilarityIndex, migrated: &'a SimilarityIndex, threshold: f64) -> Self {
        Self {
            legacy,
            migrated,
            threshold,
        }
    }

    /// Find the legacy counterpart of a migrated class.
    ///
    /// An identity match (same name in both trees) wins outright with score
    /// 1.0. Otherwise the migrated class's own vector is looked up and the
    /// nearest legacy neighbor accepted only above the threshold. A negative
    /// result is a valid answer, not an error.
    pub fn match_class(&self, migrated_class: &str) -> MatchResult {
        if self.legacy.contains_name(migrated_class) {
            return MatchResult {
                source_class: migrated_class.to_string(),
                matched_class: Some(migrated_class.to_string()),
                score: 1.0,
                threshold_used: self.threshold,
            };
        }

        let Some(record) = self.migrated.get(migrated_class) else {
            debug!(class = migrated_class, "No embedding for migrated class");
            return self.no_match(migrated_class, 0.0);
        };

        match self.legacy.best_match(&record.vector) {
            Some((candidate, score)) if score > self.threshold => MatchResult {
                source_class: migrated_class.to_string(),
                matched_class: Some(candidate.to_string()),
                score,
                threshold_used: self.threshold,
            },
            Some((candidate, score)) => {
                debug!(
                    class = migrated_class,
                    best = candidate,
                    score,
                    "Best legacy candidate below threshold"
                );
                self.no_match(migrated_class, score)
            }
            None => self.no_match(migrated_class, 0.0),
        }
    }

    fn no_match(&self, migrated_class: &str, score: f64) -> MatchResult {
        MatchResult {
            source_class: migrated_class.to_string(),
            matched_class: None,
            score,
            threshold_used: self.threshold,
        }
    }
}
