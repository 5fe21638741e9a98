// Relationship diffing between matched legacy/migrated class pairs.
//
// The report is the sole signal consumed downstream. It is set-based, not
// edge-by-edge: a renamed relationship shows up as one missing plus one
// extra entry rather than a move.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rewire_graphs::graph::RelationshipGraph;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{IndexError, Result};
use crate::matcher::CrossCodebaseMatcher;

/// One matched pair's neighborhood comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    pub legacy_class: String,
    pub similarity: f64,
    pub legacy_neighborhood: BTreeSet<String>,
    pub migrated_neighborhood: BTreeSet<String>,
    /// `legacy_neighborhood − migrated_neighborhood`.
    pub missing: BTreeSet<String>,
    /// `migrated_neighborhood − legacy_neighborhood`.
    pub extra: BTreeSet<String>,
}

/// Full comparison report for one reconciliation pass.
///
/// Regenerated every pass; a superseded report is discarded, never patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffReport {
    /// Keyed by migrated class name.
    pub entries: BTreeMap<String, DiffEntry>,
    /// Legacy classes no migrated class matched: their entire neighborhood
    /// is absent from the migrated tree.
    pub unmatched_legacy: BTreeMap<String, BTreeSet<String>>,
}

impl DiffReport {
    /// True when no entry reports any missing or extra relationship and
    /// every legacy class found a counterpart.
    pub fn is_converged(&self) -> bool {
        self.unmatched_legacy.is_empty()
            && self
                .entries
                .values()
                .all(|e| e.missing.is_empty() && e.extra.is_empty())
    }

    /// Total count of missing + extra relationships across all entries.
    pub fn discrepancy_count(&self) -> usize {
        self.entries
            .values()
            .map(|e| e.missing.len() + e.extra.len())
            .sum::<usize>()
            + self.unmatched_legacy.values().map(BTreeSet::len).sum::<usize>()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(IndexError::from)?;
        std::fs::write(path, json).map_err(IndexError::from)?;
        Ok(())
    }
}

/// Compares neighborhoods between matched class pairs at a bounded depth.
#[derive(Debug)]
pub struct RelationshipDiffer {
    depth: u32,
}

impl RelationshipDiffer {
    pub fn new(depth: u32) -> Self {
        Self { depth }
    }

    /// Produce the comparison report for the current pass.
    #[instrument(skip_all, name = "relationship_diff")]
    pub fn compare(
        &self,
        legacy_graph: &RelationshipGraph,
        migrated_graph: &RelationshipGraph,
        matcher: &CrossCodebaseMatcher<'_>,
    ) -> DiffReport {
        let mut report = DiffReport::default();
        let mut matched_legacy: BTreeSet<String> = BTreeSet::new();

        for migrated_class in migrated_graph.class_names() {
            let result = matcher.match_class(migrated_class);
            let Some(legacy_class) = result.matched_class else {
                continue;
            };
            matched_legacy.insert(legacy_class.clone());

            let legacy_neighborhood = legacy_graph.neighborhood(&legacy_class, self.depth);
            let migrated_neighborhood = migrated_graph.neighborhood(migrated_class, self.depth);

            let missing: BTreeSet<String> = legacy_neighborhood
                .difference(&migrated_neighborhood)
                .cloned()
                .collect();
            let extra: BTreeSet<String> = migrated_neighborhood
                .difference(&legacy_neighborhood)
                .cloned()
                .collect();

            report.entries.insert(
                migrated_class.to_string(),
                DiffEntry {
                    legacy_class,
                    similarity: result.score,
                    legacy_neighborhood,
                    migrated_neighborhood,
                    missing,
                    extra,
                },
            );
        }

        for legacy_class in legacy_graph.class_names() {
            if !matched_legacy.contains(legacy_class) {
                report.unmatched_legacy.insert(
                    legacy_class.to_string(),
                    legacy_graph.neighborhood(legacy_class, self.depth),
                );
            }
        }

        info!(
            pairs = report.entries.len(),
            unmatched = report.unmatched_legacy.len(),
            discrepancies = report.discrepancy_count(),
            "Relationship comparison complete"
        );
        report
    }
}
