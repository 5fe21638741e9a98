// Global convergence loop: extract → match → diff → patch, repeated until
// the diff report is clean or the pass budget runs out. Graphs and reports
// are re-derived from current source every pass — recomputation is traded
// for correctness simplicity.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use rewire_graphs::builtin_types;
use rewire_graphs::extract::extract_tree;
use rewire_graphs::graph::RelationshipGraph;

use crate::align::TypeAligner;
use crate::config::RewireConfig;
use crate::diff::{DiffReport, RelationshipDiffer};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::SimilarityIndex;
use crate::matcher::CrossCodebaseMatcher;
use crate::patch::WiringPatcher;
use crate::report::RewireObserver;

/// Outcome of a full reconciliation run.
#[derive(Debug)]
pub struct PipelineResult {
    pub passes_run: u32,
    /// True when a pass ended with a clean diff report.
    pub converged: bool,
    /// The last pass's report (empty when converged).
    pub report: DiffReport,
    pub wiring_changes: usize,
    pub type_fixes: usize,
    /// Per-file extraction failures from the final pass.
    pub extraction_errors: usize,
}

/// Drives reconciliation of a legacy/migrated tree pair.
///
/// Explicitly constructed context — the embedding indexes are produced by a
/// prior indexing pass and stay read-only here (staleness against patched
/// source is a known, accepted limitation).
#[derive(Debug)]
pub struct ReconcilePipeline<'a> {
    legacy_root: PathBuf,
    migrated_root: PathBuf,
    legacy_index: &'a SimilarityIndex,
    migrated_index: &'a SimilarityIndex,
    embedder: &'a dyn EmbeddingProvider,
    config: &'a RewireConfig,
}

impl<'a> ReconcilePipeline<'a> {
    pub fn new(
        legacy_root: &Path,
        migrated_root: &Path,
        legacy_index: &'a SimilarityIndex,
        migrated_index: &'a SimilarityIndex,
        embedder: &'a dyn EmbeddingProvider,
        config: &'a RewireConfig,
    ) -> Self {
        Self {
            legacy_root: legacy_root.to_path_buf(),
            migrated_root: migrated_root.to_path_buf(),
            legacy_index,
            migrated_index,
            embedder,
            config,
        }
    }

    /// Run passes until the report is clean or the budget is exhausted.
    /// A patch applied in pass N is visible to pass N+1's extraction.
    #[instrument(skip_all, name = "reconcile")]
    pub async fn run(&self, observer: &mut dyn RewireObserver) -> Result<PipelineResult> {
        let builtins = builtin_types(&self.config.extraction.extra_builtin_types);
        let differ = RelationshipDiffer::new(self.config.matching.neighborhood_depth);

        let mut wiring_changes = 0;
        let mut type_fixes = 0;
        let mut last_report = DiffReport::default();
        let mut last_errors = 0;

        for pass in 1..=self.config.passes.max_reconcile_passes {
            let legacy_extraction = extract_tree(&self.legacy_root, &builtins);
            let migrated_extraction = extract_tree(&self.migrated_root, &builtins);
            last_errors = legacy_extraction.errors.len() + migrated_extraction.errors.len();

            let legacy_graph = RelationshipGraph::from_relations(&legacy_extraction.relations);
            let migrated_graph = RelationshipGraph::from_relations(&migrated_extraction.relations);

            let matcher = CrossCodebaseMatcher::new(
                self.legacy_index,
                self.migrated_index,
                self.config.matching.primary_threshold,
            );
            let report = differ.compare(&legacy_graph, &migrated_graph, &matcher);

            info!(
                pass,
                classes = migrated_graph.class_count(),
                discrepancies = report.discrepancy_count(),
                "Reconciliation pass"
            );

            if report.is_converged() {
                info!(pass, "Relationship graphs converged");
                return Ok(PipelineResult {
                    passes_run: pass,
                    converged: true,
                    report,
                    wiring_changes,
                    type_fixes,
                    extraction_errors: last_errors,
                });
            }
            last_report = report;

            let patcher = WiringPatcher::new(
                &self.migrated_root,
                &self.legacy_root,
                self.migrated_index,
                self.legacy_index,
                self.embedder,
                &builtins,
                self.config.matching.primary_threshold,
                self.config.matching.legacy_threshold,
            )?;
            let wiring = patcher
                .recursive_fix(self.config.passes.max_wiring_passes, observer)
                .await?;
            wiring_changes += wiring.total_changes;

            let aligner = TypeAligner::new(
                &self.migrated_root,
                &self.legacy_root,
                self.config.matching.legacy_threshold,
            );
            let align = aligner.recursive_fix(self.config.passes.max_align_passes, observer)?;
            type_fixes += align.total_changes;

            // No patch engine produced a change: further passes would
            // re-derive the same report, so stop early with the discrepancy
            // surfaced instead of burning the budget.
            if wiring.total_changes == 0 && align.total_changes == 0 {
                warn!(pass, "Report has discrepancies but no applicable patch; stopping");
                return Ok(PipelineResult {
                    passes_run: pass,
                    converged: false,
                    report: last_report,
                    wiring_changes,
                    type_fixes,
                    extraction_errors: last_errors,
                });
            }
        }

        warn!(
            passes = self.config.passes.max_reconcile_passes,
            "Reconciliation budget exhausted without convergence"
        );
        Ok(PipelineResult {
            passes_run: self.config.passes.max_reconcile_passes,
            converged: false,
            report: last_report,
            wiring_changes,
            type_fixes,
            extraction_errors: last_errors,
        })
    }
}
