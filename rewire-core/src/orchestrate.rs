// Per-file retry state machine: Pending → Attempting(n) → Succeeded or
// ShimFallback. Every terminal transition persists a fix-history record so
// a run always explains what happened to each file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{BuildError, PatchError, Result, StrategyError};
use crate::llm::PatchGenerator;
use crate::resolve::{CrossReferenceResolver, build_class_map};
use crate::stitch::ContextStitcher;
use crate::strategy::{AttemptMemory, FixPlanner, FixStrategyRegistry, StrategyContext};

// ── Build seam ──────────────────────────────────────────────────────

/// Result of one external build invocation.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub success: bool,
    /// Combined stdout/stderr of the build tool.
    pub log: String,
}

/// External build-tool seam. Invocations are blocking with no implicit
/// timeout — wrap with your own deadline if the build can hang.
#[async_trait::async_trait]
pub trait BuildRunner: Send + Sync + std::fmt::Debug {
    async fn run_build(&self, project_dir: &Path) -> Result<BuildOutcome>;
}

/// Runs a configurable build command (`./gradlew build` by default) and
/// captures its combined output.
#[derive(Debug)]
pub struct ProcessBuildRunner {
    program: String,
    args: Vec<String>,
}

impl ProcessBuildRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn gradle() -> Self {
        Self::new("./gradlew", vec!["clean".to_string(), "build".to_string()])
    }
}

#[async_trait::async_trait]
impl BuildRunner for ProcessBuildRunner {
    async fn run_build(&self, project_dir: &Path) -> Result<BuildOutcome> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .current_dir(project_dir)
            .output()
            .await
            .map_err(|e| BuildError::Invocation(format!("{}: {e}", self.program)))?;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(BuildOutcome {
            success: output.status.success(),
            log,
        })
    }
}

// ── State machine ───────────────────────────────────────────────────

/// Repair state of one target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Attempting(u32),
    Succeeded,
    /// All attempts exhausted; a placeholder stub was emitted so other
    /// files' compilation is not blocked by this one.
    ShimFallback,
}

/// Terminal record persisted for every processed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRecord {
    pub file: String,
    pub strategies_tried: Vec<String>,
    pub success: bool,
    pub shim_generated: bool,
    pub final_code: String,
    pub run_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

/// Writes one JSON history record per file.
#[derive(Debug)]
pub struct FixHistoryLogger {
    dir: PathBuf,
}

impl FixHistoryLogger {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn log(&self, record: &FixRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(StrategyError::from)?;
        let stem = Path::new(&record.file)
            .file_stem()
            .map_or_else(|| record.file.clone(), |s| s.to_string_lossy().to_string());
        let path = self.dir.join(format!("{stem}.json"));
        let json = serde_json::to_string_pretty(record).map_err(StrategyError::from)?;
        std::fs::write(&path, json).map_err(StrategyError::from)?;
        Ok(())
    }
}

// ── Orchestrator ────────────────────────────────────────────────────

/// Drives the repair loop for individual migrated files.
#[derive(Debug)]
pub struct RetryOrchestrator<'a> {
    migrated_root: PathBuf,
    builtins: BTreeSet<String>,
    build: &'a dyn BuildRunner,
    generator: Option<&'a dyn PatchGenerator>,
    registry: &'a FixStrategyRegistry,
    planner: FixPlanner,
    stitcher: ContextStitcher,
    history: FixHistoryLogger,
    max_retries: u32,
    run_id: Uuid,
}

impl<'a> RetryOrchestrator<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        migrated_root: &Path,
        legacy_root: &Path,
        builtins: BTreeSet<String>,
        build: &'a dyn BuildRunner,
        generator: Option<&'a dyn PatchGenerator>,
        registry: &'a FixStrategyRegistry,
        history_dir: &Path,
        max_retries: u32,
    ) -> Self {
        Self {
            migrated_root: migrated_root.to_path_buf(),
            builtins,
            build,
            generator,
            registry,
            planner: FixPlanner::new(),
            stitcher: ContextStitcher::new(legacy_root, migrated_root),
            history: FixHistoryLogger::new(history_dir),
            max_retries,
            run_id: Uuid::new_v4(),
        }
    }

    /// Run the full state machine for one file and persist its terminal
    /// record. `relative` is the file's path under the migrated root.
    #[instrument(skip_all, fields(file = %relative.display()), name = "process_file")]
    pub async fn process_file(
        &self,
        relative: &Path,
        memory: &mut AttemptMemory,
    ) -> Result<FixRecord> {
        let file_key = relative.display().to_string();
        let mut strategies_tried = Vec::new();

        let state = self
            .drive(relative, &file_key, memory, &mut strategies_tried)
            .await?;

        if state == FileState::ShimFallback {
            self.write_shim(relative)?;
        }

        let final_code =
            std::fs::read_to_string(self.migrated_root.join(relative)).unwrap_or_default();
        let record = FixRecord {
            file: file_key,
            strategies_tried,
            success: state == FileState::Succeeded,
            shim_generated: state == FileState::ShimFallback,
            final_code,
            run_id: self.run_id,
            completed_at: Utc::now(),
        };
        self.history.log(&record)?;
        info!(success = record.success, shim = record.shim_generated, "File processing complete");
        Ok(record)
    }

    async fn drive(
        &self,
        relative: &Path,
        file_key: &str,
        memory: &mut AttemptMemory,
        strategies_tried: &mut Vec<String>,
    ) -> Result<FileState> {
        let mut outcome = self.build.run_build(&self.migrated_root).await?;
        if outcome.success {
            return Ok(FileState::Succeeded);
        }

        for attempt in 1..=self.max_retries {
            info!(state = ?FileState::Attempting(attempt), "Starting repair attempt");

            self.reference_pre_pass(relative);

            let plan = self.planner.generate_plan(file_key, &outcome.log, memory);
            let stitched = self.stitcher.stitch(relative, &[]);
            let class_map = build_class_map(&self.migrated_root);
            let ctx = StrategyContext {
                migrated_root: &self.migrated_root,
                class_map: &class_map,
                builtins: &self.builtins,
                build_log: &outcome.log,
                stitched_context: Some(&stitched),
                generator: self.generator,
            };

            for name in &plan.strategies {
                memory.record(file_key, name)?;
                strategies_tried.push(name.clone());
                match self.registry.execute(name, relative, &ctx).await {
                    Ok(result) if result.success => {
                        info!(strategy = %name, detail = %result.detail, "Strategy succeeded");
                        break;
                    }
                    Ok(result) => {
                        info!(strategy = %name, detail = %result.detail, "Strategy made no fix");
                    }
                    Err(e) => warn!(strategy = %name, error = %e, "Strategy failed"),
                }
            }

            outcome = self.build.run_build(&self.migrated_root).await?;
            if outcome.success {
                return Ok(FileState::Succeeded);
            }
        }

        // Last chance: one more reference-resolution pass, one more build.
        self.reference_pre_pass(relative);
        outcome = self.build.run_build(&self.migrated_root).await?;
        if outcome.success {
            return Ok(FileState::Succeeded);
        }

        warn!(retries = self.max_retries, "Retry budget exhausted; falling back to shim");
        Ok(FileState::ShimFallback)
    }

    /// Cross-reference pre-pass. Failures here are non-fatal: the attempt
    /// proceeds with the file as-is.
    fn reference_pre_pass(&self, relative: &Path) {
        let class_map = build_class_map(&self.migrated_root);
        let resolver = CrossReferenceResolver::new(&self.migrated_root, self.builtins.clone());
        if let Err(e) = resolver.resolve_and_patch(relative, &class_map) {
            warn!(error = %e, "Reference pre-pass failed");
        }
    }

    /// Emit the minimal placeholder translation unit for an irreparable
    /// file: a class whose name matches the file stem.
    fn write_shim(&self, relative: &Path) -> Result<()> {
        let class_name = relative
            .file_stem()
            .map_or_else(|| "Shim".to_string(), |s| s.to_string_lossy().to_string());
        let shim = format!(
            "public class {class_name} {{\n    // shim: repair attempts exhausted, regenerate this file manually\n}}\n"
        );
        let full_path = self.migrated_root.join(relative);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).map_err(PatchError::from)?;
        }
        std::fs::write(&full_path, shim).map_err(PatchError::from)?;
        warn!(class = %class_name, "Shim emitted");
        Ok(())
    }
}
