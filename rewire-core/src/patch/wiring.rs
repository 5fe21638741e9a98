// Two-tier reference rewiring over the migrated tree.
//
// Resolution order is a hard invariant: the migrated index is consulted
// first at the primary threshold, the legacy index only as a fallback at a
// stricter threshold, and an unresolvable reference is left untouched —
// never replaced with a fabricated name.

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{PatchError, Result};
use crate::index::SimilarityIndex;
use crate::report::{Confidence, RewireEvent, RewireObserver};

use super::patterns::{
    KNOWN_ANNOTATIONS, ReferencePattern, ReferenceSite, catalogue, render_replacement,
};

/// Result of one bounded fixed-point run.
#[derive(Debug, Clone, Copy)]
pub struct FixOutcome {
    pub passes_run: u32,
    pub total_changes: usize,
    /// True when a pass produced zero changes within the budget.
    pub converged: bool,
}

/// How one referenced name was resolved.
#[derive(Debug)]
enum Resolution {
    /// A migrated-tree candidate cleared the primary threshold.
    Rewire { candidate: String, score: f64 },
    /// Only a legacy-tree candidate cleared the (stricter) legacy threshold.
    Port { candidate: String, score: f64 },
    /// Nothing cleared either threshold.
    Unresolved { best_score: f64 },
}

/// A pending textual edit within one file.
#[derive(Debug)]
struct Edit {
    span: Range<usize>,
    replacement: String,
    event: RewireEvent,
}

/// Applies structural rewrites to migrated source files.
#[derive(Debug)]
pub struct WiringPatcher<'a> {
    migrated_root: PathBuf,
    legacy_root: PathBuf,
    migrated_index: &'a SimilarityIndex,
    legacy_index: &'a SimilarityIndex,
    embedder: &'a dyn EmbeddingProvider,
    patterns: Vec<ReferencePattern>,
    ctor_regex: Regex,
    skip_names: BTreeSet<String>,
    primary_threshold: f64,
    legacy_threshold: f64,
}

impl<'a> WiringPatcher<'a> {
    pub fn new(
        migrated_root: &Path,
        legacy_root: &Path,
        migrated_index: &'a SimilarityIndex,
        legacy_index: &'a SimilarityIndex,
        embedder: &'a dyn EmbeddingProvider,
        builtins: &BTreeSet<String>,
        primary_threshold: f64,
        legacy_threshold: f64,
    ) -> Result<Self> {
        let mut skip_names = builtins.clone();
        skip_names.extend(KNOWN_ANNOTATIONS.iter().map(|s| (*s).to_string()));
        Ok(Self {
            migrated_root: migrated_root.to_path_buf(),
            legacy_root: legacy_root.to_path_buf(),
            migrated_index,
            legacy_index,
            embedder,
            patterns: catalogue()?,
            ctor_regex: Regex::new(r"public\s+\w+\s*\(([^)]*)\)")
                .map_err(|e| PatchError::Pattern(e.to_string()))?,
            skip_names,
            primary_threshold,
            legacy_threshold,
        })
    }

    /// Repeat "scan all files, apply all applicable rewires" until a pass
    /// yields zero changes or the budget is exhausted. Budget exhaustion is
    /// a warning, not an error: unresolved wiring is an accepted terminal
    /// state surfaced for follow-up.
    #[instrument(skip_all, name = "wiring_fix")]
    pub async fn recursive_fix(
        &self,
        max_passes: u32,
        observer: &mut dyn RewireObserver,
    ) -> Result<FixOutcome> {
        let mut total_changes = 0;
        for pass in 1..=max_passes {
            let changes = self.scan_all(observer).await?;
            info!(pass, changes, "Wiring pass complete");
            total_changes += changes;
            if changes == 0 {
                return Ok(FixOutcome {
                    passes_run: pass,
                    total_changes,
                    converged: true,
                });
            }
        }
        warn!(max_passes, "Wiring pass budget exhausted; unresolved references may remain");
        Ok(FixOutcome {
            passes_run: max_passes,
            total_changes,
            converged: false,
        })
    }

    /// One full tree walk. Per-file patch failures abort only that file's
    /// pass; the walk always completes.
    pub async fn scan_all(&self, observer: &mut dyn RewireObserver) -> Result<usize> {
        let mut files = Vec::new();
        collect_java_files(&self.migrated_root, &mut files);
        files.sort();

        let mut total = 0;
        for file in files {
            match self.rewire_file(&file, observer).await {
                Ok(changes) => total += changes,
                Err(e) => warn!(file = %file.display(), error = %e, "Skipping file this pass"),
            }
        }
        Ok(total)
    }

    /// Scan one file and apply every applicable rewire. Returns the count of
    /// changes made (applied rewrites plus newly ported files).
    pub async fn rewire_file(
        &self,
        path: &Path,
        observer: &mut dyn RewireObserver,
    ) -> Result<usize> {
        let code = std::fs::read_to_string(path).map_err(PatchError::from)?;
        let mut edits: Vec<Edit> = Vec::new();
        let mut ports = 0;

        for pattern in &self.patterns {
            for site in pattern.sites(&code) {
                if !self.is_rewire_candidate(&site.name) {
                    continue;
                }
                if overlaps_any(&edits, &site.span) {
                    continue;
                }
                self.resolve_site(path, &code, &site, &mut edits, &mut ports, observer)
                    .await?;
            }
        }

        self.collect_constructor_edits(path, &code, &mut edits, &mut ports, observer)
            .await?;

        let (patched, applied) = apply_edits(&code, edits, observer);
        if applied > 0 {
            std::fs::write(path, patched).map_err(PatchError::from)?;
            debug!(file = %path.display(), applied, "Rewired file");
        }
        Ok(applied + ports)
    }

    /// Resolve one reference site and queue its edit (and port) if anything
    /// cleared a threshold.
    async fn resolve_site(
        &self,
        path: &Path,
        code: &str,
        site: &ReferenceSite,
        edits: &mut Vec<Edit>,
        ports: &mut usize,
        observer: &mut dyn RewireObserver,
    ) -> Result<()> {
        let original = code[site.span.clone()].to_string();
        match self.resolve_name(&site.name).await? {
            Resolution::Rewire { candidate, score } => {
                let replacement = render_replacement(code, site, &candidate);
                if replacement == original {
                    return Ok(()); // already points at the resolved name
                }
                edits.push(Edit {
                    span: site.span.clone(),
                    event: RewireEvent {
                        file: path.to_path_buf(),
                        original,
                        replacement: Some(replacement.clone()),
                        category: site.kind.to_string(),
                        reason: "embedding_match".to_string(),
                        confidence: Confidence::from_score(score),
                        score: Some(score),
                    },
                    replacement,
                });
            }
            Resolution::Port { candidate, score } => {
                if self.port_legacy_class(&candidate, score, observer)? {
                    *ports += 1;
                }
                let replacement = render_replacement(code, site, &candidate);
                if replacement == original {
                    return Ok(()); // ported under its own name; reference is fine
                }
                edits.push(Edit {
                    span: site.span.clone(),
                    event: RewireEvent {
                        file: path.to_path_buf(),
                        original,
                        replacement: Some(replacement.clone()),
                        category: format!("{}_ported", site.kind),
                        reason: "ported_from_legacy".to_string(),
                        confidence: Confidence::from_score(score),
                        score: Some(score),
                    },
                    replacement,
                });
            }
            Resolution::Unresolved { best_score } => {
                observer.record(RewireEvent {
                    file: path.to_path_buf(),
                    original,
                    replacement: None,
                    category: format!("unresolved_{}", site.kind),
                    reason: "no_candidate_cleared_threshold".to_string(),
                    confidence: Confidence::None,
                    score: Some(best_score),
                });
            }
        }
        Ok(())
    }

    /// Constructor parameters are high-value wiring points; each declared
    /// parameter type is matched independently under the same two-tier
    /// policy.
    async fn collect_constructor_edits(
        &self,
        path: &Path,
        code: &str,
        edits: &mut Vec<Edit>,
        ports: &mut usize,
        observer: &mut dyn RewireObserver,
    ) -> Result<()> {
        let param_lists: Vec<String> = self
            .ctor_regex
            .captures_iter(code)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect();

        for param_list in param_lists {
            for param in param_list.split(',') {
                let parts: Vec<&str> = param.split_whitespace().collect();
                let [param_type, param_var] = parts.as_slice() else {
                    continue;
                };
                if !self.is_rewire_candidate(param_type) {
                    continue;
                }

                let original = format!("{param_type} {param_var}");
                let site_regex = Regex::new(&format!(
                    r"\b{}\s+{}\b",
                    regex::escape(param_type),
                    regex::escape(param_var)
                ))
                .map_err(|e| PatchError::Pattern(e.to_string()))?;
                let Some(found) = site_regex.find(code) else {
                    continue;
                };
                if overlaps_any(edits, &found.range()) {
                    continue;
                }

                match self.resolve_name(param_type).await? {
                    Resolution::Rewire { candidate, score } => {
                        if candidate == *param_type {
                            continue;
                        }
                        edits.push(Edit {
                            span: found.range(),
                            replacement: format!("{candidate} {param_var}"),
                            event: RewireEvent {
                                file: path.to_path_buf(),
                                original,
                                replacement: Some(format!("{candidate} {param_var}")),
                                category: "constructor_injection".to_string(),
                                reason: "embedding_match".to_string(),
                                confidence: Confidence::from_score(score),
                                score: Some(score),
                            },
                        });
                    }
                    Resolution::Port { candidate, score } => {
                        if self.port_legacy_class(&candidate, score, observer)? {
                            *ports += 1;
                        }
                        if candidate == *param_type {
                            continue;
                        }
                        edits.push(Edit {
                            span: found.range(),
                            replacement: format!("{candidate} {param_var}"),
                            event: RewireEvent {
                                file: path.to_path_buf(),
                                original,
                                replacement: Some(format!("{candidate} {param_var}")),
                                category: "constructor_injection_ported".to_string(),
                                reason: "ported_from_legacy".to_string(),
                                confidence: Confidence::from_score(score),
                                score: Some(score),
                            },
                        });
                    }
                    Resolution::Unresolved { best_score } => {
                        observer.record(RewireEvent {
                            file: path.to_path_buf(),
                            original,
                            replacement: None,
                            category: "unresolved_constructor_injection".to_string(),
                            reason: "no_candidate_cleared_threshold".to_string(),
                            confidence: Confidence::None,
                            score: Some(best_score),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// A name is worth resolving when it looks like a class reference and is
    /// not already defined in the migrated tree (same-tree preference: never
    /// port something that already exists).
    fn is_rewire_candidate(&self, name: &str) -> bool {
        name.len() > 1
            && name.chars().next().is_some_and(char::is_uppercase)
            && !self.skip_names.contains(name)
            && !self.migrated_index.contains_name(name)
    }

    /// Two-tier resolution: migrated index at the primary threshold, then
    /// legacy index at the stricter legacy threshold.
    async fn resolve_name(&self, name: &str) -> Result<Resolution> {
        // Embed the name as a minimal class skeleton — the index holds
        // whole-file vectors, so a bare identifier would compare poorly.
        let query = self.embedder.embed(&format!("public class {name} {{}}")).await?;

        let migrated_best = self.migrated_index.best_match(&query);
        if let Some((candidate, score)) = migrated_best {
            if score > self.primary_threshold {
                return Ok(Resolution::Rewire {
                    candidate: candidate.to_string(),
                    score,
                });
            }
        }

        let legacy_best = self.legacy_index.best_match(&query);
        if let Some((candidate, score)) = legacy_best {
            if score > self.legacy_threshold {
                return Ok(Resolution::Port {
                    candidate: candidate.to_string(),
                    score,
                });
            }
        }

        let best_score = migrated_best
            .map(|(_, s)| s)
            .into_iter()
            .chain(legacy_best.map(|(_, s)| s))
            .fold(0.0f64, f64::max);
        Ok(Resolution::Unresolved { best_score })
    }

    /// Copy a legacy class file into the migrated tree at its mirrored
    /// relative path, prefixed with a review marker. An existing migrated
    /// file at the destination is never overwritten.
    fn port_legacy_class(
        &self,
        class_name: &str,
        score: f64,
        observer: &mut dyn RewireObserver,
    ) -> Result<bool> {
        let Some(record) = self.legacy_index.get(class_name) else {
            return Ok(false);
        };
        let relative = record
            .path
            .strip_prefix(&self.legacy_root)
            .unwrap_or(&record.path);
        let destination = self.migrated_root.join(relative);

        if destination.exists() {
            debug!(class = class_name, "Port skipped: destination already exists");
            return Ok(false);
        }

        let source = match &record.source {
            Some(source) => source.clone(),
            None => std::fs::read_to_string(&record.path).map_err(PatchError::from)?,
        };

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(PatchError::from)?;
        }
        let marked = format!("// [ported from legacy: review needed]\n{source}");
        std::fs::write(&destination, marked).map_err(PatchError::from)?;

        info!(class = class_name, destination = %destination.display(), "Ported legacy class");
        observer.record(RewireEvent {
            file: destination.clone(),
            original: record.path.display().to_string(),
            replacement: Some(destination.display().to_string()),
            category: "legacy_class_ported".to_string(),
            reason: "legacy_needed_for_wiring".to_string(),
            confidence: Confidence::from_score(score),
            score: Some(score),
        });
        Ok(true)
    }
}

/// Apply queued edits back-to-front so earlier spans stay valid, recording
/// each applied edit's audit event. Overlapping edits were already filtered
/// at collection time.
fn apply_edits(code: &str, mut edits: Vec<Edit>, observer: &mut dyn RewireObserver) -> (String, usize) {
    edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    let mut patched = code.to_string();
    let mut applied = 0;
    for edit in edits {
        patched.replace_range(edit.span.clone(), &edit.replacement);
        observer.record(edit.event);
        applied += 1;
    }
    (patched, applied)
}

fn overlaps_any(edits: &[Edit], span: &Range<usize>) -> bool {
    edits
        .iter()
        .any(|e| span.start < e.span.end && e.span.start < span.end)
}

fn collect_java_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_java_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "java") {
            out.push(path);
        }
    }
}
