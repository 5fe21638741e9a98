use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Scope of the durable attempt memory across runs.
///
/// `PerRun` starts empty and still persists for post-run inspection;
/// `Shared` loads whatever previous runs left on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryScope {
    #[default]
    PerRun,
    Shared,
}

/// Top-level Rewire configuration, matching `rewire.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewireConfig {
    #[serde(default)]
    pub matching: MatchingSection,
    #[serde(default)]
    pub passes: PassSection,
    #[serde(default)]
    pub extraction: ExtractionSection,
    #[serde(default)]
    pub memory: MemorySection,
    #[serde(default)]
    pub artifacts: ArtifactsSection,
}

/// Similarity thresholds and neighborhood depth.
///
/// The thresholds are observed heuristics, not derived constants — tune per
/// migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingSection {
    /// Minimum cosine similarity to accept a migrated-tree match.
    pub primary_threshold: f64,
    /// Stricter minimum for legacy-tree fallback: porting is a heavier,
    /// less reversible action than rewiring.
    pub legacy_threshold: f64,
    /// Neighborhood depth for relationship diffing (1 = direct).
    pub neighborhood_depth: u32,
}

impl Default for MatchingSection {
    fn default() -> Self {
        Self {
            primary_threshold: 0.7,
            legacy_threshold: 0.75,
            neighborhood_depth: 1,
        }
    }
}

/// Budgets for all fixed-point loops. Every loop in the engine is bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassSection {
    /// Wiring-patcher passes before giving up on a fixed point.
    pub max_wiring_passes: u32,
    /// Type-aligner passes.
    pub max_align_passes: u32,
    /// Global extract → diff → patch reconciliation passes.
    pub max_reconcile_passes: u32,
    /// Per-file build/repair attempts before shim fallback.
    pub max_retries: u32,
}

impl Default for PassSection {
    fn default() -> Self {
        Self {
            max_wiring_passes: 10,
            max_align_passes: 3,
            max_reconcile_passes: 5,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSection {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Extra type names excluded from relationship edges, on top of the
    /// builtin allowlist.
    pub extra_builtin_types: Vec<String>,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            include_patterns: vec!["**/*.java".into()],
            exclude_patterns: vec![
                "**/build/**".into(),
                "**/target/**".into(),
                "**/.git/**".into(),
            ],
            extra_builtin_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySection {
    pub scope: MemoryScope,
    pub path: PathBuf,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            scope: MemoryScope::PerRun,
            path: PathBuf::from("rewire-memory.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsSection {
    /// Migration audit report (every rewire/port/unresolved outcome).
    pub report_path: PathBuf,
    /// Per-file fix-history records.
    pub history_dir: PathBuf,
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from("rewire-report.json"),
            history_dir: PathBuf::from("rewire-history"),
        }
    }
}

impl RewireConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break loop termination or matching.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("primary_threshold", self.matching.primary_threshold),
            ("legacy_threshold", self.matching.legacy_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "matching.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.passes.max_reconcile_passes == 0 || self.passes.max_wiring_passes == 0 {
            return Err(ConfigError::Invalid(
                "pass budgets must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
