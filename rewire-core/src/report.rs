// Migration audit trail. Every rewire, port, alignment, and unresolved
// reference flows through an observer — the report is a first-class
// deliverable of a run, not incidental logging.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PatchError, Result};

/// Confidence tier attached to each audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Similarity score above 0.8.
    High,
    /// Resolved, but at or below 0.8.
    Medium,
    /// Nothing resolved; the reference was left untouched.
    None,
}

impl Confidence {
    /// Tier for a resolved reference with the given score.
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 { Self::High } else { Self::Medium }
    }
}

/// One audited outcome: a rewrite that was applied, a file that was ported,
/// or a reference that could not be resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewireEvent {
    pub file: PathBuf,
    /// The matched source text before the change.
    pub original: String,
    /// The replacement text, or `None` for unresolved outcomes.
    pub replacement: Option<String>,
    /// Reference category, e.g. `field_injection` or `import_ported`.
    pub category: String,
    /// Why this outcome happened, e.g. `embedding_match`.
    pub reason: String,
    pub confidence: Confidence,
    /// Similarity score backing the decision, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Sink for audit events.
pub trait RewireObserver: std::fmt::Debug {
    fn record(&mut self, event: RewireEvent);
}

/// Collects audit events in memory and persists them as the migration
/// report JSON.
#[derive(Debug, Serialize, Deserialize)]
pub struct MigrationReporter {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub events: Vec<RewireEvent>,
}

impl MigrationReporter {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            events: Vec::new(),
        }
    }

    /// Events that left a reference untouched.
    pub fn unresolved(&self) -> impl Iterator<Item = &RewireEvent> {
        self.events.iter().filter(|e| e.replacement.is_none())
    }

    /// Event counts per category, for the report summary.
    pub fn counts_by_category(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.category.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn write_report(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PatchError::Io(std::io::Error::other(e)))?;
        std::fs::write(path, json).map_err(PatchError::from)?;
        Ok(())
    }
}

impl Default for MigrationReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl RewireObserver for MigrationReporter {
    fn record(&mut self, event: RewireEvent) {
        self.events.push(event);
    }
}
