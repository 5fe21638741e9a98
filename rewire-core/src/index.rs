// Embedding index — one record per source file, produced by an explicit
// indexing pass and treated as read-only during reconciliation. Staleness
// against patched source is accepted; re-indexing is an explicit operation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glob::glob;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedding::{EmbeddingProvider, cosine_similarity};
use crate::error::{IndexError, Result};

/// One indexed class: identity, source location, and its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Class name derived from the file stem.
    pub name: String,
    /// Path of the source file the vector was computed from.
    pub path: PathBuf,
    /// Fixed-length embedding vector.
    pub vector: Vec<f32>,
    /// Raw source text at indexing time, when retained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Nearest-neighbor index over one codebase tree.
///
/// Insertion order is preserved; ties in [`SimilarityIndex::best_match`]
/// resolve to the first-encountered candidate, so lookups are deterministic
/// given a fixed input order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SimilarityIndex {
    records: Vec<EmbeddingRecord>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: EmbeddingRecord) {
        match self.by_name.get(&record.name) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.by_name.insert(record.name.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&EmbeddingRecord> {
        self.by_name.get(name).map(|&pos| &self.records[pos])
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmbeddingRecord> {
        self.records.iter()
    }

    /// The candidate of maximum cosine similarity to the query vector.
    ///
    /// Strictly-greater comparison: on ties, the first-encountered record in
    /// insertion order wins.
    pub fn best_match(&self, query: &[f32]) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for record in &self.records {
            let score = cosine_similarity(query, &record.vector);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((&record.name, score));
            }
        }
        best
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records).map_err(IndexError::from)?;
        std::fs::write(path, json).map_err(IndexError::from)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(IndexError::from)?;
        let records: Vec<EmbeddingRecord> =
            serde_json::from_str(&text).map_err(IndexError::from)?;
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        Ok(index)
    }
}

// ── Indexing pass ───────────────────────────────────────────────────

/// Walks a source tree and embeds every matched file.
#[derive(Debug)]
pub struct EmbeddingIndexer {
    root: PathBuf,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    retain_source: bool,
}

impl EmbeddingIndexer {
    pub fn new(root: &Path, include_patterns: &[String], exclude_patterns: &[String]) -> Self {
        Self {
            root: root.to_path_buf(),
            include_patterns: include_patterns.to_vec(),
            exclude_patterns: exclude_patterns.to_vec(),
            retain_source: false,
        }
    }

    /// Keep raw source text on each record (larger index, richer prompts).
    #[must_use]
    pub fn with_source(mut self) -> Self {
        self.retain_source = true;
        self
    }

    /// Build the index. Per-file embedding failures are logged and skipped;
    /// indexing completes for the rest of the tree.
    pub async fn build(&self, embedder: &dyn EmbeddingProvider) -> Result<SimilarityIndex> {
        let files = self.walk_file_tree();
        info!(root = %self.root.display(), file_count = files.len(), "Indexing source tree");

        let mut index = SimilarityIndex::new();
        for path in files {
            let name = class_name_for(&path);
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };
            match embedder.embed(&content).await {
                Ok(vector) if !vector.is_empty() => {
                    index.insert(EmbeddingRecord {
                        name,
                        path,
                        vector,
                        source: self.retain_source.then_some(content),
                    });
                }
                Ok(_) => warn!(path = %path.display(), "Skipping file with empty embedding"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to embed file"),
            }
        }

        info!(records = index.len(), "Embedding index built");
        Ok(index)
    }

    fn walk_file_tree(&self) -> Vec<PathBuf> {
        let mut matched = Vec::new();
        for pattern in &self.include_patterns {
            let full_pattern = self.root.join(pattern).to_string_lossy().to_string();
            match glob(&full_pattern) {
                Ok(paths) => {
                    for entry in paths.flatten() {
                        if entry.is_file() && !self.is_excluded(&entry) {
                            matched.push(entry);
                        }
                    }
                }
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Invalid glob pattern");
                }
            }
        }
        matched.sort();
        matched.dedup();
        matched
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.exclude_patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern).is_ok_and(|p| p.matches_path(relative))
        })
    }
}

/// Identity of a file in the index: its stem, which for Java mirrors the
/// public class name.
pub fn class_name_for(path: &Path) -> String {
    path.file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            name: name.to_string(),
            path: PathBuf::from(format!("{name}.java")),
            vector,
            source: None,
        }
    }

    #[test]
    fn best_match_picks_highest_cosine() {
        let mut index = SimilarityIndex::new();
        index.insert(record("OrderService", vec![1.0, 0.0]));
        index.insert(record("OrderRepository", vec![0.9, 0.1]));

        let (name, score) = index.best_match(&[1.0, 0.0]).unwrap();
        assert_eq!(name, "OrderService");
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn best_match_ties_break_to_first_inserted() {
        let mut index = SimilarityIndex::new();
        index.insert(record("First", vec![1.0, 0.0]));
        index.insert(record("Second", vec![1.0, 0.0]));

        let (name, _) = index.best_match(&[1.0, 0.0]).unwrap();
        assert_eq!(name, "First");
    }

    #[test]
    fn best_match_on_empty_index_is_none() {
        let index = SimilarityIndex::new();
        assert!(index.best_match(&[1.0]).is_none());
    }

    #[test]
    fn insert_replaces_same_name() {
        let mut index = SimilarityIndex::new();
        index.insert(record("OrderService", vec![1.0, 0.0]));
        index.insert(record("OrderService", vec![0.0, 1.0]));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("OrderService").unwrap().vector, vec![0.0, 1.0]);
    }

    #[test]
    fn save_load_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut index = SimilarityIndex::new();
        index.insert(record("Zeta", vec![0.1, 0.2]));
        index.insert(record("Alpha", vec![0.3, 0.4]));
        index.save(&path).unwrap();

        let loaded = SimilarityIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        let names: Vec<&str> = loaded.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Zeta", "Alpha"]);
        assert!(loaded.contains_name("Alpha"));
    }

    #[test]
    fn class_name_from_path() {
        assert_eq!(
            class_name_for(Path::new("src/main/java/com/x/OrderService.java")),
            "OrderService"
        );
    }
}
