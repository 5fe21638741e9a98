// Integration test utilities and fixture management for Rewire.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rewire_core::embedding::EmbeddingProvider;
use rewire_core::index::{EmbeddingIndexer, SimilarityIndex};
use rewire_core::llm::{PatchGenerator, TokenUsage};
use rewire_core::orchestrate::{BuildOutcome, BuildRunner};

/// Install a test subscriber once so `RUST_LOG=debug cargo test` shows the
/// engine's tracing output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A paired legacy/migrated Java tree under one temporary directory.
#[derive(Debug)]
pub struct TestTrees {
    pub dir: tempfile::TempDir,
}

impl TestTrees {
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        std::fs::create_dir_all(dir.path().join("legacy/src/main/java/com/acme")).unwrap();
        std::fs::create_dir_all(dir.path().join("migrated/src/main/java/com/acme")).unwrap();
        Self { dir }
    }

    /// The canonical fixture: a legacy order system whose migrated half
    /// still wires against the legacy repository class.
    ///
    /// - legacy: `OrderService` (uses `LegacyRepo` and `AuditLog`),
    ///   `LegacyRepo`, `AuditLog`
    /// - migrated: `OrderService` (still references `LegacyRepo`),
    ///   `OrderRepository` (the renamed replacement)
    pub fn order_system() -> Self {
        let trees = Self::empty();
        trees.write_legacy(
            "com/acme/OrderService.java",
            "package com.acme;\n\npublic class OrderService {\n    @Autowired private LegacyRepo repo;\n\n    public String getId() {\n        return id;\n    }\n}\n",
        );
        trees.write_legacy(
            "com/acme/LegacyRepo.java",
            "package com.acme;\n\npublic class LegacyRepo {\n    public void save() {}\n}\n",
        );
        trees.write_legacy(
            "com/acme/AuditLog.java",
            "package com.acme;\n\npublic class AuditLog {\n    public void append(String line) {}\n}\n",
        );
        trees.write_migrated(
            "com/acme/OrderService.java",
            "package com.acme;\n\npublic class OrderService {\n    @Autowired private LegacyRepo repo;\n\n    public String getId() {\n        return id;\n    }\n}\n",
        );
        trees.write_migrated(
            "com/acme/OrderRepository.java",
            "package com.acme;\n\npublic class OrderRepository {\n    public void save() {}\n}\n",
        );
        trees
    }

    pub fn legacy_root(&self) -> PathBuf {
        self.dir.path().join("legacy")
    }

    pub fn migrated_root(&self) -> PathBuf {
        self.dir.path().join("migrated")
    }

    pub fn write_legacy(&self, relative: &str, code: &str) {
        write_source(&self.legacy_root(), relative, code);
    }

    pub fn write_migrated(&self, relative: &str, code: &str) {
        write_source(&self.migrated_root(), relative, code);
    }

    pub fn read_migrated(&self, relative: &str) -> String {
        std::fs::read_to_string(self.migrated_root().join("src/main/java").join(relative)).unwrap()
    }

    pub fn migrated_path(&self, relative: &str) -> PathBuf {
        self.migrated_root().join("src/main/java").join(relative)
    }
}

fn write_source(root: &Path, relative: &str, code: &str) {
    let path = root.join("src/main/java").join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, code).unwrap();
}

// ── Fake services ───────────────────────────────────────────────────

/// Embedder with a fixed vocabulary: the first table token contained in the
/// input selects its vector. Deterministic and offline.
#[derive(Debug)]
pub struct TableEmbedder {
    entries: Vec<(String, Vec<f32>)>,
    fallback: Vec<f32>,
}

impl TableEmbedder {
    pub fn new(entries: Vec<(&str, Vec<f32>)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(token, vector)| (token.to_string(), vector))
                .collect(),
            fallback: vec![0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Vocabulary for [`TestTrees::order_system`]. `LegacyRepo` queries land
    /// at cosine 0.82 to `OrderRepository`, matching the scenario where the
    /// repository was renamed during migration.
    pub fn order_system() -> Self {
        Self::new(vec![
            ("OrderService", vec![0.0, 0.0, 1.0, 0.0]),
            ("OrderRepository", vec![1.0, 0.0, 0.0, 0.0]),
            ("LegacyRepo", vec![0.82, 0.572_364, 0.0, 0.0]),
            ("AuditLog", vec![0.0, 1.0, 0.0, 0.0]),
        ])
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TableEmbedder {
    fn name(&self) -> &str {
        "table"
    }

    async fn embed(&self, text: &str) -> rewire_core::error::Result<Vec<f32>> {
        for (token, vector) in &self.entries {
            if text.contains(token.as_str()) {
                return Ok(vector.clone());
            }
        }
        Ok(self.fallback.clone())
    }
}

/// Patch generator that always answers with one canned response.
#[derive(Debug)]
pub struct CannedGenerator {
    pub response: String,
}

impl CannedGenerator {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl PatchGenerator for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    fn model_id(&self) -> &str {
        "canned-model"
    }

    async fn generate(&self, _prompt: &str) -> rewire_core::error::Result<(String, TokenUsage)> {
        Ok((
            self.response.clone(),
            TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        0.0
    }

    fn cost_per_1k_output(&self) -> f64 {
        0.0
    }
}

/// Build runner yielding a scripted sequence of outcomes; the last outcome
/// repeats once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedBuild {
    outcomes: Mutex<Vec<BuildOutcome>>,
}

impl ScriptedBuild {
    pub fn new(outcomes: Vec<(bool, &str)>) -> Self {
        Self {
            outcomes: Mutex::new(
                outcomes
                    .into_iter()
                    .rev()
                    .map(|(success, log)| BuildOutcome {
                        success,
                        log: log.to_string(),
                    })
                    .collect(),
            ),
        }
    }

    pub fn always_failing(log: &str) -> Self {
        Self::new(vec![(false, log)])
    }
}

#[async_trait::async_trait]
impl BuildRunner for ScriptedBuild {
    async fn run_build(&self, _project_dir: &Path) -> rewire_core::error::Result<BuildOutcome> {
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            Ok(outcomes.pop().unwrap())
        } else {
            Ok(outcomes.last().cloned().unwrap())
        }
    }
}

// ── Index helpers ───────────────────────────────────────────────────

/// Index both trees of a fixture with the given embedder, retaining source
/// text so ports can be served from the index.
pub async fn build_indexes(
    trees: &TestTrees,
    embedder: &dyn EmbeddingProvider,
) -> (SimilarityIndex, SimilarityIndex) {
    let include = vec!["**/*.java".to_string()];
    let exclude = Vec::new();

    let legacy = EmbeddingIndexer::new(&trees.legacy_root(), &include, &exclude)
        .with_source()
        .build(embedder)
        .await
        .unwrap();
    let migrated = EmbeddingIndexer::new(&trees.migrated_root(), &include, &exclude)
        .with_source()
        .build(embedder)
        .await
        .unwrap();
    (legacy, migrated)
}
