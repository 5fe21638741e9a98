use std::path::Path;

use rewire_core::config::{MemoryScope, RewireConfig};
use rewire_core::orchestrate::RetryOrchestrator;
use rewire_core::patch::WiringPatcher;
use rewire_core::pipeline::ReconcilePipeline;
use rewire_core::report::{Confidence, MigrationReporter};
use rewire_core::strategy::{AttemptMemory, FixStrategyRegistry};
use rewire_graphs::builtin_types;
use rewire_graphs::extract::extract_tree;
use rewire_graphs::graph::RelationshipGraph;
use rewire_test::{ScriptedBuild, TableEmbedder, TestTrees, build_indexes};

fn wiring_patcher<'a>(
    trees: &TestTrees,
    migrated_index: &'a rewire_core::index::SimilarityIndex,
    legacy_index: &'a rewire_core::index::SimilarityIndex,
    embedder: &'a TableEmbedder,
) -> WiringPatcher<'a> {
    WiringPatcher::new(
        &trees.migrated_root(),
        &trees.legacy_root(),
        migrated_index,
        legacy_index,
        embedder,
        &builtin_types(&[]),
        0.7,
        0.75,
    )
    .unwrap()
}

// ── Extraction properties ────────────────────────────────────────

#[test]
fn extraction_is_idempotent() {
    let trees = TestTrees::order_system();
    let builtins = builtin_types(&[]);

    let first = extract_tree(&trees.migrated_root(), &builtins);
    let second = extract_tree(&trees.migrated_root(), &builtins);

    let graph_a = RelationshipGraph::from_relations(&first.relations);
    let graph_b = RelationshipGraph::from_relations(&second.relations);
    assert_eq!(graph_a.to_value(), graph_b.to_value());
    assert!(first.errors.is_empty());
}

// ── Scenario A: two-tier resolution ──────────────────────────────

#[tokio::test]
async fn scenario_a_prefers_migrated_candidate_over_port() {
    let trees = TestTrees::order_system();
    let embedder = TableEmbedder::order_system();
    let (legacy_index, migrated_index) = build_indexes(&trees, &embedder).await;

    let patcher = wiring_patcher(&trees, &migrated_index, &legacy_index, &embedder);
    let mut reporter = MigrationReporter::new();
    let outcome = patcher.recursive_fix(10, &mut reporter).await.unwrap();
    assert!(outcome.converged);

    // The field was rewired to the migrated-tree candidate at score 0.82.
    let service = trees.read_migrated("com/acme/OrderService.java");
    assert!(
        service.contains("@Autowired private OrderRepository repo;"),
        "got: {service}"
    );

    // Same-tree preference: nothing was ported.
    assert!(!trees.migrated_path("com/acme/LegacyRepo.java").exists());
    let event = reporter
        .events
        .iter()
        .find(|e| e.category == "field_injection")
        .expect("rewire event");
    assert_eq!(event.confidence, Confidence::High);
    assert!(event.score.unwrap() > 0.8);
}

#[tokio::test]
async fn scenario_a_legacy_fallback_ports_with_marker() {
    let trees = TestTrees::empty();
    trees.write_legacy(
        "com/acme/LegacyRepo.java",
        "package com.acme;\n\npublic class LegacyRepo {\n    public void save() {}\n}\n",
    );
    trees.write_migrated(
        "com/acme/OrderService.java",
        "package com.acme;\n\npublic class OrderService {\n    @Autowired private LegacyRepo repo;\n}\n",
    );

    let embedder = TableEmbedder::order_system();
    let (legacy_index, migrated_index) = build_indexes(&trees, &embedder).await;

    let patcher = wiring_patcher(&trees, &migrated_index, &legacy_index, &embedder);
    let mut reporter = MigrationReporter::new();
    patcher.recursive_fix(10, &mut reporter).await.unwrap();

    // No migrated candidate cleared the primary threshold, so the legacy
    // file was ported at its mirrored path with the review marker.
    let ported = trees.migrated_path("com/acme/LegacyRepo.java");
    assert!(ported.exists());
    let content = std::fs::read_to_string(&ported).unwrap();
    assert!(content.starts_with("// [ported from legacy: review needed]"));
    assert!(content.contains("public class LegacyRepo"));

    // The reference still reads `LegacyRepo` — ported under its own name.
    let service = trees.read_migrated("com/acme/OrderService.java");
    assert!(service.contains("private LegacyRepo repo;"));

    assert!(
        reporter
            .events
            .iter()
            .any(|e| e.category == "legacy_class_ported")
    );
}

#[tokio::test]
async fn porting_never_overwrites_migrated_file() {
    let trees = TestTrees::empty();
    trees.write_legacy(
        "com/acme/LegacyRepo.java",
        "package com.acme;\n\npublic class LegacyRepo { /* legacy body */ }\n",
    );
    trees.write_migrated(
        "com/acme/OrderService.java",
        "package com.acme;\n\npublic class OrderService {\n    @Autowired private LegacyRepo repo;\n}\n",
    );
    // A hand-migrated file already sits at the mirrored destination but was
    // never indexed.
    trees.write_migrated(
        "com/acme/LegacyRepo.java",
        "package com.acme;\n\npublic class LegacyRepo { /* hand migrated */ }\n",
    );

    let embedder = TableEmbedder::order_system();
    let (legacy_index, _) = build_indexes(&trees, &embedder).await;
    // Index the migrated tree as if the hand-migrated file did not exist yet.
    let migrated_index = rewire_core::index::SimilarityIndex::new();

    let patcher = wiring_patcher(&trees, &migrated_index, &legacy_index, &embedder);
    let mut reporter = MigrationReporter::new();
    patcher.recursive_fix(5, &mut reporter).await.unwrap();

    let content = trees.read_migrated("com/acme/LegacyRepo.java");
    assert!(content.contains("/* hand migrated */"), "got: {content}");
    assert!(!content.contains("review needed"));
}

// ── Fixed-point termination ──────────────────────────────────────

#[tokio::test]
async fn wiring_fix_terminates_and_is_idempotent() {
    let trees = TestTrees::order_system();
    let embedder = TableEmbedder::order_system();
    let (legacy_index, migrated_index) = build_indexes(&trees, &embedder).await;

    let patcher = wiring_patcher(&trees, &migrated_index, &legacy_index, &embedder);
    let mut reporter = MigrationReporter::new();

    let outcome = patcher.recursive_fix(10, &mut reporter).await.unwrap();
    assert!(outcome.passes_run <= 10);
    assert!(outcome.converged);

    // After termination a further pass yields zero changes.
    let further = patcher.scan_all(&mut reporter).await.unwrap();
    assert_eq!(further, 0);
}

// ── Pipeline convergence ─────────────────────────────────────────

#[tokio::test]
async fn pipeline_converges_after_porting_missing_neighbor() {
    let trees = TestTrees::empty();
    trees.write_legacy(
        "com/acme/OrderService.java",
        "package com.acme;\n\npublic class OrderService {\n    @Autowired private AuditLog audit;\n}\n",
    );
    trees.write_legacy(
        "com/acme/AuditLog.java",
        "package com.acme;\n\npublic class AuditLog {\n    public void append(String line) {}\n}\n",
    );
    trees.write_migrated(
        "com/acme/OrderService.java",
        "package com.acme;\n\npublic class OrderService {\n    @Autowired private AuditLog audit;\n}\n",
    );

    let embedder = TableEmbedder::order_system();
    let (legacy_index, migrated_index) = build_indexes(&trees, &embedder).await;
    let config = RewireConfig::default();

    let pipeline = ReconcilePipeline::new(
        &trees.legacy_root(),
        &trees.migrated_root(),
        &legacy_index,
        &migrated_index,
        &embedder,
        &config,
    );
    let mut reporter = MigrationReporter::new();
    let result = pipeline.run(&mut reporter).await.unwrap();

    assert!(result.converged, "report: {:?}", result.report);
    assert!(result.passes_run <= config.passes.max_reconcile_passes);
    assert!(result.wiring_changes >= 1, "the port is a change");
    assert!(trees.migrated_path("com/acme/AuditLog.java").exists());
}

#[tokio::test]
async fn pipeline_surfaces_rename_as_missing_plus_extra() {
    let trees = TestTrees::order_system();
    let embedder = TableEmbedder::order_system();
    let (legacy_index, migrated_index) = build_indexes(&trees, &embedder).await;
    let config = RewireConfig::default();

    let pipeline = ReconcilePipeline::new(
        &trees.legacy_root(),
        &trees.migrated_root(),
        &legacy_index,
        &migrated_index,
        &embedder,
        &config,
    );
    let mut reporter = MigrationReporter::new();
    let result = pipeline.run(&mut reporter).await.unwrap();

    // The repository rename is deliberately reported set-wise: LegacyRepo
    // missing, OrderRepository extra. The run terminates with the report
    // surfaced rather than failing.
    assert!(!result.converged);
    let entry = &result.report.entries["OrderService"];
    assert!(entry.missing.contains("LegacyRepo"));
    assert!(entry.extra.contains("OrderRepository"));
    assert!(entry.missing.is_disjoint(&entry.extra));
}

// ── Scenario B: classifier → planner → memory ────────────────────

#[tokio::test]
async fn scenario_b_unresolved_symbol_plans_field_injection() {
    let trees = TestTrees::empty();
    trees.write_migrated(
        "com/acme/Foo.java",
        "package com.acme;\n\npublic class Foo {\n    private String name;\n}\n",
    );

    let build_log = "Foo.java:4: error: cannot find symbol\nFoo.java:9: error: cannot find symbol\n  symbol: class Foo\n";
    let build = ScriptedBuild::always_failing(build_log);
    let registry = FixStrategyRegistry::with_defaults();
    let orchestrator = RetryOrchestrator::new(
        &trees.migrated_root(),
        &trees.legacy_root(),
        builtin_types(&[]),
        &build,
        None,
        &registry,
        &trees.dir.path().join("history"),
        1,
    );

    let mut memory = AttemptMemory::load(
        &trees.dir.path().join("memory.json"),
        MemoryScope::PerRun,
    )
    .unwrap();
    let file = Path::new("src/main/java/com/acme/Foo.java");
    let record = orchestrator.process_file(file, &mut memory).await.unwrap();

    // unresolved_symbol classified → inject_missing_fields planned first
    assert_eq!(record.strategies_tried[0], "inject_missing_fields");
    assert!(memory.has_tried(&file.display().to_string(), "inject_missing_fields"));
}

// ── Scenario C: type alignment ───────────────────────────────────

#[test]
fn scenario_c_aligns_get_id_to_int() {
    let trees = TestTrees::empty();
    trees.write_migrated(
        "com/acme/Order.java",
        "package com.acme;\n\npublic class Order {\n    public String getId() {\n        return id;\n    }\n}\n",
    );
    trees.write_legacy(
        "com/acme/Order.java",
        "package com.acme;\n\npublic class Order {\n    public int getId() {\n        return id;\n    }\n}\n",
    );

    let aligner = rewire_core::align::TypeAligner::new(
        &trees.migrated_root(),
        &trees.legacy_root(),
        0.75,
    );
    let mut reporter = MigrationReporter::new();
    let outcome = aligner.recursive_fix(3, &mut reporter).unwrap();
    assert!(outcome.converged);

    let patched = trees.read_migrated("com/acme/Order.java");
    assert!(patched.contains("public int getId()"), "got: {patched}");
    assert!(
        patched.contains("return Integer.parseInt(id);"),
        "got: {patched}"
    );
}

// ── Scenario D: shim fallback ────────────────────────────────────

#[tokio::test]
async fn scenario_d_shim_after_exhausted_retries() {
    let trees = TestTrees::empty();
    trees.write_migrated(
        "com/acme/X.java",
        "package com.acme;\n\npublic class X {\n    broken {\n}\n",
    );

    let build = ScriptedBuild::always_failing("X.java:4: error: class, interface, or enum expected\n");
    let registry = FixStrategyRegistry::with_defaults();
    let orchestrator = RetryOrchestrator::new(
        &trees.migrated_root(),
        &trees.legacy_root(),
        builtin_types(&[]),
        &build,
        None,
        &registry,
        &trees.dir.path().join("history"),
        2,
    );

    let mut memory = AttemptMemory::load(
        &trees.dir.path().join("memory.json"),
        MemoryScope::PerRun,
    )
    .unwrap();
    let file = Path::new("src/main/java/com/acme/X.java");
    let record = orchestrator.process_file(file, &mut memory).await.unwrap();

    assert!(!record.success);
    assert!(record.shim_generated);

    // The stub's declared class name matches the file stem.
    let shim = trees.read_migrated("com/acme/X.java");
    assert!(shim.contains("public class X"), "got: {shim}");

    // History record persisted with the terminal flags.
    let history = trees.dir.path().join("history/X.json");
    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(history).unwrap()).unwrap();
    assert_eq!(stored["success"], false);
    assert_eq!(stored["shim_generated"], true);
}

// ── Audit trail ──────────────────────────────────────────────────

#[tokio::test]
async fn audit_trail_explains_unresolved_references() {
    let trees = TestTrees::empty();
    trees.write_migrated(
        "com/acme/OrderService.java",
        "package com.acme;\n\npublic class OrderService {\n    @Autowired private MysteryGadget gadget;\n}\n",
    );

    let embedder = TableEmbedder::order_system();
    let (legacy_index, migrated_index) = build_indexes(&trees, &embedder).await;

    let patcher = wiring_patcher(&trees, &migrated_index, &legacy_index, &embedder);
    let mut reporter = MigrationReporter::new();
    let outcome = patcher.recursive_fix(5, &mut reporter).await.unwrap();
    assert!(outcome.converged, "nothing to change, still terminates");

    let unresolved: Vec<_> = reporter.unresolved().collect();
    assert!(
        unresolved
            .iter()
            .any(|e| e.category == "unresolved_field_injection"),
        "events: {:?}",
        reporter.events
    );

    // The report is a first-class artifact.
    let report_path = trees.dir.path().join("rewire-report.json");
    reporter.write_report(&report_path).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
    assert!(value["events"].as_array().is_some_and(|a| !a.is_empty()));
}
