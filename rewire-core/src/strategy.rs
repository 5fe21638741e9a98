// Pluggable repair strategies with durable per-file attempt memory.
//
// The planner classifies the current build-failure signal into a fixed
// taxonomy and proposes an ordered plan of not-yet-attempted strategies;
// once everything relevant has been tried, the single catch-all LLM-guided
// strategy (explicitly unsafe, non-idempotent) is the fallback.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::MemoryScope;
use crate::error::{PatchError, Result, StrategyError};
use crate::llm::{PatchGenerator, strip_code_fences};
use crate::resolve::{ClassMap, CrossReferenceResolver, fix_package_declaration, infer_package};

// ── Failure taxonomy ────────────────────────────────────────────────

/// Classified build-failure signals, in planning priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnresolvedSymbol,
    MissingImport,
    MissingDependency,
    MissingMethod,
    TypeMismatch,
    FilenameClassMismatch,
    SyntaxError,
    DuplicateClass,
    PackageMismatch,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnresolvedSymbol => "unresolved_symbol",
            Self::MissingImport => "missing_import",
            Self::MissingDependency => "missing_dependency",
            Self::MissingMethod => "missing_method",
            Self::TypeMismatch => "type_mismatch",
            Self::FilenameClassMismatch => "filename_class_mismatch",
            Self::SyntaxError => "syntax_error",
            Self::DuplicateClass => "duplicate_class",
            Self::PackageMismatch => "package_mismatch",
        }
    }
}

/// Maps build-log lines onto the failure taxonomy.
#[derive(Debug)]
pub struct ErrorClassifier {
    patterns: Vec<(Regex, FailureKind)>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        let table = [
            (r"error: cannot find symbol", FailureKind::UnresolvedSymbol),
            (r"package .* does not exist", FailureKind::MissingImport),
            (r"error: cannot access .*", FailureKind::MissingDependency),
            (r"method .* not found", FailureKind::MissingMethod),
            (r"incompatible types", FailureKind::TypeMismatch),
            (
                r"class .* is public, should be declared in a file named",
                FailureKind::FilenameClassMismatch,
            ),
            (r"class, interface, or enum expected", FailureKind::SyntaxError),
            (r"duplicate class: .*", FailureKind::DuplicateClass),
            (
                r"package declaration does not match file path",
                FailureKind::PackageMismatch,
            ),
        ];
        Self {
            patterns: table
                .into_iter()
                .map(|(pattern, kind)| (Regex::new(pattern).expect("static pattern"), kind))
                .collect(),
        }
    }

    /// Distinct failure kinds present in the log, in taxonomy order.
    pub fn classify(&self, build_log: &str) -> Vec<FailureKind> {
        let mut kinds = BTreeSet::new();
        for line in build_log.lines() {
            for (pattern, kind) in &self.patterns {
                if pattern.is_match(line) {
                    kinds.insert(*kind);
                }
            }
        }
        kinds.into_iter().collect()
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ── Attempt memory ──────────────────────────────────────────────────

/// Durable record of which strategies have been tried per file.
///
/// Append-only per file until explicitly reset. Persisted as JSON on every
/// mutation so a crashed run leaves usable state behind.
#[derive(Debug)]
pub struct AttemptMemory {
    path: PathBuf,
    attempts: BTreeMap<String, Vec<String>>,
}

impl AttemptMemory {
    /// Load memory according to the configured scope: `Shared` picks up
    /// whatever previous runs left on disk, `PerRun` starts empty.
    pub fn load(path: &Path, scope: MemoryScope) -> Result<Self> {
        let attempts = if scope == MemoryScope::Shared && path.exists() {
            let text = std::fs::read_to_string(path).map_err(StrategyError::from)?;
            serde_json::from_str(&text).map_err(StrategyError::from)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            attempts,
        })
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.attempts).map_err(StrategyError::from)?;
        std::fs::write(&self.path, json).map_err(StrategyError::from)?;
        Ok(())
    }

    pub fn attempts(&self, file: &str) -> &[String] {
        self.attempts.get(file).map_or(&[], Vec::as_slice)
    }

    pub fn has_tried(&self, file: &str, strategy: &str) -> bool {
        self.attempts(file).iter().any(|s| s == strategy)
    }

    pub fn record(&mut self, file: &str, strategy: &str) -> Result<()> {
        let tried = self.attempts.entry(file.to_string()).or_default();
        if !tried.iter().any(|s| s == strategy) {
            tried.push(strategy.to_string());
        }
        self.save()
    }

    pub fn reset(&mut self, file: &str) -> Result<()> {
        self.attempts.remove(file);
        self.save()
    }
}

// ── Strategy interface ──────────────────────────────────────────────

/// Everything a strategy may consult. Strategies are stateless between
/// invocations; all state lives here or in [`AttemptMemory`].
#[derive(Debug)]
pub struct StrategyContext<'a> {
    pub migrated_root: &'a Path,
    pub class_map: &'a ClassMap,
    pub builtins: &'a BTreeSet<String>,
    pub build_log: &'a str,
    pub stitched_context: Option<&'a str>,
    pub generator: Option<&'a dyn PatchGenerator>,
}

/// Result of one strategy execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub success: bool,
    pub detail: String,
}

/// A named, registered repair operation.
#[async_trait::async_trait]
pub trait FixStrategy: Send + Sync + std::fmt::Debug {
    /// Stable registered name.
    fn name(&self) -> &'static str;

    /// The concerns this strategy touches (imports, package, fields, ...).
    fn touches(&self) -> &'static [&'static str];

    /// Conservative/reversible strategies are safe; `false` marks broad,
    /// non-idempotent rewrites.
    fn safe(&self) -> bool {
        true
    }

    /// Apply the strategy to one file (path relative to the migrated root).
    async fn apply(&self, file: &Path, ctx: &StrategyContext<'_>) -> Result<StrategyOutcome>;
}

// ── Concrete strategies ─────────────────────────────────────────────

/// Fix package declaration and resolve undefined types into imports.
#[derive(Debug)]
pub struct ResolveImports;

#[async_trait::async_trait]
impl FixStrategy for ResolveImports {
    fn name(&self) -> &'static str {
        "resolve_imports"
    }

    fn touches(&self) -> &'static [&'static str] {
        &["imports", "package"]
    }

    async fn apply(&self, file: &Path, ctx: &StrategyContext<'_>) -> Result<StrategyOutcome> {
        let resolver = CrossReferenceResolver::new(ctx.migrated_root, ctx.builtins.clone());
        let changed = resolver.resolve_and_patch(file, ctx.class_map)?;
        Ok(StrategyOutcome {
            success: changed,
            detail: if changed {
                "imports resolved".to_string()
            } else {
                "nothing to resolve".to_string()
            },
        })
    }
}

/// Declare private fields for undefined types that exist in the class map.
#[derive(Debug)]
pub struct InjectMissingFields;

#[async_trait::async_trait]
impl FixStrategy for InjectMissingFields {
    fn name(&self) -> &'static str {
        "inject_missing_fields"
    }

    fn touches(&self) -> &'static [&'static str] {
        &["fields", "imports"]
    }

    async fn apply(&self, file: &Path, ctx: &StrategyContext<'_>) -> Result<StrategyOutcome> {
        let full_path = ctx.migrated_root.join(file);
        let code = std::fs::read_to_string(&full_path).map_err(PatchError::from)?;

        let resolver = CrossReferenceResolver::new(ctx.migrated_root, ctx.builtins.clone());
        let candidates: Vec<String> = resolver
            .undefined_types(&code, &full_path)
            .into_iter()
            .filter(|name| ctx.class_map.contains_key(name))
            .filter(|name| !has_field_of_type(&code, name))
            .collect();

        if candidates.is_empty() {
            return Ok(StrategyOutcome {
                success: false,
                detail: "no injectable types".to_string(),
            });
        }

        let Some(brace) = code.find('{') else {
            return Ok(StrategyOutcome {
                success: false,
                detail: "no class body".to_string(),
            });
        };

        let fields: String = candidates
            .iter()
            .map(|name| format!("\n    private {name} {};", lower_first(name)))
            .collect();
        let mut patched = code.clone();
        patched.insert_str(brace + 1, &fields);
        std::fs::write(&full_path, patched).map_err(PatchError::from)?;

        // Newly referenced types need imports too.
        resolver.resolve_and_patch(file, ctx.class_map)?;

        info!(file = %file.display(), count = candidates.len(), "Injected missing fields");
        Ok(StrategyOutcome {
            success: true,
            detail: format!("injected {}", candidates.join(", ")),
        })
    }
}

/// Rewrite the package declaration to match the file's location.
#[derive(Debug)]
pub struct FixPackageDeclaration;

#[async_trait::async_trait]
impl FixStrategy for FixPackageDeclaration {
    fn name(&self) -> &'static str {
        "fix_package_declaration"
    }

    fn touches(&self) -> &'static [&'static str] {
        &["package"]
    }

    async fn apply(&self, file: &Path, ctx: &StrategyContext<'_>) -> Result<StrategyOutcome> {
        let Some(package) = infer_package(file) else {
            return Ok(StrategyOutcome {
                success: false,
                detail: "no source-layout marker in path".to_string(),
            });
        };
        let full_path = ctx.migrated_root.join(file);
        let code = std::fs::read_to_string(&full_path).map_err(PatchError::from)?;
        let patched = fix_package_declaration(&code, &package);
        let changed = patched != code;
        if changed {
            std::fs::write(&full_path, patched).map_err(PatchError::from)?;
        }
        Ok(StrategyOutcome {
            success: changed,
            detail: package,
        })
    }
}

/// Append `UnsupportedOperationException` stubs for methods the build log
/// says are missing.
#[derive(Debug)]
pub struct SuggestMethodStub;

#[async_trait::async_trait]
impl FixStrategy for SuggestMethodStub {
    fn name(&self) -> &'static str {
        "suggest_method_stub"
    }

    fn touches(&self) -> &'static [&'static str] {
        &["methods"]
    }

    async fn apply(&self, file: &Path, ctx: &StrategyContext<'_>) -> Result<StrategyOutcome> {
        let wanted = Regex::new(r"(?:symbol:\s+method|method)\s+(\w+)")
            .map_err(|e| PatchError::Pattern(e.to_string()))?;
        let names: BTreeSet<String> = wanted
            .captures_iter(ctx.build_log)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect();

        if names.is_empty() {
            return Ok(StrategyOutcome {
                success: false,
                detail: "no missing-method names in build log".to_string(),
            });
        }

        let full_path = ctx.migrated_root.join(file);
        let code = std::fs::read_to_string(&full_path).map_err(PatchError::from)?;
        let Some(closing) = code.rfind('}') else {
            return Ok(StrategyOutcome {
                success: false,
                detail: "no class body".to_string(),
            });
        };

        let stubs: String = names
            .iter()
            .filter(|name| !code.contains(&format!("{name}(")))
            .map(|name| {
                format!(
                    "    public void {name}() {{\n        throw new UnsupportedOperationException(\"{name} is not implemented yet\");\n    }}\n"
                )
            })
            .collect();
        if stubs.is_empty() {
            return Ok(StrategyOutcome {
                success: false,
                detail: "all named methods already present".to_string(),
            });
        }

        let mut patched = code;
        patched.insert_str(closing, &stubs);
        std::fs::write(&full_path, patched).map_err(PatchError::from)?;
        Ok(StrategyOutcome {
            success: true,
            detail: format!("stubbed {}", names.into_iter().collect::<Vec<_>>().join(", ")),
        })
    }
}

/// Catch-all: hand the broken file plus stitched context to the patch
/// generator and take its whole-file answer. Unsafe: may rewrite broadly
/// and is not idempotent.
#[derive(Debug)]
pub struct LlmGuidedFix;

#[async_trait::async_trait]
impl FixStrategy for LlmGuidedFix {
    fn name(&self) -> &'static str {
        "llm_guided_fix"
    }

    fn touches(&self) -> &'static [&'static str] {
        &["full_context"]
    }

    fn safe(&self) -> bool {
        false
    }

    async fn apply(&self, file: &Path, ctx: &StrategyContext<'_>) -> Result<StrategyOutcome> {
        let Some(generator) = ctx.generator else {
            return Ok(StrategyOutcome {
                success: false,
                detail: "no patch generator configured".to_string(),
            });
        };

        let full_path = ctx.migrated_root.join(file);
        let code = std::fs::read_to_string(&full_path).map_err(PatchError::from)?;
        let prompt = format!(
            "Fix this Java file so it compiles. Return only the complete corrected file.\n\n\
             Build failure:\n{}\n\nBroken file:\n{}\n\nContext:\n{}",
            ctx.build_log,
            code,
            ctx.stitched_context.unwrap_or("")
        );

        let (raw, usage) = generator.generate(&prompt).await?;
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Patch generated"
        );

        let fixed = strip_code_fences(&raw);
        if fixed.trim().is_empty() {
            return Ok(StrategyOutcome {
                success: false,
                detail: "generator returned empty patch".to_string(),
            });
        }
        std::fs::write(&full_path, format!("{fixed}\n")).map_err(PatchError::from)?;
        Ok(StrategyOutcome {
            success: true,
            detail: format!("rewrote file via {}", generator.model_id()),
        })
    }
}

fn has_field_of_type(code: &str, type_name: &str) -> bool {
    Regex::new(&format!(r"\b{}\s+\w+\s*;", regex::escape(type_name)))
        .is_ok_and(|re| re.is_match(code))
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().collect::<String>() + chars.as_str()
    })
}

// ── Registry ────────────────────────────────────────────────────────

/// Named strategy registry. Registered once at startup; strategies are
/// stateless between invocations.
#[derive(Debug)]
pub struct FixStrategyRegistry {
    strategies: Vec<Box<dyn FixStrategy>>,
}

impl FixStrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Registry with the default strategy set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ResolveImports));
        registry.register(Box::new(InjectMissingFields));
        registry.register(Box::new(FixPackageDeclaration));
        registry.register(Box::new(SuggestMethodStub));
        registry.register(Box::new(LlmGuidedFix));
        registry
    }

    pub fn register(&mut self, strategy: Box<dyn FixStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn get(&self, name: &str) -> Option<&dyn FixStrategy> {
        self.strategies
            .iter()
            .find(|s| s.name() == name)
            .map(|s| &**s)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn execute(
        &self,
        name: &str,
        file: &Path,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutcome> {
        let Some(strategy) = self.get(name) else {
            return Err(StrategyError::Unknown(name.to_string()).into());
        };
        info!(strategy = name, file = %file.display(), "Executing strategy");
        strategy.apply(file, ctx).await
    }
}

impl Default for FixStrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ── Planner ─────────────────────────────────────────────────────────

/// An ordered repair plan for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixPlan {
    pub strategies: Vec<String>,
    pub reasoning: String,
    pub confidence: f64,
}

/// Maps classified failures onto not-yet-attempted strategies.
#[derive(Debug, Default)]
pub struct FixPlanner {
    classifier: ErrorClassifier,
}

impl FixPlanner {
    pub fn new() -> Self {
        Self {
            classifier: ErrorClassifier::new(),
        }
    }

    pub fn generate_plan(&self, file: &str, build_log: &str, memory: &AttemptMemory) -> FixPlan {
        let failures = self.classifier.classify(build_log);
        let mut strategies = Vec::new();

        for failure in &failures {
            let candidate = match failure {
                FailureKind::MissingImport => Some("resolve_imports"),
                FailureKind::UnresolvedSymbol => Some("inject_missing_fields"),
                FailureKind::MissingMethod => Some("suggest_method_stub"),
                FailureKind::PackageMismatch | FailureKind::FilenameClassMismatch => {
                    Some("fix_package_declaration")
                }
                _ => None,
            };
            if let Some(name) = candidate {
                if !memory.has_tried(file, name) && !strategies.iter().any(|s| s == name) {
                    strategies.push(name.to_string());
                }
            }
        }

        if strategies.is_empty() && !memory.has_tried(file, "llm_guided_fix") {
            // Everything relevant was tried (or nothing classified) — fall
            // back to the unsafe catch-all. An empty plan after that means
            // the strategy space is exhausted for this file.
            warn!(file, "No untried targeted strategy; falling back to llm_guided_fix");
            strategies.push("llm_guided_fix".to_string());
        }

        #[allow(clippy::cast_precision_loss)]
        let confidence = 0.75 + 0.05 * strategies.len() as f64;
        FixPlan {
            reasoning: format!(
                "{} classified failure(s), {} prior attempt(s)",
                failures.len(),
                memory.attempts(file).len()
            ),
            confidence,
            strategies,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rewire_graphs::builtin_types;

    #[test]
    fn classifier_maps_known_errors() {
        let classifier = ErrorClassifier::new();
        let log = "Foo.java:10: error: cannot find symbol\n  symbol: class Foo\npackage com.acme does not exist\n";
        let kinds = classifier.classify(log);
        assert_eq!(
            kinds,
            [FailureKind::UnresolvedSymbol, FailureKind::MissingImport]
        );
    }

    #[test]
    fn classifier_dedupes_repeated_lines() {
        let classifier = ErrorClassifier::new();
        let log = "error: cannot find symbol class Foo\nerror: cannot find symbol class Foo\n";
        assert_eq!(classifier.classify(log), [FailureKind::UnresolvedSymbol]);
    }

    #[test]
    fn classifier_ignores_unknown_noise() {
        let classifier = ErrorClassifier::new();
        assert!(classifier.classify("BUILD SUCCESSFUL in 2s\n").is_empty());
    }

    #[test]
    fn memory_is_append_only_until_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let mut memory = AttemptMemory::load(&path, MemoryScope::PerRun).unwrap();

        memory.record("Foo.java", "resolve_imports").unwrap();
        memory.record("Foo.java", "resolve_imports").unwrap();
        assert_eq!(memory.attempts("Foo.java"), ["resolve_imports"]);

        memory.record("Foo.java", "inject_missing_fields").unwrap();
        assert_eq!(memory.attempts("Foo.java").len(), 2);

        memory.reset("Foo.java").unwrap();
        assert!(memory.attempts("Foo.java").is_empty());
    }

    #[test]
    fn shared_scope_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let mut memory = AttemptMemory::load(&path, MemoryScope::Shared).unwrap();
        memory.record("Foo.java", "resolve_imports").unwrap();
        drop(memory);

        let reloaded = AttemptMemory::load(&path, MemoryScope::Shared).unwrap();
        assert!(reloaded.has_tried("Foo.java", "resolve_imports"));

        // Per-run scope ignores the same file on disk.
        let fresh = AttemptMemory::load(&path, MemoryScope::PerRun).unwrap();
        assert!(!fresh.has_tried("Foo.java", "resolve_imports"));
    }

    #[test]
    fn planner_proposes_untried_strategies_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory =
            AttemptMemory::load(&dir.path().join("memory.json"), MemoryScope::PerRun).unwrap();
        let planner = FixPlanner::new();
        let log = "error: cannot find symbol\npackage com.acme does not exist\n";

        let plan = planner.generate_plan("Foo.java", log, &memory);
        assert_eq!(plan.strategies, ["inject_missing_fields", "resolve_imports"]);

        memory.record("Foo.java", "inject_missing_fields").unwrap();
        let plan = planner.generate_plan("Foo.java", log, &memory);
        assert_eq!(plan.strategies, ["resolve_imports"]);
    }

    #[test]
    fn planner_falls_back_to_llm_when_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory =
            AttemptMemory::load(&dir.path().join("memory.json"), MemoryScope::PerRun).unwrap();
        memory.record("Foo.java", "inject_missing_fields").unwrap();

        let planner = FixPlanner::new();
        let plan = planner.generate_plan("Foo.java", "error: cannot find symbol\n", &memory);
        assert_eq!(plan.strategies, ["llm_guided_fix"]);
    }

    #[test]
    fn exhausted_strategy_space_yields_empty_plan() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory =
            AttemptMemory::load(&dir.path().join("memory.json"), MemoryScope::PerRun).unwrap();
        memory.record("Foo.java", "inject_missing_fields").unwrap();
        memory.record("Foo.java", "llm_guided_fix").unwrap();

        let planner = FixPlanner::new();
        let plan = planner.generate_plan("Foo.java", "error: cannot find symbol\n", &memory);
        assert!(plan.strategies.is_empty());
    }

    #[test]
    fn registry_defaults_and_safety_flags() {
        let registry = FixStrategyRegistry::with_defaults();
        assert!(registry.get("resolve_imports").unwrap().safe());
        assert!(!registry.get("llm_guided_fix").unwrap().safe());
        assert!(registry.get("nonsense").is_none());
        assert!(registry.names().contains(&"fix_package_declaration"));
    }

    #[tokio::test]
    async fn unknown_strategy_is_an_error() {
        let registry = FixStrategyRegistry::with_defaults();
        let dir = tempfile::tempdir().unwrap();
        let builtins = builtin_types(&[]);
        let class_map = ClassMap::new();
        let ctx = StrategyContext {
            migrated_root: dir.path(),
            class_map: &class_map,
            builtins: &builtins,
            build_log: "",
            stitched_context: None,
            generator: None,
        };
        let err = registry
            .execute("nonsense", Path::new("Foo.java"), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown strategy"));
    }

    #[tokio::test]
    async fn inject_missing_fields_adds_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("src/main/java/com/acme");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(
            root.join("OrderService.java"),
            "package com.acme;\n\npublic class OrderService {\n    void go() { OrderRepository.save(); }\n}\n",
        )
        .unwrap();
        std::fs::write(
            root.join("OrderRepository.java"),
            "package com.acme;\n\npublic class OrderRepository {\n    public void save() {}\n}\n",
        )
        .unwrap();

        let builtins = builtin_types(&[]);
        let class_map = crate::resolve::build_class_map(dir.path());
        let ctx = StrategyContext {
            migrated_root: dir.path(),
            class_map: &class_map,
            builtins: &builtins,
            build_log: "error: cannot find symbol\n  symbol: class OrderRepository\n",
            stitched_context: None,
            generator: None,
        };

        let file = Path::new("src/main/java/com/acme/OrderService.java");
        let outcome = InjectMissingFields.apply(file, &ctx).await.unwrap();
        assert!(outcome.success, "detail: {}", outcome.detail);

        let patched = std::fs::read_to_string(dir.path().join(file)).unwrap();
        assert!(
            patched.contains("private OrderRepository orderRepository;"),
            "got: {patched}"
        );
    }

    #[tokio::test]
    async fn method_stub_appended_from_build_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("OrderService.java"),
            "public class OrderService {\n}\n",
        )
        .unwrap();

        let builtins = builtin_types(&[]);
        let class_map = ClassMap::new();
        let ctx = StrategyContext {
            migrated_root: dir.path(),
            class_map: &class_map,
            builtins: &builtins,
            build_log: "error: method renderInvoice not found\n",
            stitched_context: None,
            generator: None,
        };

        let outcome = SuggestMethodStub
            .apply(Path::new("OrderService.java"), &ctx)
            .await
            .unwrap();
        assert!(outcome.success);

        let patched = std::fs::read_to_string(dir.path().join("OrderService.java")).unwrap();
        assert!(patched.contains("public void renderInvoice()"));
        assert!(patched.contains("UnsupportedOperationException"));
    }
}
