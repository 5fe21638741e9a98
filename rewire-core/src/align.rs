// Return-type alignment between matched legacy/migrated method pairs.
//
// Matching is exact qualified signature first, then a name-substring
// fallback. When a pair's declared return types differ, the migrated
// declaration is patched and trivially-recognizable `return <ident>;`
// statements are coerced through a small fixed table of conversion idioms.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use rewire_graphs::MethodSig;
use rewire_graphs::extract::extract_methods;

use crate::error::{PatchError, Result};
use crate::patch::FixOutcome;
use crate::report::{Confidence, RewireEvent, RewireObserver};

/// Similarity assigned to a name-substring fallback match.
const SUBSTRING_MATCH_SCORE: f64 = 0.8;

/// `(from, to, wrapper)` conversion idioms applied to `return <ident>;`.
const CONVERSIONS: &[(&str, &str, &str)] = &[
    ("String", "int", "Integer.parseInt"),
    ("int", "String", "String.valueOf"),
    ("String", "long", "Long.parseLong"),
    ("long", "String", "String.valueOf"),
];

/// Aligns migrated method return types to their legacy counterparts.
#[derive(Debug)]
pub struct TypeAligner {
    migrated_root: PathBuf,
    legacy_root: PathBuf,
    legacy_threshold: f64,
}

impl TypeAligner {
    pub fn new(migrated_root: &Path, legacy_root: &Path, legacy_threshold: f64) -> Self {
        Self {
            migrated_root: migrated_root.to_path_buf(),
            legacy_root: legacy_root.to_path_buf(),
            legacy_threshold,
        }
    }

    /// Fixed-point loop with the same zero-change termination rule as the
    /// wiring patcher.
    #[instrument(skip_all, name = "type_align")]
    pub fn recursive_fix(
        &self,
        max_passes: u32,
        observer: &mut dyn RewireObserver,
    ) -> Result<FixOutcome> {
        let mut total_changes = 0;
        for pass in 1..=max_passes {
            let fixes = self.scan_and_fix_all(observer)?;
            info!(pass, fixes, "Type alignment pass complete");
            total_changes += fixes;
            if fixes == 0 {
                return Ok(FixOutcome {
                    passes_run: pass,
                    total_changes,
                    converged: true,
                });
            }
        }
        warn!(max_passes, "Type alignment budget exhausted");
        Ok(FixOutcome {
            passes_run: max_passes,
            total_changes,
            converged: false,
        })
    }

    fn scan_and_fix_all(&self, observer: &mut dyn RewireObserver) -> Result<usize> {
        let migrated = collect_methods(&self.migrated_root);
        let legacy = collect_methods(&self.legacy_root);

        let mut fixes = 0;
        for (key, method) in &migrated {
            let Some((legacy_method, similarity)) = best_legacy_match(key, method, &legacy) else {
                continue;
            };
            if similarity < self.legacy_threshold {
                continue;
            }
            if method.return_type == legacy_method.return_type {
                continue;
            }
            if self.patch_return_type(method, &legacy_method.return_type)? {
                fixes += 1;
                observer.record(RewireEvent {
                    file: method.file_path.clone(),
                    original: format!("{} {}", method.return_type, method.signature()),
                    replacement: Some(format!(
                        "{} {}",
                        legacy_method.return_type,
                        method.signature()
                    )),
                    category: "type_alignment".to_string(),
                    reason: "aligned_to_legacy".to_string(),
                    confidence: Confidence::from_score(similarity),
                    score: Some(similarity),
                });
            }
        }
        Ok(fixes)
    }

    /// Patch one method's declared return type and coerce simple return
    /// statements when the (old, new) pair has a known conversion idiom.
    /// Only this one family is patched per matched pair per pass.
    fn patch_return_type(&self, method: &MethodSig, target_type: &str) -> Result<bool> {
        let code = std::fs::read_to_string(&method.file_path).map_err(PatchError::from)?;

        let declaration = Regex::new(&format!(
            r"((public|protected|private)\s+)([\w<>\[\]]+)(\s+{}\s*\([^)]*\))",
            regex::escape(&method.name)
        ))
        .map_err(|e| PatchError::Pattern(e.to_string()))?;

        let mut patched = declaration
            .replacen(&code, 1, format!("${{1}}{target_type}${{4}}"))
            .to_string();
        if patched == code {
            debug!(method = %method.qualified(), "Declaration not found for patching");
            return Ok(false);
        }

        if let Some((_, _, wrapper)) = CONVERSIONS
            .iter()
            .find(|(from, to, _)| *from == method.return_type && *to == target_type)
        {
            let return_stmt = Regex::new(r"return\s+(\w+);")
                .map_err(|e| PatchError::Pattern(e.to_string()))?;
            patched = return_stmt
                .replace_all(&patched, format!("return {wrapper}($1);"))
                .to_string();
        }

        std::fs::write(&method.file_path, patched).map_err(PatchError::from)?;
        debug!(
            method = %method.qualified(),
            target = target_type,
            "Patched return type"
        );
        Ok(true)
    }
}

fn collect_methods(root: &Path) -> BTreeMap<String, MethodSig> {
    let mut files = Vec::new();
    collect_java_files(root, &mut files);
    files.sort();

    let mut methods = BTreeMap::new();
    for file in files {
        let Ok(source) = std::fs::read_to_string(&file) else {
            warn!(file = %file.display(), "Skipping unreadable file");
            continue;
        };
        match extract_methods(&source, &file) {
            Ok(extracted) => {
                for method in extracted {
                    methods.insert(method.qualified(), method);
                }
            }
            Err(e) => warn!(file = %file.display(), error = %e, "Skipping unparseable file"),
        }
    }
    methods
}

/// Exact qualified signature first, else the first legacy key containing the
/// migrated `Class.name` prefix, else no match.
fn best_legacy_match(
    key: &str,
    method: &MethodSig,
    legacy: &BTreeMap<String, MethodSig>,
) -> Option<(MethodSig, f64)> {
    if let Some(exact) = legacy.get(key) {
        return Some((exact.clone(), 1.0));
    }
    let name_prefix = format!("{}.{}(", method.class_name, method.name);
    legacy
        .iter()
        .find(|(legacy_key, _)| legacy_key.contains(&name_prefix))
        .map(|(_, m)| (m.clone(), SUBSTRING_MATCH_SCORE))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MigrationReporter;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("migrated")).unwrap();
            std::fs::create_dir_all(dir.path().join("legacy")).unwrap();
            Self { dir }
        }

        fn write(&self, tree: &str, name: &str, code: &str) -> PathBuf {
            let path = self.dir.path().join(tree).join(name);
            std::fs::write(&path, code).unwrap();
            path
        }

        fn aligner(&self) -> TypeAligner {
            TypeAligner::new(
                &self.dir.path().join("migrated"),
                &self.dir.path().join("legacy"),
                0.75,
            )
        }
    }

    #[test]
    fn aligns_string_to_int_with_conversion() {
        let fixture = Fixture::new();
        let migrated = fixture.write(
            "migrated",
            "Order.java",
            "public class Order {\n    public String getId() {\n        return id;\n    }\n}\n",
        );
        fixture.write(
            "legacy",
            "Order.java",
            "public class Order {\n    public int getId() {\n        return id;\n    }\n}\n",
        );

        let mut reporter = MigrationReporter::new();
        let outcome = fixture.aligner().recursive_fix(3, &mut reporter).unwrap();
        assert!(outcome.converged);
        assert!(outcome.total_changes >= 1);

        let patched = std::fs::read_to_string(&migrated).unwrap();
        assert!(patched.contains("public int getId()"), "got: {patched}");
        assert!(patched.contains("return Integer.parseInt(id);"), "got: {patched}");
        assert!(
            reporter
                .events
                .iter()
                .any(|e| e.category == "type_alignment" && e.confidence == Confidence::High)
        );
    }

    #[test]
    fn int_to_string_uses_value_of() {
        let fixture = Fixture::new();
        let migrated = fixture.write(
            "migrated",
            "Order.java",
            "public class Order {\n    public int getCode() {\n        return code;\n    }\n}\n",
        );
        fixture.write(
            "legacy",
            "Order.java",
            "public class Order {\n    public String getCode() {\n        return code;\n    }\n}\n",
        );

        let mut reporter = MigrationReporter::new();
        fixture.aligner().recursive_fix(3, &mut reporter).unwrap();

        let patched = std::fs::read_to_string(&migrated).unwrap();
        assert!(patched.contains("public String getCode()"));
        assert!(patched.contains("return String.valueOf(code);"));
    }

    #[test]
    fn matching_return_types_need_no_fix() {
        let fixture = Fixture::new();
        let code = "public class Order {\n    public String getId() {\n        return id;\n    }\n}\n";
        let migrated = fixture.write("migrated", "Order.java", code);
        fixture.write("legacy", "Order.java", code);

        let mut reporter = MigrationReporter::new();
        let outcome = fixture.aligner().recursive_fix(3, &mut reporter).unwrap();
        assert!(outcome.converged);
        assert_eq!(outcome.total_changes, 0);
        assert_eq!(std::fs::read_to_string(&migrated).unwrap(), code);
    }

    #[test]
    fn substring_fallback_matches_renamed_params() {
        let fixture = Fixture::new();
        let migrated = fixture.write(
            "migrated",
            "Order.java",
            "public class Order {\n    public String getId(int retries) {\n        return id;\n    }\n}\n",
        );
        // Same class + method name, different parameter name → substring tier.
        fixture.write(
            "legacy",
            "Order.java",
            "public class Order {\n    public int getId(int attempts) {\n        return id;\n    }\n}\n",
        );

        let mut reporter = MigrationReporter::new();
        fixture.aligner().recursive_fix(3, &mut reporter).unwrap();

        let patched = std::fs::read_to_string(&migrated).unwrap();
        assert!(patched.contains("public int getId(int retries)"), "got: {patched}");
        let event = reporter
            .events
            .iter()
            .find(|e| e.category == "type_alignment")
            .unwrap();
        assert_eq!(event.confidence, Confidence::Medium);
    }

    #[test]
    fn unknown_conversion_patches_declaration_only() {
        let fixture = Fixture::new();
        let migrated = fixture.write(
            "migrated",
            "Order.java",
            "public class Order {\n    public String getOwner() {\n        return owner;\n    }\n}\n",
        );
        fixture.write(
            "legacy",
            "Order.java",
            "public class Order {\n    public Customer getOwner() {\n        return owner;\n    }\n}\n",
        );

        let mut reporter = MigrationReporter::new();
        fixture.aligner().recursive_fix(3, &mut reporter).unwrap();

        let patched = std::fs::read_to_string(&migrated).unwrap();
        assert!(patched.contains("public Customer getOwner()"));
        assert!(patched.contains("return owner;"), "no idiom for String→Customer");
    }

    #[test]
    fn terminates_within_budget() {
        let fixture = Fixture::new();
        fixture.write(
            "migrated",
            "Order.java",
            "public class Order {\n    public String getId() {\n        return id;\n    }\n}\n",
        );
        fixture.write(
            "legacy",
            "Order.java",
            "public class Order {\n    public int getId() {\n        return id;\n    }\n}\n",
        );

        let mut reporter = MigrationReporter::new();
        let outcome = fixture.aligner().recursive_fix(3, &mut reporter).unwrap();
        assert!(outcome.passes_run <= 3);
        // Fixed point: one more scan yields nothing.
        let further = fixture.aligner().scan_and_fix_all(&mut reporter).unwrap();
        assert_eq!(further, 0);
    }
}
