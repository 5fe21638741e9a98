// Cross-reference resolution for one migrated file: align the package
// declaration with the file's location and resolve undefined uppercase
// types into imports using the migrated class map.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use rewire_graphs::extract::extract_file;

use crate::error::{PatchError, Result};

/// Root marker of Java source layout; package inference starts after it.
const SOURCE_ROOT: &str = "src/main/java";

/// Simple class name → fully-qualified class name, for every class in the
/// migrated tree.
pub type ClassMap = BTreeMap<String, String>;

/// Walk the migrated tree and map every class to its fully-qualified name,
/// inferred from the path under `src/main/java` (falling back to the bare
/// stem when the marker is absent).
pub fn build_class_map(migrated_root: &Path) -> ClassMap {
    let mut files = Vec::new();
    collect_java_files(migrated_root, &mut files);
    files.sort();

    let mut map = ClassMap::new();
    for file in files {
        let Some(stem) = file.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        let relative = file.strip_prefix(migrated_root).unwrap_or(&file);
        let fqcn = infer_package(relative)
            .map_or_else(|| stem.clone(), |package| format!("{package}.{stem}"));
        map.insert(stem, fqcn);
    }
    map
}

/// Fixes package declarations and import blocks in place.
#[derive(Debug)]
pub struct CrossReferenceResolver {
    migrated_root: PathBuf,
    builtins: BTreeSet<String>,
}

impl CrossReferenceResolver {
    pub fn new(migrated_root: &Path, builtins: BTreeSet<String>) -> Self {
        Self {
            migrated_root: migrated_root.to_path_buf(),
            builtins,
        }
    }

    /// Resolve one file against the class map. Returns whether the file was
    /// changed.
    pub fn resolve_and_patch(&self, relative_path: &Path, class_map: &ClassMap) -> Result<bool> {
        let full_path = self.migrated_root.join(relative_path);
        if !full_path.exists() {
            return Err(PatchError::MissingFile(full_path.display().to_string()).into());
        }
        let code = std::fs::read_to_string(&full_path).map_err(PatchError::from)?;

        let mut patched = match infer_package(relative_path) {
            Some(package) => fix_package_declaration(&code, &package),
            None => code.clone(),
        };

        let undefined = self.undefined_types(&patched, &full_path);
        let imports: Vec<&String> = undefined
            .iter()
            .filter_map(|name| class_map.get(name))
            // Importing a default-package class is a syntax error; only
            // qualified names can be imported.
            .filter(|fqcn| fqcn.contains('.'))
            .collect();
        if !imports.is_empty() {
            patched = apply_imports(&patched, &imports);
        }

        if patched == code {
            return Ok(false);
        }
        std::fs::write(&full_path, patched).map_err(PatchError::from)?;
        info!(file = %relative_path.display(), "Cross-references resolved");
        Ok(true)
    }

    /// Uppercase identifiers used in the file but neither declared, already
    /// imported, nor builtin.
    pub fn undefined_types(&self, code: &str, path: &Path) -> BTreeSet<String> {
        let mut declared = BTreeSet::new();
        if let Ok(Some((relations, _))) = extract_file(code, path, &self.builtins) {
            declared.insert(relations.class_name);
        }

        let imported: BTreeSet<String> = code
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                line.strip_prefix("import ").map(|rest| {
                    rest.trim_end_matches(';')
                        .rsplit('.')
                        .next()
                        .unwrap_or(rest)
                        .to_string()
                })
            })
            .collect();

        let used = Regex::new(r"\b([A-Z][A-Za-z0-9_]*)\b").expect("static pattern");
        used.captures_iter(code)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .filter(|name| {
                !declared.contains(name) && !imported.contains(name) && !self.builtins.contains(name)
            })
            .collect()
    }
}

/// Rewrite (or insert) the package declaration so it matches the inferred
/// package.
pub fn fix_package_declaration(code: &str, correct_package: &str) -> String {
    let mut lines: Vec<String> = code.lines().map(String::from).collect();
    for line in &mut lines {
        if line.trim_start().starts_with("package ") {
            if !line.contains(correct_package) {
                debug!(package = correct_package, "Rewriting package declaration");
                *line = format!("package {correct_package};");
            }
            return lines.join("\n") + "\n";
        }
    }
    lines.insert(0, format!("package {correct_package};"));
    lines.join("\n") + "\n"
}

/// Infer the package from a path under the `src/main/java` layout root.
pub fn infer_package(relative_path: &Path) -> Option<String> {
    let components: Vec<&str> = relative_path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    let marker: Vec<&str> = SOURCE_ROOT.split('/').collect();
    let start = components
        .windows(marker.len())
        .position(|window| window == marker.as_slice())?
        + marker.len();

    // Everything between the marker and the file name is the package.
    let package_parts = &components[start..components.len().saturating_sub(1)];
    if package_parts.is_empty() {
        None
    } else {
        Some(package_parts.join("."))
    }
}

/// Replace the file's import block with the merged, sorted union of existing
/// and newly-resolved imports, placed after the package line.
fn apply_imports(code: &str, new_imports: &[&String]) -> String {
    let mut import_fqns: BTreeSet<String> = code
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix("import ")
                .map(|rest| rest.trim_end_matches(';').to_string())
        })
        .collect();
    import_fqns.extend(new_imports.iter().map(|s| (*s).clone()));

    let kept: Vec<&str> = code
        .lines()
        .filter(|line| !line.trim_start().starts_with("import "))
        .collect();

    let insert_at = kept
        .iter()
        .position(|line| line.trim_start().starts_with("package "))
        .map_or(0, |pos| pos + 1);

    let mut lines: Vec<String> = kept.iter().map(|s| (*s).to_string()).collect();
    let import_lines: Vec<String> = import_fqns
        .into_iter()
        .map(|fqcn| format!("import {fqcn};"))
        .collect();
    lines.splice(insert_at..insert_at, import_lines);
    lines.join("\n") + "\n"
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
