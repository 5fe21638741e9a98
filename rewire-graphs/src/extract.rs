// Heuristic structural extraction from Java source via tree-sitter.
//
// Collects the identifiers a class structurally depends on: field types,
// constructor/method parameter types, return types, method-invocation
// qualifiers, and extends/implements clauses. Identifiers are filtered to
// uppercase-initial names outside the builtin allowlist.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::warn;

use crate::{ClassRelations, GraphError, MethodSig, Result};

/// Everything one extraction pass produces for a source tree.
#[derive(Debug, Default)]
pub struct TreeExtraction {
    pub relations: Vec<ClassRelations>,
    pub methods: Vec<MethodSig>,
    /// Per-file failures. Never fatal: the rest of the tree is still scanned.
    pub errors: Vec<(PathBuf, GraphError)>,
}

/// Extract relationships and method signatures for every `.java` file under
/// `root`. Individual parse failures are recorded and skipped.
pub fn extract_tree(root: &Path, builtins: &BTreeSet<String>) -> TreeExtraction {
    let mut files = Vec::new();
    collect_java_files(root, &mut files);
    files.sort();

    let results: Vec<_> = files
        .par_iter()
        .map(|path| {
            let outcome = std::fs::read_to_string(path)
                .map_err(GraphError::from)
                .and_then(|source| extract_file(&source, path, builtins));
            (path.clone(), outcome)
        })
        .collect();

    let mut extraction = TreeExtraction::default();
    for (path, outcome) in results {
        match outcome {
            Ok(Some((relations, methods))) => {
                extraction.relations.push(relations);
                extraction.methods.extend(methods);
            }
            Ok(None) => {} // no primary type declaration — nothing to record
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unparseable file");
                extraction.errors.push((path, e));
            }
        }
    }
    extraction
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

/// Extract the primary type declaration of one file.
///
/// Returns `Ok(None)` when the file holds no class/interface/enum.
pub fn extract_file(
    source: &str,
    path: &Path,
    builtins: &BTreeSet<String>,
) -> Result<Option<(ClassRelations, Vec<MethodSig>)>> {
    let tree = parse_java(source, path)?;
    let Some(type_decl) = primary_type_declaration(tree.root_node()) else {
        return Ok(None);
    };

    let Some(name_node) = type_decl.child_by_field_name("name") else {
        return Ok(None);
    };
    let class_name = node_text(name_node, source).to_string();

    let mut related = BTreeSet::new();

    // extends / implements
    if let Some(superclass) = type_decl.child_by_field_name("superclass") {
        collect_type_names(superclass, source, &mut related);
    }
    if let Some(interfaces) = type_decl.child_by_field_name("interfaces") {
        collect_type_names(interfaces, source, &mut related);
    }

    let mut methods = Vec::new();
    if let Some(body) = type_decl.child_by_field_name("body") {
        walk_members(body, source, path, &class_name, &mut related, &mut methods);
    }

    related.retain(|name| is_relation_candidate(name, &class_name, builtins));

    Ok(Some((
        ClassRelations {
            class_name,
            file_path: path.to_path_buf(),
            related,
        },
        methods,
    )))
}

/// Extract only the method signatures of one file (type alignment path).
pub fn extract_methods(source: &str, path: &Path) -> Result<Vec<MethodSig>> {
    let builtins = BTreeSet::new();
    Ok(extract_file(source, path, &builtins)?
        .map(|(_, methods)| methods)
        .unwrap_or_default())
}

fn parse_java(source: &str, path: &Path) -> Result<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| GraphError::TreeSitter(e.to_string()))?;
    parser.parse(source, None).ok_or_else(|| GraphError::Parse {
        path: path.display().to_string(),
        message: "tree-sitter returned no tree".to_string(),
    })
}

/// The first top-level class/interface/enum declaration in the file.
fn primary_type_declaration(root: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    let mut cursor = root.walk();
    root.children(&mut cursor).find(|child| {
        matches!(
            child.kind(),
            "class_declaration" | "interface_declaration" | "enum_declaration"
        )
    })
}

fn walk_members(
    node: tree_sitter::Node<'_>,
    source: &str,
    path: &Path,
    class_name: &str,
    related: &mut BTreeSet<String>,
    methods: &mut Vec<MethodSig>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "field_declaration" => {
                if let Some(ty) = child.child_by_field_name("type") {
                    collect_type_names(ty, source, related);
                }
            }
            "constructor_declaration" => {
                if let Some(params) = child.child_by_field_name("parameters") {
                    collect_param_types(params, source, related);
                }
                if let Some(body) = child.child_by_field_name("body") {
                    collect_invocation_qualifiers(body, source, related);
                }
            }
            "method_declaration" => {
                if let Some(ty) = child.child_by_field_name("type") {
                    collect_type_names(ty, source, related);
                }
                if let Some(params) = child.child_by_field_name("parameters") {
                    collect_param_types(params, source, related);
                }
                if let Some(body) = child.child_by_field_name("body") {
                    collect_invocation_qualifiers(body, source, related);
                }
                if let Some(sig) = method_signature(child, source, path, class_name) {
                    methods.push(sig);
                }
            }
            // Inner declarations contribute their members to the primary class.
            "class_declaration" | "interface_declaration" | "enum_declaration" => {
                if let Some(superclass) = child.child_by_field_name("superclass") {
                    collect_type_names(superclass, source, related);
                }
                if let Some(interfaces) = child.child_by_field_name("interfaces") {
                    collect_type_names(interfaces, source, related);
                }
                if let Some(body) = child.child_by_field_name("body") {
                    walk_members(body, source, path, class_name, related, methods);
                }
            }
            _ => {}
        }
    }
}

fn method_signature(
    node: tree_sitter::Node<'_>,
    source: &str,
    path: &Path,
    class_name: &str,
) -> Option<MethodSig> {
    let name = node_text(node.child_by_field_name("name")?, source).to_string();
    let return_type = node
        .child_by_field_name("type")
        .map_or_else(|| "void".to_string(), |ty| node_text(ty, source).to_string());

    let mut params = Vec::new();
    if let Some(params_node) = node.child_by_field_name("parameters") {
        let mut cursor = params_node.walk();
        for child in params_node.children(&mut cursor) {
            if child.kind() == "formal_parameter" || child.kind() == "spread_parameter" {
                let ty = child
                    .child_by_field_name("type")
                    .map(|t| node_text(t, source).to_string());
                let var = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string());
                if let (Some(ty), Some(var)) = (ty, var) {
                    params.push((ty, var));
                }
            }
        }
    }

    Some(MethodSig {
        class_name: class_name.to_string(),
        name,
        return_type,
        params,
        file_path: path.to_path_buf(),
    })
}

fn collect_param_types(
    params_node: tree_sitter::Node<'_>,
    source: &str,
    related: &mut BTreeSet<String>,
) {
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        if child.kind() == "formal_parameter" || child.kind() == "spread_parameter" {
            if let Some(ty) = child.child_by_field_name("type") {
                collect_type_names(ty, source, related);
            }
        }
    }
}

/// Qualifiers of static-style invocations (`Utils.render(...)`) inside a
/// method body. Instance-variable qualifiers are dropped by the uppercase
/// filter applied at the end of extraction.
fn collect_invocation_qualifiers(
    node: tree_sitter::Node<'_>,
    source: &str,
    related: &mut BTreeSet<String>,
) {
    if node.kind() == "method_invocation" {
        if let Some(object) = node.child_by_field_name("object") {
            if object.kind() == "identifier" {
                related.insert(node_text(object, source).to_string());
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_invocation_qualifiers(child, source, related);
    }
}

/// Find type names within a type node or a wrapper (`superclass`,
/// `super_interfaces`, `type_list`). `generic_type` contributes its outer
/// name; `scoped_type_identifier` its last segment.
fn collect_type_names(node: tree_sitter::Node<'_>, source: &str, related: &mut BTreeSet<String>) {
    match node.kind() {
        "type_identifier" => {
            related.insert(node_text(node, source).to_string());
        }
        "generic_type" => {
            let mut cursor = node.walk();
            if let Some(name_node) = node
                .children(&mut cursor)
                .find(|c| c.kind() == "type_identifier")
            {
                related.insert(node_text(name_node, source).to_string());
            }
        }
        "scoped_type_identifier" => {
            let mut cursor = node.walk();
            if let Some(last) = node
                .children(&mut cursor)
                .filter(|c| c.kind() == "type_identifier")
                .last()
            {
                related.insert(node_text(last, source).to_string());
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_type_names(child, source, related);
            }
        }
    }
}

fn is_relation_candidate(name: &str, class_name: &str, builtins: &BTreeSet<String>) -> bool {
    name != class_name
        && name.chars().next().is_some_and(char::is_uppercase)
        && !builtins.contains(name)
}

fn node_text<'a>(node: tree_sitter::Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}
