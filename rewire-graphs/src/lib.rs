//! Structural graph engine for cross-codebase reconciliation.
//!
//! Parses Java source trees with tree-sitter and produces a per-class
//! [`graph::RelationshipGraph`]: which classes a class structurally depends
//! on (field types, constructor/method parameter types, return types,
//! invocation qualifiers, extends/implements), plus the derived reverse
//! view. Extraction is a heuristic layer, not a type checker — a stricter
//! parser-based implementation can replace [`extract`] without touching the
//! graph contract.

pub mod extract;
pub mod graph;

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Error type for the graph engine.
#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;

// ── Extraction output ──────────────────────────────────────────────

/// The structural dependencies of one primary type declaration.
///
/// Recomputed from source on every extraction pass; never persisted
/// independently of the graph it feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRelations {
    /// Simple name of the primary class/interface/enum in the file.
    pub class_name: String,
    /// File the declaration was extracted from.
    pub file_path: PathBuf,
    /// Names of types this class structurally references ("calls").
    pub related: BTreeSet<String>,
}

/// A method signature extracted for return-type alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    /// Simple name of the enclosing class.
    pub class_name: String,
    /// Method name.
    pub name: String,
    /// Declared return type token ("void" when absent).
    pub return_type: String,
    /// Parameter (type, name) pairs in declaration order.
    pub params: Vec<(String, String)>,
    /// File the method was extracted from.
    pub file_path: PathBuf,
}

impl MethodSig {
    /// Render the `name(Type var, Type var)` signature form used as the
    /// exact-match key across codebases.
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(ty, name)| format!("{ty} {name}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({params})", self.name)
    }

    /// Qualified `Class.signature` key.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.class_name, self.signature())
    }
}

/// Java types excluded from relationship edges. Heuristic allowlist, not a
/// resolver — callers extend it through configuration.
pub const DEFAULT_BUILTIN_TYPES: &[&str] = &[
    "String",
    "Integer",
    "Long",
    "Boolean",
    "Double",
    "Float",
    "Short",
    "Byte",
    "Character",
    "Object",
    "List",
    "ArrayList",
    "Map",
    "HashMap",
    "Set",
    "HashSet",
    "Optional",
    "Override",
    "Exception",
    "RuntimeException",
    "Void",
];

/// Build the effective builtin set from the defaults plus configured extras.
pub fn builtin_types(extra: &[String]) -> BTreeSet<String> {
    DEFAULT_BUILTIN_TYPES
        .iter()
        .map(|s| (*s).to_string())
        .chain(extra.iter().cloned())
        .collect()
}
