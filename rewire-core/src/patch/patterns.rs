// Catalogue of structural reference sites in Java source.
//
// Each entry is a (pattern, capture-group) pair implementing one common
// "reference site" shape, so new reference kinds are additions to the
// catalogue, not edits to a dispatch chain.

use std::ops::Range;

use regex::Regex;

use crate::error::PatchError;

/// A regex-recognizable structural reference to a class name.
#[derive(Debug)]
pub struct ReferencePattern {
    kind: &'static str,
    regex: Regex,
    group: usize,
}

/// One concrete occurrence of a pattern in a file.
#[derive(Debug, Clone)]
pub struct ReferenceSite {
    /// Category of the enclosing pattern.
    pub kind: &'static str,
    /// Byte range of the full match.
    pub span: Range<usize>,
    /// The referenced class name.
    pub name: String,
    /// Byte range of the class name within the file.
    pub name_span: Range<usize>,
}

impl ReferencePattern {
    fn new(kind: &'static str, pattern: &str, group: usize) -> Result<Self, PatchError> {
        Ok(Self {
            kind,
            regex: Regex::new(pattern)
                .map_err(|e| PatchError::Pattern(format!("{kind}: {e}")))?,
            group,
        })
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// All occurrences of this pattern in `code`.
    pub fn sites(&self, code: &str) -> Vec<ReferenceSite> {
        self.regex
            .captures_iter(code)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let name = caps.get(self.group)?;
                Some(ReferenceSite {
                    kind: self.kind,
                    span: full.range(),
                    name: name.as_str().to_string(),
                    name_span: name.range(),
                })
            })
            .collect()
    }
}

/// Render the replacement text for a site: the full matched snippet with the
/// class-name capture swapped for `candidate`.
pub fn render_replacement(code: &str, site: &ReferenceSite, candidate: &str) -> String {
    let mut replacement = String::with_capacity(site.span.len() + candidate.len());
    replacement.push_str(&code[site.span.start..site.name_span.start]);
    replacement.push_str(candidate);
    replacement.push_str(&code[site.name_span.end..site.span.end]);
    replacement
}

/// The full reference-site catalogue, in match-priority order: earlier
/// entries win when sites overlap (field injection subsumes the bare
/// annotation inside it).
pub fn catalogue() -> Result<Vec<ReferencePattern>, PatchError> {
    Ok(vec![
        ReferencePattern::new(
            "field_injection",
            r"@(Autowired|Resource|Mock)\s+private\s+(\w+)\s+(\w+);",
            2,
        )?,
        ReferencePattern::new("instantiation", r"new\s+([A-Z]\w*)\s*\(", 1)?,
        ReferencePattern::new("import", r"import\s+[\w.]*\.(\w+);", 1)?,
        ReferencePattern::new("generic_type", r"<(\w+)>", 1)?,
        ReferencePattern::new("extends_implements", r"\b(implements|extends)\s+(\w+)", 2)?,
        ReferencePattern::new("annotation_class_arg", r"@\w+\((\w+)\.class\)", 1)?,
        ReferencePattern::new("throws_clause", r"throws\s+(\w+)", 1)?,
        ReferencePattern::new("catch_clause", r"catch\s*\(\s*(\w+)\s+\w+\s*\)", 1)?,
        ReferencePattern::new("method_reference", r"(\w+)::\w+", 1)?,
        ReferencePattern::new("class_forname", r#"Class\.forName\("[\w.]*?(\w+)"\)"#, 1)?,
        ReferencePattern::new("annotation_usage", r"@(\w+)\b", 1)?,
        ReferencePattern::new("resource_name", r#"@Resource\s*\(name\s*=\s*"(\w+)"\)"#, 1)?,
    ])
}

/// Annotations that are framework vocabulary, not wiring targets.
pub const KNOWN_ANNOTATIONS: &[&str] = &[
    "Autowired",
    "Resource",
    "Mock",
    "Override",
    "Service",
    "Component",
    "Repository",
    "Controller",
    "RestController",
    "Configuration",
    "Bean",
    "Test",
    "Deprecated",
    "Transactional",
];
