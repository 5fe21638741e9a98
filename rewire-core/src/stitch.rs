// Prompt-context assembly for patch generation: the broken migrated file,
// its legacy counterpart, and related migrated neighbors, each under a
// labelled header. Missing pieces are skipped, never fatal.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Assembles the stitched context handed to the patch generator.
#[derive(Debug)]
pub struct ContextStitcher {
    legacy_root: PathBuf,
    migrated_root: PathBuf,
}

impl ContextStitcher {
    pub fn new(legacy_root: &Path, migrated_root: &Path) -> Self {
        Self {
            legacy_root: legacy_root.to_path_buf(),
            migrated_root: migrated_root.to_path_buf(),
        }
    }

    /// Stitch context for one migrated file. `related` paths are relative to
    /// the migrated root (typically the file's diff-report neighborhood).
    pub fn stitch(&self, relative_path: &Path, related: &[PathBuf]) -> String {
        let mut parts = Vec::new();

        // Legacy counterpart leads so the generator sees intent first.
        // Conservative default mapping: same file name in the legacy tree.
        if let Some(file_name) = relative_path.file_name() {
            if let Some(section) = self.read_labelled(&self.legacy_root, Path::new(file_name), "Legacy")
            {
                parts.push(section);
            }
        }

        match self.read_labelled(&self.migrated_root, relative_path, "Migrated") {
            Some(section) => parts.push(section),
            None => warn!(file = %relative_path.display(), "Missing migrated content for stitching"),
        }

        for related_path in related {
            if let Some(section) = self.read_labelled(&self.migrated_root, related_path, "Related") {
                parts.push(section);
            }
        }

        parts.join("\n\n")
    }

    fn read_labelled(&self, base: &Path, relative: &Path, label: &str) -> Option<String> {
        let full = base.join(relative);
        match std::fs::read_to_string(&full) {
            Ok(content) => Some(format!(
                "// --- {label} File: {} ---\n{content}",
                relative.display()
            )),
            Err(_) => None,
        }
    }
}
