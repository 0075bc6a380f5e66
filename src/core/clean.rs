//! Clean logic
//!
//! Empties the context directory (`.cartesi/`) holding drive images and the
//! machine snapshot.

use std::path::Path;

use crate::error::FilesystemError;
use crate::infra::filesystem::empty_dir;

/// Result of clean operation
#[derive(Debug, Default)]
pub struct CleanResult {
    /// Entries that were removed
    pub removed: Vec<String>,
}

/// Remove every build artifact from `context_dir`
///
/// The directory itself is kept (or created when missing).
pub fn clean_context(context_dir: &Path) -> Result<CleanResult, FilesystemError> {
    let mut removed: Vec<String> = std::fs::read_dir(context_dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    removed.sort();

    empty_dir(context_dir)?;
    Ok(CleanResult { removed })
}

/// Check if the context directory holds anything
pub fn has_build_artifacts(context_dir: &Path) -> bool {
    std::fs::read_dir(context_dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
