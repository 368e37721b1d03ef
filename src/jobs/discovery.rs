use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::archive::root_name;
use crate::constants::ARCHIVE_EXTENSION;
use crate::error::JobError;

/// Immediate subdirectories of `root`, sorted by name.
///
/// Files and symlinks at the top level are ignored. A root that cannot be
/// read is a configuration error for the whole run.
pub fn discover_source_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("Failed to read source root {}", root.display()))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list source root {}", root.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to inspect {}", entry.path().display()))?;

        if file_type.is_dir() {
            dirs.push(entry.path());
        } else {
            debug!("Skipping non-directory {}", entry.path().display());
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// Object key for a source directory: its base name plus `.tar.gz`.
pub fn object_key_for(source: &Path) -> Result<String, JobError> {
    root_name(source)
        .filter(|name| !name.is_empty())
        .map(|name| format!("{}{}", name, ARCHIVE_EXTENSION))
        .ok_or_else(|| JobError::Key(source.to_path_buf()))
}
