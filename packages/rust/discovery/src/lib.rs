//! Directory-tree discovery of convertible source documents.
//!
//! Walks a root directory, applying directory-exclusion rules, and yields
//! candidate file paths whose extension is registered with a converter.
//! Excluded directories are never entered, so everything nested inside them
//! is invisible regardless of depth.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use docnorm_shared::{DocNormError, EXCLUDED_DIR_NAMES, Result, extension_of};

// ---------------------------------------------------------------------------
// Scan options
// ---------------------------------------------------------------------------

/// Configuration for one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Registered extensions, lowercase with leading dot (e.g. `.docx`).
    /// Files whose extension is not in this set are ignored.
    pub extensions: BTreeSet<String>,

    /// Additional directory names to exclude, on top of the built-in set.
    /// Matched case-insensitively against the directory's basename.
    pub extra_exclude_dirs: Vec<String>,
}

impl ScanOptions {
    /// Options scanning for the given extensions with no extra exclusions.
    pub fn for_extensions(extensions: BTreeSet<String>) -> Self {
        Self {
            extensions,
            extra_exclude_dirs: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// Walk the tree rooted at `root` and return every eligible file path.
///
/// Ordering is deterministic: entries of a directory are visited in name
/// order, files before subdirectories. The ordering affects only the record
/// order in the index, not correctness.
///
/// A missing or non-directory root is a fatal configuration error.
/// Unreadable subtrees are skipped with a warning and never abort the scan.
/// Symlinks are not followed, which rules out traversal cycles.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn scan(root: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(root).map_err(|_| {
        DocNormError::config(format!("root path does not exist: {}", root.display()))
    })?;
    if !meta.is_dir() {
        return Err(DocNormError::config(format!(
            "root path is not a directory: {}",
            root.display()
        )));
    }

    let mut found = Vec::new();
    walk(root, options, &mut found);

    debug!(count = found.len(), "discovery complete");
    Ok(found)
}

/// Should discovery refuse to enter a directory with this basename?
pub fn is_excluded_dir(name: &str, extra: &[String]) -> bool {
    if name.starts_with('.') {
        return true;
    }
    let lower = name.to_lowercase();
    EXCLUDED_DIR_NAMES.iter().any(|d| *d == lower)
        || extra.iter().any(|d| d.to_lowercase() == lower)
}

fn walk(dir: &Path, options: &ScanOptions, found: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };

    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        // Symlinks are neither descended into nor converted.
        if file_type.is_symlink() {
            debug!(path = %path.display(), "ignoring symlink");
            continue;
        }

        if file_type.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_excluded_dir(&name, &options.extra_exclude_dirs) {
                debug!(path = %path.display(), "excluded directory");
                continue;
            }
            subdirs.push(path);
        } else if file_type.is_file() {
            if let Some(ext) = extension_of(&path) {
                if options.extensions.contains(&ext) {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    subdirs.sort();

    found.extend(files);
    for subdir in &subdirs {
        walk(subdir, options, found);
    }
}
