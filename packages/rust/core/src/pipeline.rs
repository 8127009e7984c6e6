//! The normalization run: discovery → dispatch → index artifacts.
//!
//! Drives the whole tree sequentially, accumulating per-file records and the
//! basename → output map, then writes both artifacts on completion. Per-file
//! failures never fail the run; only a fatal configuration error or an index
//! write failure does. If the process dies mid-run no artifacts are written
//! at all, though converter side effects up to that point remain on disk.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use docnorm_convert::ConverterRegistry;
use docnorm_discovery::ScanOptions;
use docnorm_shared::{
    ConversionRecord, ConversionStatus, DocNormError, NORMALIZED_DIR_NAME, NormalizedMap, Result,
};

use crate::dispatcher;
use crate::index::{self, IndexArtifacts};

/// Configuration for one normalization run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root of the tree to normalize.
    pub root: PathBuf,
    /// Extra directory names to exclude during discovery.
    pub extra_exclude_dirs: Vec<String>,
}

impl RunConfig {
    /// A run over `root` with default exclusions only.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extra_exclude_dirs: Vec::new(),
        }
    }
}

/// Externally observable result of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// Number of files discovery yielded.
    pub discovered: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Path of the written `normalize.index.json`.
    pub index_path: PathBuf,
    /// Path of the written `normalized-map.json`.
    pub map_path: PathBuf,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each file's record is produced.
    fn file_processed(&self, record: &ConversionRecord, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_processed(&self, _record: &ConversionRecord, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run the full normalization pipeline.
///
/// 1. Validate the root and create `<root>/_normalized/`
/// 2. Discover eligible files
/// 3. Dispatch each file sequentially, accumulating records and the map
/// 4. Write both index artifacts
#[instrument(skip_all, fields(root = %config.root.display()))]
pub fn run(
    config: &RunConfig,
    registry: &ConverterRegistry,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();

    info!(root = %config.root.display(), "starting normalization run");

    progress.phase("Scanning for documents");
    let mut scan_options = ScanOptions::for_extensions(registry.extensions());
    scan_options
        .extra_exclude_dirs
        .clone_from(&config.extra_exclude_dirs);
    let files = docnorm_discovery::scan(&config.root, &scan_options)?;

    info!(count = files.len(), "discovery complete");

    let normalized_dir = config.root.join(NORMALIZED_DIR_NAME);
    std::fs::create_dir_all(&normalized_dir)
        .map_err(|e| DocNormError::io(&normalized_dir, e))?;

    progress.phase("Converting documents");
    let total = files.len();
    let mut records: Vec<ConversionRecord> = Vec::with_capacity(total);
    let mut map = NormalizedMap::new();

    for (i, file) in files.iter().enumerate() {
        let record = dispatcher::dispatch(file, &config.root, &normalized_dir, registry);

        // Basename keyed, so same-named sources in different directories
        // overwrite each other: last processed wins.
        if record.status == ConversionStatus::Success {
            if let (Some(name), Some(output)) = (
                file.file_name().map(|n| n.to_string_lossy().into_owned()),
                record.output.clone(),
            ) {
                map.insert(name, output);
            }
        }

        progress.file_processed(&record, i + 1, total);
        records.push(record);
    }

    progress.phase("Writing index artifacts");
    let IndexArtifacts {
        index_path,
        map_path,
    } = index::write_artifacts(&normalized_dir, &records, &map)?;

    let summary = RunSummary {
        discovered: total,
        succeeded: count(&records, ConversionStatus::Success),
        failed: count(&records, ConversionStatus::Failed),
        skipped: count(&records, ConversionStatus::Skipped),
        index_path,
        map_path,
        elapsed: start.elapsed(),
    };

    progress.done(&summary);

    info!(
        discovered = summary.discovered,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        elapsed_ms = summary.elapsed.as_millis(),
        "normalization run complete"
    );

    Ok(summary)
}

fn count(records: &[ConversionRecord], status: ConversionStatus) -> usize {
    records.iter().filter(|r| r.status == status).count()
}
