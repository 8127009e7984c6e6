//! Per-file conversion dispatch with failure isolation.
//!
//! Resolves the converter for one discovered file, invokes it, and normalizes
//! the heterogeneous outcome into a uniform [`ConversionRecord`]. Nothing a
//! single converter does (declared failure, panic inside a format library)
//! can abort the batch or disturb other files' records.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use tracing::{debug, error, warn};

use docnorm_convert::ConverterRegistry;
use docnorm_shared::{ConversionRecord, extension_of, to_posix_string};

use crate::hashing;

/// Convert one file and produce its record.
///
/// The content digest is computed before invoking the converter, so it
/// reflects exactly the bytes that were converted.
pub fn dispatch(
    path: &Path,
    root: &Path,
    normalized_dir: &Path,
    registry: &ConverterRegistry,
) -> ConversionRecord {
    let source = to_posix_string(path.strip_prefix(root).unwrap_or(path));
    let extension = extension_of(path).unwrap_or_default();

    // Reachable only if discovery and the registry disagree.
    let Some(converter) = registry.resolve(&extension) else {
        warn!(%source, %extension, "no converter registered");
        return ConversionRecord::skipped(
            source,
            extension.clone(),
            format!("No converter registered for {extension}"),
        );
    };

    let hash = match hashing::digest_file(path) {
        Ok(hash) => hash,
        Err(e) => {
            error!(%source, error = %e, "failed to hash source file");
            return ConversionRecord::failed(source, converter.name(), e.to_string());
        }
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        converter.convert(path, normalized_dir)
    }));

    match outcome {
        Ok(Ok(converted)) => {
            debug!(%source, output = %converted.output, "conversion succeeded");
            ConversionRecord::success(
                source,
                converted.output,
                converter.name(),
                hash,
                converted.metadata,
            )
        }
        Ok(Err(e)) => {
            warn!(%source, error = %e, "converter reported failure");
            ConversionRecord::failed(source, converter.name(), e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(%source, %message, "converter panicked");
            ConversionRecord::failed(
                source,
                converter.name(),
                format!("converter panicked: {message}"),
            )
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
