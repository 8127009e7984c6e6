//! Core domain types for docnorm conversion runs.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the output directory created under the scan root.
///
/// The directory is itself excluded from discovery to prevent self-ingestion.
pub const NORMALIZED_DIR_NAME: &str = "_normalized";

/// File name of the full per-file conversion log artifact.
pub const INDEX_FILE_NAME: &str = "normalize.index.json";

/// File name of the basename → output lookup artifact.
pub const MAP_FILE_NAME: &str = "normalized-map.json";

/// Directory names that discovery never enters, matched case-insensitively.
pub const EXCLUDED_DIR_NAMES: &[&str] = &["documentation", "node_modules", NORMALIZED_DIR_NAME];

// ---------------------------------------------------------------------------
// ConversionStatus
// ---------------------------------------------------------------------------

/// Outcome class of one conversion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    /// The converter produced output; `output`, `hash`, and `metadata` are set.
    Success,
    /// The converter declared failure or faulted; `error` is set.
    Failed,
    /// No converter was registered for the file's extension.
    Skipped,
}

impl std::fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ConversionRecord
// ---------------------------------------------------------------------------

/// One entry in the conversion log, one per attempted file.
///
/// Exactly one of `{output, hash, metadata}` or `{error}` is populated,
/// keyed by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRecord {
    /// Path relative to the scan root, POSIX-style separators.
    pub source: String,

    /// Outcome of the attempt.
    pub status: ConversionStatus,

    /// Output path relative to the scan root (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Identifier of the converter used, or the bare extension when no
    /// converter was resolved.
    pub converter: String,

    /// SHA-256 digest of the source bytes at conversion time (success only).
    /// This is the idempotency key: it identifies exactly which file version
    /// produced the recorded output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Human-readable failure or skip reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Converter-supplied facts (page counts, sheet counts, …). Opaque to
    /// the core; merged into the record without interpreting its keys.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ConversionRecord {
    /// Build a success record.
    pub fn success(
        source: impl Into<String>,
        output: impl Into<String>,
        converter: impl Into<String>,
        hash: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            source: source.into(),
            status: ConversionStatus::Success,
            output: Some(output.into()),
            converter: converter.into(),
            hash: Some(hash.into()),
            error: None,
            metadata,
        }
    }

    /// Build a failed record.
    pub fn failed(
        source: impl Into<String>,
        converter: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            status: ConversionStatus::Failed,
            output: None,
            converter: converter.into(),
            hash: None,
            error: Some(error.into()),
            metadata: serde_json::Map::new(),
        }
    }

    /// Build a skipped record (no converter registered).
    pub fn skipped(
        source: impl Into<String>,
        converter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            status: ConversionStatus::Skipped,
            output: None,
            converter: converter.into(),
            hash: None,
            error: Some(reason.into()),
            metadata: serde_json::Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversionIndex
// ---------------------------------------------------------------------------

/// The `normalize.index.json` structure: the full run's artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionIndex {
    /// When the index was written (UTC).
    pub generated_at: DateTime<Utc>,
    /// Per-file records, append order = discovery/processing order.
    pub documents: Vec<ConversionRecord>,
}

/// The `normalized-map.json` structure: source basename → output path.
///
/// Keys are basenames, not full paths; if two source files across different
/// directories share a basename, whichever was processed last wins.
pub type NormalizedMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Render a path with POSIX-style separators for portable artifacts.
pub fn to_posix_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

/// Lowercased extension of a path including the leading dot, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ConversionStatus::Success).expect("serialize");
        assert_eq!(json, "\"success\"");
        let parsed: ConversionStatus = serde_json::from_str("\"skipped\"").expect("deserialize");
        assert_eq!(parsed, ConversionStatus::Skipped);
    }

    #[test]
    fn success_record_omits_error() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("pages".into(), serde_json::json!(3));

        let record = ConversionRecord::success(
            "docs/report.docx",
            "_normalized/docx/report.md",
            "docx_to_md",
            "abc123",
            metadata,
        );

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["status"], "success");
        assert_eq!(json["output"], "_normalized/docx/report.md");
        assert_eq!(json["hash"], "abc123");
        assert_eq!(json["metadata"]["pages"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failed_record_omits_output_and_hash() {
        let record = ConversionRecord::failed("a/broken.pdf", "pdf_to_md", "not a PDF");
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "not a PDF");
        assert!(json.get("output").is_none());
        assert!(json.get("hash").is_none());
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn index_roundtrip() {
        let index = ConversionIndex {
            generated_at: Utc::now(),
            documents: vec![ConversionRecord::skipped(
                "x.unknown",
                ".unknown",
                "No converter registered for .unknown",
            )],
        };
        let json = serde_json::to_string_pretty(&index).expect("serialize");
        let parsed: ConversionIndex = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.documents.len(), 1);
        assert_eq!(parsed.documents[0].status, ConversionStatus::Skipped);
    }

    #[test]
    fn posix_rendering_joins_components() {
        let path = PathBuf::from("a").join("b").join("report.docx");
        assert_eq!(to_posix_string(&path), "a/b/report.docx");
    }

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(
            extension_of(Path::new("X/Report.DOCX")).as_deref(),
            Some(".docx")
        );
        assert_eq!(extension_of(Path::new("README")), None);
    }
}
