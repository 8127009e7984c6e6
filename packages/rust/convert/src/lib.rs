//! Converter capability contract, registry, and the built-in converters.
//!
//! Each converter transforms one document format into a normalized
//! text/structured representation under the `_normalized/` output root and
//! reports an output path plus converter-specific metadata. Converters own
//! their format subdirectory (`docx/`, `xlsx/`, …) and report *recoverable*
//! problems via [`ConvertError`], never by panicking; the dispatch layer in
//! `docnorm-core` catches any panic that escapes a format library.

mod docx;
mod ooxml;
mod pdf;
mod pptx;
mod visio;
mod xlsx;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

pub use docx::DocxConverter;
pub use pdf::PdfConverter;
pub use pptx::PptxConverter;
pub use visio::VisioConverter;
pub use xlsx::XlsxConverter;

// ---------------------------------------------------------------------------
// Converter contract
// ---------------------------------------------------------------------------

/// A successful conversion: where the output landed and what the converter
/// learned about the document.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    /// Output path relative to the scan root (e.g. `_normalized/docx/a.md`),
    /// POSIX-style separators.
    pub output: String,
    /// Converter-defined facts (page counts, sheet names, …).
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A declared, recoverable conversion failure.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The source file could not be opened or is not the expected container.
    #[error("failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },

    /// A document part could not be parsed.
    #[error("failed to parse {part}: {message}")]
    Parse { part: String, message: String },

    /// Output could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document yielded nothing convertible.
    #[error("{0}")]
    Empty(String),
}

/// Result alias for converter implementations.
pub type ConvertResult = std::result::Result<ConvertedDocument, ConvertError>;

/// The capability every format-specific converter implements.
///
/// `output_root` is the `_normalized` directory under the scan root. The
/// converter creates its own subdirectory beneath it and writes all output
/// there.
pub trait Converter: Send + Sync {
    /// Stable identifier recorded in the index (e.g. `docx_to_md`).
    fn name(&self) -> &'static str;

    /// Convert one source file, writing output under `output_root`.
    fn convert(&self, source: &Path, output_root: &Path) -> ConvertResult;
}

// ---------------------------------------------------------------------------
// ConverterRegistry
// ---------------------------------------------------------------------------

/// Maps a case-normalized file extension to a converter.
///
/// Later registrations for the same extension silently replace earlier ones;
/// registration happens once at startup from a fixed, non-overlapping set, so
/// last-registration-wins is acceptable.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with all five built-in converters registered.
    pub fn with_builtin_converters() -> Self {
        let mut registry = Self::new();
        registry.register(".docx", Arc::new(DocxConverter));
        registry.register(".xlsx", Arc::new(XlsxConverter));
        registry.register(".pptx", Arc::new(PptxConverter));
        registry.register(".pdf", Arc::new(PdfConverter));
        registry.register(".vsdx", Arc::new(VisioConverter));
        registry
    }

    /// Register a converter for an extension. The extension is lowercased
    /// and a leading dot is added if absent.
    pub fn register(&mut self, extension: &str, converter: Arc<dyn Converter>) {
        let ext = normalize_extension(extension);
        debug!(extension = %ext, converter = converter.name(), "registering converter");
        self.converters.insert(ext, converter);
    }

    /// Look up the converter for an extension, case-insensitively.
    pub fn resolve(&self, extension: &str) -> Option<&Arc<dyn Converter>> {
        self.converters.get(&normalize_extension(extension))
    }

    /// The set of registered extensions, feeding discovery.
    pub fn extensions(&self) -> BTreeSet<String> {
        self.converters.keys().cloned().collect()
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

fn normalize_extension(extension: &str) -> String {
    let lower = extension.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

// ---------------------------------------------------------------------------
// Shared converter helpers
// ---------------------------------------------------------------------------

/// Output path relative to the scan root: `_normalized/<subdir>/<file>`.
pub(crate) fn output_rel_path(output_root: &Path, subdir: &str, file_name: &str) -> String {
    let root_name = output_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| docnorm_shared::NORMALIZED_DIR_NAME.to_string());
    format!("{root_name}/{subdir}/{file_name}")
}

/// Create the converter's format subdirectory under the output root.
pub(crate) fn ensure_subdir(output_root: &Path, subdir: &str) -> Result<PathBuf, ConvertError> {
    let dir = output_root.join(subdir);
    std::fs::create_dir_all(&dir).map_err(|e| ConvertError::Write {
        path: dir.clone(),
        source: e,
    })?;
    Ok(dir)
}

/// YAML frontmatter prepended to Markdown outputs.
pub(crate) fn frontmatter(source: &Path, converter: &str) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    format!("---\nsource: {name}\nconverted_at: {stamp}\nconverter: {converter}\n---\n\n")
}

/// File stem of the source, for naming outputs.
pub(crate) fn source_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

pub(crate) fn write_output(path: &Path, content: &str) -> Result<(), ConvertError> {
    std::fs::write(path, content).map_err(|e| ConvertError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str);

    impl Converter for Dummy {
        fn name(&self) -> &'static str {
            self.0
        }
        fn convert(&self, _source: &Path, _output_root: &Path) -> ConvertResult {
            Err(ConvertError::Empty("dummy".into()))
        }
    }

    #[test]
    fn extension_is_normalized_on_register_and_resolve() {
        let mut registry = ConverterRegistry::new();
        registry.register("DOCX", Arc::new(Dummy("a")));

        assert!(registry.resolve(".docx").is_some());
        assert!(registry.resolve(".DoCx").is_some());
        assert!(registry.resolve("docx").is_some());
        assert!(registry.resolve(".pdf").is_none());
        assert_eq!(registry.extensions(), BTreeSet::from([".docx".to_string()]));
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = ConverterRegistry::new();
        registry.register(".docx", Arc::new(Dummy("first")));
        registry.register(".docx", Arc::new(Dummy("second")));

        let resolved = registry.resolve(".docx").expect("resolve");
        assert_eq!(resolved.name(), "second");
        assert_eq!(registry.extensions().len(), 1);
    }

    #[test]
    fn builtin_registry_covers_all_formats() {
        let registry = ConverterRegistry::with_builtin_converters();
        let extensions = registry.extensions();
        for ext in [".docx", ".xlsx", ".pptx", ".pdf", ".vsdx"] {
            assert!(extensions.contains(ext), "missing {ext}");
        }
        assert_eq!(registry.resolve(".vsdx").expect("vsdx").name(), "visio_to_json");
    }

    #[test]
    fn output_rel_path_uses_output_root_name() {
        let rel = output_rel_path(Path::new("/repo/_normalized"), "docx", "a.md");
        assert_eq!(rel, "_normalized/docx/a.md");
    }
}
