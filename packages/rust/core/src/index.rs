//! Index artifact writing.
//!
//! Both artifacts are recreated in full on every run; nothing is merged with
//! a previous run's output. A write failure here is fatal to the run, since
//! a completed batch without a written index is worth little.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use docnorm_shared::{
    ConversionIndex, ConversionRecord, DocNormError, INDEX_FILE_NAME, MAP_FILE_NAME,
    NormalizedMap, Result,
};

/// Paths of the two artifacts written by [`write_artifacts`].
#[derive(Debug, Clone)]
pub struct IndexArtifacts {
    pub index_path: PathBuf,
    pub map_path: PathBuf,
}

/// Write `normalize.index.json` and `normalized-map.json` under the
/// normalized output directory.
pub fn write_artifacts(
    normalized_dir: &Path,
    records: &[ConversionRecord],
    map: &NormalizedMap,
) -> Result<IndexArtifacts> {
    let index = ConversionIndex {
        generated_at: Utc::now(),
        documents: records.to_vec(),
    };

    let index_path = normalized_dir.join(INDEX_FILE_NAME);
    write_json(&index_path, &index)?;

    let map_path = normalized_dir.join(MAP_FILE_NAME);
    write_json(&map_path, map)?;

    info!(
        index = %index_path.display(),
        map = %map_path.display(),
        documents = records.len(),
        "index artifacts written"
    );

    Ok(IndexArtifacts {
        index_path,
        map_path,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DocNormError::index(path, e.to_string()))?;
    std::fs::write(path, json).map_err(|e| DocNormError::index(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docnorm_shared::ConversionStatus;

    #[test]
    fn artifacts_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");

        let records = vec![
            ConversionRecord::success(
                "docs/test.docx",
                "_normalized/docx/test.md",
                "docx_to_md",
                "test_hash_123",
                serde_json::Map::new(),
            ),
            ConversionRecord::failed("a/broken.pdf", "pdf_to_md", "bad xref"),
        ];
        let mut map = NormalizedMap::new();
        map.insert("test.docx".to_string(), "_normalized/docx/test.md".to_string());

        let artifacts = write_artifacts(dir.path(), &records, &map).expect("write");

        let index: ConversionIndex = serde_json::from_str(
            &std::fs::read_to_string(&artifacts.index_path).expect("read index"),
        )
        .expect("parse index");
        assert_eq!(index.documents.len(), 2);
        assert_eq!(index.documents[0].source, "docs/test.docx");
        assert_eq!(index.documents[0].status, ConversionStatus::Success);
        assert_eq!(index.documents[1].status, ConversionStatus::Failed);

        let map_back: NormalizedMap = serde_json::from_str(
            &std::fs::read_to_string(&artifacts.map_path).expect("read map"),
        )
        .expect("parse map");
        assert_eq!(
            map_back.get("test.docx").map(String::as_str),
            Some("_normalized/docx/test.md")
        );
    }

    #[test]
    fn unwritable_directory_is_an_index_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("not_created");

        let result = write_artifacts(&missing, &[], &NormalizedMap::new());
        assert!(matches!(result, Err(DocNormError::Index { .. })));
    }
}
