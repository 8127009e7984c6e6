//! Helpers for the OOXML family (docx/xlsx/pptx/vsdx are ZIP containers
//! holding XML parts).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::ConvertError;

/// Open a source file as a ZIP archive.
pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<File>, ConvertError> {
    let file = File::open(path).map_err(|e| ConvertError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    ZipArchive::new(file).map_err(|e| ConvertError::Open {
        path: path.to_path_buf(),
        message: format!("not a valid OOXML container: {e}"),
    })
}

/// Read one archive part into a string.
pub(crate) fn read_part(
    archive: &mut ZipArchive<File>,
    part: &str,
) -> Result<String, ConvertError> {
    let mut entry = archive.by_name(part).map_err(|e| ConvertError::Parse {
        part: part.to_string(),
        message: e.to_string(),
    })?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ConvertError::Parse {
            part: part.to_string(),
            message: e.to_string(),
        })?;
    Ok(content)
}

/// Part names matching `<prefix><number><suffix>`, sorted by the number.
///
/// Used to enumerate slides (`ppt/slides/slide3.xml`), worksheets, and Visio
/// pages in document order.
pub(crate) fn numbered_parts(
    archive: &ZipArchive<File>,
    prefix: &str,
    suffix: &str,
) -> Vec<(u32, String)> {
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| numeric_infix(name, prefix, suffix).map(|n| (n, name.to_string())))
        .collect();
    parts.sort();
    parts
}

fn numeric_infix(name: &str, prefix: &str, suffix: &str) -> Option<u32> {
    let rest = name.strip_prefix(prefix)?;
    let digits = rest.strip_suffix(suffix)?;
    digits.parse().ok()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_parts_sort_numerically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("c.zip");
        fixtures::write_container(
            &path,
            &[
                ("ppt/slides/slide10.xml", "<a/>"),
                ("ppt/slides/slide2.xml", "<a/>"),
                ("ppt/slides/slide1.xml", "<a/>"),
                ("ppt/slides/_rels/slide1.xml.rels", "<a/>"),
            ],
        );

        let archive = open_archive(&path).expect("open");
        let parts = numbered_parts(&archive, "ppt/slides/slide", ".xml");
        let numbers: Vec<u32> = parts.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
    }

    #[test]
    fn non_zip_file_is_an_open_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.docx");
        std::fs::write(&path, b"plain bytes, not a zip").expect("write");

        let result = open_archive(&path);
        assert!(matches!(result, Err(ConvertError::Open { .. })));
    }
}
