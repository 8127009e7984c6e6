//! PDF → Markdown.
//!
//! Extracts text per page with `lopdf`, then reflows hard-wrapped lines into
//! paragraphs: a line ending in sentence punctuation (or a long line) closes
//! the current paragraph.

use std::path::Path;

use tracing::debug;

use crate::{
    ConvertError, ConvertResult, ConvertedDocument, Converter, ensure_subdir, frontmatter,
    output_rel_path, source_stem, write_output,
};

const SUBDIR: &str = "pdf";

/// Lines longer than this are treated as paragraph ends during reflow.
const LONG_LINE: usize = 100;

/// Converts PDF documents to Markdown preserving text content.
pub struct PdfConverter;

impl Converter for PdfConverter {
    fn name(&self) -> &'static str {
        "pdf_to_md"
    }

    fn convert(&self, source: &Path, output_root: &Path) -> ConvertResult {
        let document = lopdf::Document::load(source).map_err(|e| ConvertError::Open {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();

        let mut page_texts: Vec<String> = Vec::with_capacity(page_numbers.len());
        for number in &page_numbers {
            // Pages without extractable text contribute nothing.
            match document.extract_text(&[*number]) {
                Ok(text) => page_texts.push(text),
                Err(e) => {
                    debug!(page = number, error = %e, "no text extracted for page");
                    page_texts.push(String::new());
                }
            }
        }

        let raw = page_texts.join("\n");
        let paragraphs = reflow_paragraphs(&raw);

        let markdown = format!(
            "{}{}",
            frontmatter(source, self.name()),
            paragraphs.join("\n\n")
        );

        let dir = ensure_subdir(output_root, SUBDIR)?;
        let file_name = format!("{}.md", source_stem(source));
        write_output(&dir.join(&file_name), &markdown)?;

        debug!(
            pages = page_numbers.len(),
            characters = raw.len(),
            "pdf converted"
        );

        let mut metadata = serde_json::Map::new();
        metadata.insert("pages".into(), serde_json::json!(page_numbers.len()));
        metadata.insert("characters".into(), serde_json::json!(raw.len()));
        metadata.insert("paragraphs".into(), serde_json::json!(paragraphs.len()));

        Ok(ConvertedDocument {
            output: output_rel_path(output_root, SUBDIR, &file_name),
            metadata,
        })
    }
}

/// Join hard-wrapped lines back into paragraphs.
fn reflow_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let ends_paragraph =
            line.ends_with(['.', '!', '?', ':']) || line.len() > LONG_LINE;

        current.push(line);
        if ends_paragraph {
            paragraphs.push(current.join(" "));
            current.clear();
        }
    }

    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflow_joins_continuation_lines() {
        let text = "This sentence is split\nacross two lines.\nNext paragraph here.\ntrailing fragment";
        let paragraphs = reflow_paragraphs(text);
        assert_eq!(
            paragraphs,
            vec![
                "This sentence is split across two lines.",
                "Next paragraph here.",
                "trailing fragment",
            ]
        );
    }

    #[test]
    fn reflow_skips_blank_lines() {
        let paragraphs = reflow_paragraphs("\n\n  \nOnly line.\n\n");
        assert_eq!(paragraphs, vec!["Only line."]);
    }

    #[test]
    fn corrupt_pdf_is_a_declared_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("broken.pdf");
        std::fs::write(&source, b"%PDF-1.7 truncated garbage").expect("write");

        let result = PdfConverter.convert(&source, dir.path());
        assert!(matches!(result, Err(ConvertError::Open { .. })));
    }

    #[test]
    fn missing_file_is_a_declared_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = PdfConverter.convert(&dir.path().join("nope.pdf"), dir.path());
        assert!(matches!(result, Err(ConvertError::Open { .. })));
    }
}
