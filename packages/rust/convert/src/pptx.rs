//! PPTX → Markdown outline.
//!
//! Each slide becomes a `##` section. The first short paragraph on a slide is
//! taken as its title; remaining paragraphs become bullets, and speaker notes
//! are appended under a `**Notes:**` marker.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::{
    ConvertError, ConvertResult, ConvertedDocument, Converter, ensure_subdir, frontmatter, ooxml,
    output_rel_path, source_stem, write_output,
};

const SUBDIR: &str = "pptx";

/// Longest paragraph still considered a slide title.
const MAX_TITLE_LEN: usize = 100;

/// Converts Microsoft PowerPoint presentations to a Markdown outline.
pub struct PptxConverter;

impl Converter for PptxConverter {
    fn name(&self) -> &'static str {
        "pptx_to_md"
    }

    fn convert(&self, source: &Path, output_root: &Path) -> ConvertResult {
        let mut archive = ooxml::open_archive(source)?;

        let slide_parts = ooxml::numbered_parts(&archive, "ppt/slides/slide", ".xml");
        if slide_parts.is_empty() {
            return Err(ConvertError::Parse {
                part: "ppt/slides/".to_string(),
                message: "no slides found".to_string(),
            });
        }

        let header = frontmatter(source, self.name()).trim_end().to_string();
        let mut lines: Vec<String> = vec![header, String::new()];
        let mut has_notes = false;

        for (number, part) in &slide_parts {
            let xml = ooxml::read_part(&mut archive, part)?;
            let paragraphs = parse_text_paragraphs(&xml, part)?;

            let (title, body) = split_title(&paragraphs, *number);
            lines.push(format!("## {title}"));
            for paragraph in body {
                for line in paragraph.lines() {
                    let line = line.trim();
                    if !line.is_empty() {
                        lines.push(format!("- {line}"));
                    }
                }
            }

            // Speaker notes live in a sibling part with the same number.
            let notes_part = format!("ppt/notesSlides/notesSlide{number}.xml");
            if let Ok(notes_xml) = ooxml::read_part(&mut archive, &notes_part) {
                let notes = parse_text_paragraphs(&notes_xml, &notes_part)?;
                if !notes.is_empty() {
                    has_notes = true;
                    lines.push(String::new());
                    lines.push("**Notes:**".to_string());
                    for note in notes {
                        lines.push(format!("- {note}"));
                    }
                }
            }

            lines.push(String::new());
        }

        let markdown = lines.join("\n").trim_end().to_string();

        let dir = ensure_subdir(output_root, SUBDIR)?;
        let file_name = format!("{}.md", source_stem(source));
        write_output(&dir.join(&file_name), &markdown)?;

        debug!(slides = slide_parts.len(), has_notes, "pptx converted");

        let mut metadata = serde_json::Map::new();
        metadata.insert("slides".into(), serde_json::json!(slide_parts.len()));
        metadata.insert("has_notes".into(), serde_json::json!(has_notes));

        Ok(ConvertedDocument {
            output: output_rel_path(output_root, SUBDIR, &file_name),
            metadata,
        })
    }
}

/// Non-empty text paragraphs (`<a:p>` runs concatenated) from a slide part.
fn parse_text_paragraphs(xml: &str, part: &str) -> Result<Vec<String>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"a:p" => current.clear(),
                b"a:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let piece = t.unescape().map_err(|e| ConvertError::Parse {
                    part: part.to_string(),
                    message: e.to_string(),
                })?;
                current.push_str(&piece);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"a:t" => in_text = false,
                b"a:p" => {
                    let text = current.trim().to_string();
                    if !text.is_empty() {
                        paragraphs.push(text);
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ConvertError::Parse {
                    part: part.to_string(),
                    message: e.to_string(),
                });
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Pick the slide title and the remaining body paragraphs.
fn split_title(paragraphs: &[String], slide_number: u32) -> (String, Vec<String>) {
    for (i, paragraph) in paragraphs.iter().enumerate() {
        if paragraph.len() < MAX_TITLE_LEN {
            let title = paragraph.replace(['\n', '\r'], " ");
            let mut body: Vec<String> = paragraphs[..i].to_vec();
            body.extend_from_slice(&paragraphs[i + 1..]);
            return (title, body);
        }
    }
    (format!("Slide {slide_number}"), paragraphs.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::fixtures::write_container;

    const SLIDE1: &str = r#"<?xml version="1.0"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
       xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:cSld><p:spTree>
    <p:sp><p:txBody>
      <a:p><a:r><a:t>Quarterly Review</a:t></a:r></a:p>
      <a:p><a:r><a:t>Revenue up</a:t></a:r></a:p>
      <a:p><a:r><a:t>Costs flat</a:t></a:r></a:p>
    </p:txBody></p:sp>
  </p:spTree></p:cSld>
</p:sld>"#;

    const NOTES1: &str = r#"<?xml version="1.0"?>
<p:notes xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
         xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:cSld><p:spTree>
    <p:sp><p:txBody><a:p><a:r><a:t>Mention churn numbers</a:t></a:r></a:p></p:txBody></p:sp>
  </p:spTree></p:cSld>
</p:notes>"#;

    #[test]
    fn converts_slides_with_titles_bullets_and_notes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("deck.pptx");
        write_container(
            &source,
            &[
                ("ppt/slides/slide1.xml", SLIDE1),
                ("ppt/notesSlides/notesSlide1.xml", NOTES1),
            ],
        );
        let output_root = dir.path().join("_normalized");
        std::fs::create_dir_all(&output_root).expect("output root");

        let result = PptxConverter
            .convert(&source, &output_root)
            .expect("convert");

        assert_eq!(result.output, "_normalized/pptx/deck.md");
        assert_eq!(result.metadata["slides"], serde_json::json!(1));
        assert_eq!(result.metadata["has_notes"], serde_json::json!(true));

        let markdown =
            std::fs::read_to_string(output_root.join("pptx/deck.md")).expect("read output");
        assert!(markdown.contains("## Quarterly Review"));
        assert!(markdown.contains("- Revenue up"));
        assert!(markdown.contains("- Costs flat"));
        assert!(markdown.contains("**Notes:**"));
        assert!(markdown.contains("- Mention churn numbers"));
    }

    #[test]
    fn presentation_without_slides_is_a_declared_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("empty.pptx");
        write_container(&source, &[("ppt/presentation.xml", "<p:presentation/>")]);

        let result = PptxConverter.convert(&source, dir.path());
        assert!(matches!(result, Err(ConvertError::Parse { .. })));
    }

    #[test]
    fn long_first_paragraph_is_not_a_title() {
        let long = "x".repeat(150);
        let paragraphs = vec![long.clone(), "short".to_string()];
        let (title, body) = split_title(&paragraphs, 3);
        assert_eq!(title, "short");
        assert_eq!(body, vec![long]);
    }
}
