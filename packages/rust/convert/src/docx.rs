//! DOCX → Markdown.
//!
//! Reads `word/document.xml` and renders paragraphs, headings, list items,
//! and tables as Markdown with a YAML frontmatter header.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::{
    ConvertError, ConvertResult, ConvertedDocument, Converter, ensure_subdir, frontmatter, ooxml,
    output_rel_path, source_stem, write_output,
};

const SUBDIR: &str = "docx";
const DOCUMENT_PART: &str = "word/document.xml";

/// Converts Microsoft Word documents to Markdown preserving structure.
pub struct DocxConverter;

impl Converter for DocxConverter {
    fn name(&self) -> &'static str {
        "docx_to_md"
    }

    fn convert(&self, source: &Path, output_root: &Path) -> ConvertResult {
        let mut archive = ooxml::open_archive(source)?;
        let xml = ooxml::read_part(&mut archive, DOCUMENT_PART)?;

        let body = parse_document(&xml)?;

        let markdown = format!(
            "{}{}",
            frontmatter(source, self.name()),
            body.lines.join("\n").trim()
        );

        let dir = ensure_subdir(output_root, SUBDIR)?;
        let file_name = format!("{}.md", source_stem(source));
        write_output(&dir.join(&file_name), &markdown)?;

        debug!(
            paragraphs = body.paragraphs,
            tables = body.tables,
            "docx converted"
        );

        let mut metadata = serde_json::Map::new();
        metadata.insert("paragraphs".into(), serde_json::json!(body.paragraphs));
        metadata.insert("tables".into(), serde_json::json!(body.tables));

        Ok(ConvertedDocument {
            output: output_rel_path(output_root, SUBDIR, &file_name),
            metadata,
        })
    }
}

// ---------------------------------------------------------------------------
// document.xml parsing
// ---------------------------------------------------------------------------

struct DocumentBody {
    lines: Vec<String>,
    paragraphs: usize,
    tables: usize,
}

#[derive(Default)]
struct ParagraphState {
    text: String,
    style: Option<String>,
    in_list: bool,
}

fn parse_document(xml: &str) -> Result<DocumentBody, ConvertError> {
    let mut reader = Reader::from_str(xml);

    let mut lines: Vec<String> = Vec::new();
    let mut paragraphs = 0usize;
    let mut tables = 0usize;

    let mut paragraph = ParagraphState::default();
    let mut in_text = false;

    // Table accumulation; nested tables are flattened into the outer one.
    let mut table_depth = 0usize;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut cell_paragraphs: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        rows.clear();
                    }
                }
                b"w:tr" if table_depth == 1 => current_row.clear(),
                b"w:tc" if table_depth == 1 => cell_paragraphs.clear(),
                b"w:p" => paragraph = ParagraphState::default(),
                b"w:numPr" => paragraph.in_list = true,
                b"w:pStyle" => paragraph.style = style_value(&e)?,
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:numPr" => paragraph.in_list = true,
                b"w:pStyle" => paragraph.style = style_value(&e)?,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let piece = t.unescape().map_err(|e| parse_error(e.to_string()))?;
                paragraph.text.push_str(&piece);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let text = paragraph.text.trim().to_string();
                    if !text.is_empty() {
                        if table_depth > 0 {
                            cell_paragraphs.push(text);
                        } else {
                            paragraphs += 1;
                            lines.push(render_paragraph(&paragraph, &text));
                            lines.push(String::new());
                        }
                    }
                    paragraph = ParagraphState::default();
                }
                b"w:tc" if table_depth == 1 => {
                    current_row.push(cell_paragraphs.join(" "));
                }
                b"w:tr" if table_depth == 1 => {
                    rows.push(std::mem::take(&mut current_row));
                }
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 && !rows.is_empty() {
                        tables += 1;
                        render_table(&rows, &mut lines);
                        rows.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(e.to_string())),
            _ => {}
        }
    }

    Ok(DocumentBody {
        lines,
        paragraphs,
        tables,
    })
}

fn parse_error(message: String) -> ConvertError {
    ConvertError::Parse {
        part: DOCUMENT_PART.to_string(),
        message,
    }
}

fn style_value(e: &quick_xml::events::BytesStart<'_>) -> Result<Option<String>, ConvertError> {
    let attr = e
        .try_get_attribute("w:val")
        .map_err(|err| parse_error(err.to_string()))?;
    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|err| parse_error(err.to_string()))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn render_paragraph(paragraph: &ParagraphState, text: &str) -> String {
    if let Some(level) = heading_level(paragraph.style.as_deref()) {
        return format!("{} {text}", "#".repeat(level));
    }

    let is_list = paragraph.in_list
        || paragraph
            .style
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("ListParagraph"));

    if is_list {
        format!("- {text}")
    } else {
        text.to_string()
    }
}

/// Map `Heading1`..`Heading9` styles to Markdown heading levels, clamped to h1-h6.
fn heading_level(style: Option<&str>) -> Option<usize> {
    let style = style?;
    let lower = style.to_lowercase();
    let rest = lower.strip_prefix("heading")?;
    let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
    let level = digits.parse::<usize>().unwrap_or(1);
    Some(level.clamp(1, 6))
}

fn render_table(rows: &[Vec<String>], lines: &mut Vec<String>) {
    let Some(header) = rows.first() else {
        return;
    };

    lines.push("### Table".to_string());
    lines.push(format!("| {} |", header.join(" | ")));
    lines.push(format!(
        "| {} |",
        vec!["---"; header.len()].join(" | ")
    ));
    for row in &rows[1..] {
        lines.push(format!("| {} |", row.join(" | ")));
    }
    lines.push(String::new());
}
