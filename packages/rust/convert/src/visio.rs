//! VSDX → JSON + Mermaid.
//!
//! Extracts shapes and connectors from each Visio page into a structured JSON
//! document, and renders the connection graph as a Mermaid flowchart. The
//! index records the JSON path; the `.mmd` file is a sibling output.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use tracing::debug;

use crate::{
    ConvertError, ConvertResult, ConvertedDocument, Converter, ensure_subdir, ooxml,
    output_rel_path, source_stem, write_output,
};

const SUBDIR: &str = "visio";
const PAGES_INDEX_PART: &str = "visio/pages/pages.xml";

/// Converts Visio diagrams to JSON data and Mermaid flowcharts.
pub struct VisioConverter;

#[derive(Debug, Clone, Serialize)]
struct VisioShape {
    id: String,
    name: String,
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct VisioConnector {
    id: String,
    text: String,
    from_shape: Option<String>,
    to_shape: Option<String>,
}

#[derive(Debug, Serialize)]
struct VisioPage {
    name: String,
    shapes: Vec<VisioShape>,
    connectors: Vec<VisioConnector>,
}

#[derive(Debug, Serialize)]
struct VisioDocument {
    source_file: String,
    converted_at: String,
    pages: Vec<VisioPage>,
    total_shapes: usize,
    total_connectors: usize,
}

impl Converter for VisioConverter {
    fn name(&self) -> &'static str {
        "visio_to_json"
    }

    fn convert(&self, source: &Path, output_root: &Path) -> ConvertResult {
        let mut archive = ooxml::open_archive(source)?;

        let page_parts = ooxml::numbered_parts(&archive, "visio/pages/page", ".xml");
        if page_parts.is_empty() {
            return Err(ConvertError::Parse {
                part: "visio/pages/".to_string(),
                message: "no pages found".to_string(),
            });
        }

        let page_names = match ooxml::read_part(&mut archive, PAGES_INDEX_PART) {
            Ok(xml) => parse_page_names(&xml)?,
            Err(_) => Vec::new(),
        };

        let mut pages = Vec::new();
        for (i, (number, part)) in page_parts.iter().enumerate() {
            let xml = ooxml::read_part(&mut archive, part)?;
            let name = page_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Page-{number}"));
            pages.push(parse_page(&xml, part, name)?);
        }

        let total_shapes: usize = pages.iter().map(|p| p.shapes.len()).sum();
        let total_connectors: usize = pages.iter().map(|p| p.connectors.len()).sum();

        let document = VisioDocument {
            source_file: source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            converted_at: chrono::Utc::now()
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            pages,
            total_shapes,
            total_connectors,
        };

        let json = serde_json::to_string_pretty(&document).map_err(|e| ConvertError::Parse {
            part: "json output".to_string(),
            message: e.to_string(),
        })?;

        let dir = ensure_subdir(output_root, SUBDIR)?;
        let stem = source_stem(source);
        let json_name = format!("{stem}.json");
        write_output(&dir.join(&json_name), &json)?;

        let mermaid = render_mermaid(&document);
        write_output(&dir.join(format!("{stem}.mmd")), &mermaid)?;

        debug!(
            pages = document.pages.len(),
            shapes = total_shapes,
            connectors = total_connectors,
            "visio converted"
        );

        let mut metadata = serde_json::Map::new();
        metadata.insert("pages".into(), serde_json::json!(document.pages.len()));
        metadata.insert("shapes".into(), serde_json::json!(total_shapes));
        metadata.insert("connectors".into(), serde_json::json!(total_connectors));
        metadata.insert("edges".into(), serde_json::json!(total_connectors));

        Ok(ConvertedDocument {
            output: output_rel_path(output_root, SUBDIR, &json_name),
            metadata,
        })
    }
}

// ---------------------------------------------------------------------------
// Page XML parsing
// ---------------------------------------------------------------------------

fn parse_error(part: &str, message: String) -> ConvertError {
    ConvertError::Parse {
        part: part.to_string(),
        message,
    }
}

/// Page display names in document order from `visio/pages/pages.xml`.
fn parse_page_names(xml: &str) -> Result<Vec<String>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut names = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Page" => {
                if let Some(name) = attribute(&e, "Name", PAGES_INDEX_PART)? {
                    names.push(name);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(PAGES_INDEX_PART, e.to_string())),
            _ => {}
        }
    }

    Ok(names)
}

/// One `Connect` element: a connector shape's endpoint binding.
struct ConnectEntry {
    from_sheet: String,
    from_cell: String,
    to_sheet: String,
}

fn parse_page(xml: &str, part: &str, name: String) -> Result<VisioPage, ConvertError> {
    let mut reader = Reader::from_str(xml);

    // Shapes can nest inside group shapes; track a stack and attribute text
    // to the innermost shape.
    let mut shape_stack: Vec<VisioShape> = Vec::new();
    let mut all_shapes: Vec<VisioShape> = Vec::new();
    let mut connects: Vec<ConnectEntry> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"Shape" => shape_stack.push(shape_from_element(&e, part)?),
                b"Text" => in_text = true,
                b"Connect" => connects.push(connect_from_element(&e, part)?),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"Shape" => all_shapes.push(shape_from_element(&e, part)?),
                b"Connect" => connects.push(connect_from_element(&e, part)?),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let piece = t.unescape().map_err(|e| parse_error(part, e.to_string()))?;
                if let Some(shape) = shape_stack.last_mut() {
                    shape.text.push_str(&piece);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"Text" => in_text = false,
                b"Shape" => {
                    if let Some(mut shape) = shape_stack.pop() {
                        shape.text = shape.text.trim().to_string();
                        all_shapes.push(shape);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(part, e.to_string())),
            _ => {}
        }
    }

    // A connector is the shape whose ID appears as FromSheet in Connect
    // entries: BeginX binds its source, EndX its target.
    let mut endpoints: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();
    for connect in &connects {
        let entry = endpoints.entry(connect.from_sheet.clone()).or_default();
        match connect.from_cell.as_str() {
            "BeginX" => entry.0 = Some(connect.to_sheet.clone()),
            "EndX" => entry.1 = Some(connect.to_sheet.clone()),
            _ => {}
        }
    }

    let mut shapes = Vec::new();
    let mut connectors = Vec::new();
    for shape in all_shapes {
        match endpoints.get(&shape.id) {
            Some((from, to)) => connectors.push(VisioConnector {
                id: shape.id,
                text: shape.text,
                from_shape: from.clone(),
                to_shape: to.clone(),
            }),
            None => shapes.push(shape),
        }
    }

    Ok(VisioPage {
        name,
        shapes,
        connectors,
    })
}

fn shape_from_element(e: &BytesStart<'_>, part: &str) -> Result<VisioShape, ConvertError> {
    let id = attribute(e, "ID", part)?.unwrap_or_default();
    let name = attribute(e, "Name", part)?
        .or(attribute(e, "NameU", part)?)
        .unwrap_or_default();
    Ok(VisioShape {
        id,
        name,
        text: String::new(),
    })
}

fn connect_from_element(e: &BytesStart<'_>, part: &str) -> Result<ConnectEntry, ConvertError> {
    Ok(ConnectEntry {
        from_sheet: attribute(e, "FromSheet", part)?.unwrap_or_default(),
        from_cell: attribute(e, "FromCell", part)?.unwrap_or_default(),
        to_sheet: attribute(e, "ToSheet", part)?.unwrap_or_default(),
    })
}

fn attribute(e: &BytesStart<'_>, name: &str, part: &str) -> Result<Option<String>, ConvertError> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| parse_error(part, err.to_string()))?;
    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|err| parse_error(part, err.to_string()))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Mermaid rendering
// ---------------------------------------------------------------------------

fn render_mermaid(document: &VisioDocument) -> String {
    let mut lines = vec!["flowchart TD".to_string()];

    for page in &document.pages {
        for shape in &page.shapes {
            lines.push(format!(
                "    S{}[\"{}\"]",
                shape.id,
                mermaid_label(shape)
            ));
        }
        for connector in &page.connectors {
            let (Some(from), Some(to)) = (&connector.from_shape, &connector.to_shape) else {
                continue;
            };
            if connector.text.is_empty() {
                lines.push(format!("    S{from} --> S{to}"));
            } else {
                lines.push(format!(
                    "    S{from} -->|{}| S{to}",
                    connector.text.replace('|', "/")
                ));
            }
        }
    }

    lines.join("\n") + "\n"
}

fn mermaid_label(shape: &VisioShape) -> String {
    let label = if !shape.text.is_empty() {
        &shape.text
    } else if !shape.name.is_empty() {
        &shape.name
    } else {
        return format!("Shape_{}", shape.id);
    };
    label.replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::fixtures::write_container;

    const PAGES_XML: &str = r#"<?xml version="1.0"?>
<Pages><Page ID="0" Name="Flow"/></Pages>"#;

    const PAGE1: &str = r#"<?xml version="1.0"?>
<PageContents>
  <Shapes>
    <Shape ID="1" Name="Start"><Text>Begin</Text></Shape>
    <Shape ID="2" Name="Finish"><Text>Done</Text></Shape>
    <Shape ID="3" Name="Edge"><Text>go</Text></Shape>
  </Shapes>
  <Connects>
    <Connect FromSheet="3" FromCell="BeginX" ToSheet="1"/>
    <Connect FromSheet="3" FromCell="EndX" ToSheet="2"/>
  </Connects>
</PageContents>"#;

    #[test]
    fn converts_shapes_and_connectors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("flow.vsdx");
        write_container(
            &source,
            &[
                ("visio/pages/pages.xml", PAGES_XML),
                ("visio/pages/page1.xml", PAGE1),
            ],
        );
        let output_root = dir.path().join("_normalized");
        std::fs::create_dir_all(&output_root).expect("output root");

        let result = VisioConverter
            .convert(&source, &output_root)
            .expect("convert");

        assert_eq!(result.output, "_normalized/visio/flow.json");
        assert_eq!(result.metadata["pages"], serde_json::json!(1));
        assert_eq!(result.metadata["shapes"], serde_json::json!(2));
        assert_eq!(result.metadata["connectors"], serde_json::json!(1));

        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(output_root.join("visio/flow.json")).expect("read json"),
        )
        .expect("parse json");
        assert_eq!(json["pages"][0]["name"], "Flow");
        assert_eq!(json["pages"][0]["shapes"][0]["text"], "Begin");
        assert_eq!(json["pages"][0]["connectors"][0]["from_shape"], "1");
        assert_eq!(json["pages"][0]["connectors"][0]["to_shape"], "2");

        let mermaid =
            std::fs::read_to_string(output_root.join("visio/flow.mmd")).expect("read mermaid");
        assert!(mermaid.starts_with("flowchart TD"));
        assert!(mermaid.contains("S1[\"Begin\"]"));
        assert!(mermaid.contains("S1 -->|go| S2"));
    }

    #[test]
    fn file_without_pages_is_a_declared_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("odd.vsdx");
        write_container(&source, &[("docProps/app.xml", "<x/>")]);

        let result = VisioConverter.convert(&source, dir.path());
        assert!(matches!(result, Err(ConvertError::Parse { .. })));
    }
}
