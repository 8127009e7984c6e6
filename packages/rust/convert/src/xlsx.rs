//! XLSX → CSV, one CSV per non-empty sheet.
//!
//! Shared strings and inline strings are resolved; cells are placed by their
//! column reference so sparse rows keep their shape. The first non-empty row
//! of a sheet becomes the CSV header, with `Column_N` filled in for blanks.

use std::collections::HashSet;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::{
    ConvertError, ConvertResult, ConvertedDocument, Converter, ensure_subdir, ooxml,
    output_rel_path, source_stem, write_output,
};

const SUBDIR: &str = "xlsx";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Hard cap on data rows emitted per sheet.
const MAX_ROWS_PER_SHEET: usize = 50_000;

/// Converts Microsoft Excel spreadsheets to CSV preserving sheets and data.
pub struct XlsxConverter;

impl Converter for XlsxConverter {
    fn name(&self) -> &'static str {
        "xlsx_to_csv"
    }

    fn convert(&self, source: &Path, output_root: &Path) -> ConvertResult {
        let mut archive = ooxml::open_archive(source)?;

        let sheet_names = parse_sheet_names(&ooxml::read_part(&mut archive, WORKBOOK_PART)?)?;
        let shared_strings = match ooxml::read_part(&mut archive, SHARED_STRINGS_PART) {
            Ok(xml) => parse_shared_strings(&xml)?,
            // Workbooks without string cells have no sharedStrings part.
            Err(_) => Vec::new(),
        };

        let parts = ooxml::numbered_parts(&archive, "xl/worksheets/sheet", ".xml");

        let dir = ensure_subdir(output_root, SUBDIR)?;
        let stem = source_stem(source);

        let mut written_sheets: Vec<String> = Vec::new();
        let mut first_output: Option<String> = None;
        let mut total_rows = 0usize;
        let mut used_names: HashSet<String> = HashSet::new();

        for (i, (_, part)) in parts.iter().enumerate() {
            let sheet_name = sheet_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Sheet{}", i + 1));

            let xml = ooxml::read_part(&mut archive, part)?;
            let rows = parse_sheet_rows(&xml, part, &shared_strings)?;

            let Some(csv) = render_csv(&rows) else {
                debug!(sheet = %sheet_name, "skipping empty sheet");
                continue;
            };

            let file_name = unique_file_name(&stem, &sheet_name, &mut used_names);
            write_output(&dir.join(&file_name), &csv.content)?;

            total_rows += csv.data_rows;
            written_sheets.push(sheet_name);
            if first_output.is_none() {
                first_output = Some(output_rel_path(output_root, SUBDIR, &file_name));
            }
        }

        let output = first_output
            .ok_or_else(|| ConvertError::Empty("workbook has no non-empty sheets".into()))?;

        let mut metadata = serde_json::Map::new();
        metadata.insert("total_sheets".into(), serde_json::json!(sheet_names.len()));
        metadata.insert("sheets".into(), serde_json::json!(written_sheets));
        metadata.insert("total_rows".into(), serde_json::json!(total_rows));

        Ok(ConvertedDocument { output, metadata })
    }
}

// ---------------------------------------------------------------------------
// Workbook parts
// ---------------------------------------------------------------------------

fn parse_error(part: &str, message: String) -> ConvertError {
    ConvertError::Parse {
        part: part.to_string(),
        message,
    }
}

/// Sheet names in document order from `xl/workbook.xml`.
fn parse_sheet_names(xml: &str) -> Result<Vec<String>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut names = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"sheet" => {
                if let Some(name) = attribute(&e, "name", WORKBOOK_PART)? {
                    names.push(name);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(WORKBOOK_PART, e.to_string())),
            _ => {}
        }
    }

    Ok(names)
}

/// The shared-string table, one concatenated string per `<si>`.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let piece = t
                    .unescape()
                    .map_err(|e| parse_error(SHARED_STRINGS_PART, e.to_string()))?;
                current.push_str(&piece);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(SHARED_STRINGS_PART, e.to_string())),
            _ => {}
        }
    }

    Ok(strings)
}

// ---------------------------------------------------------------------------
// Worksheet parsing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CellState {
    column: usize,
    is_shared: bool,
    value: String,
}

/// Dense rows (empty cells filled with "") from one worksheet part.
fn parse_sheet_rows(
    xml: &str,
    part: &str,
    shared_strings: &[String],
) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut reader = Reader::from_str(xml);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current_cells: Vec<(usize, String)> = Vec::new();
    let mut cell = CellState::default();
    let mut next_column = 0usize;
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"row" => {
                    current_cells.clear();
                    next_column = 0;
                }
                b"c" => cell = start_cell(&e, &mut next_column, part)?,
                b"v" => in_value = true,
                b"t" => in_inline_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"c" => {
                // Empty cell element: placeholder only, keeps column tracking honest.
                start_cell(&e, &mut next_column, part)?;
            }
            Ok(Event::Text(t)) if in_value || in_inline_text => {
                let piece = t.unescape().map_err(|e| parse_error(part, e.to_string()))?;
                cell.value.push_str(&piece);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"c" => {
                    let resolved = if cell.is_shared {
                        let idx: usize = cell.value.trim().parse().map_err(|_| {
                            parse_error(part, format!("bad shared string index {:?}", cell.value))
                        })?;
                        shared_strings.get(idx).cloned().unwrap_or_default()
                    } else {
                        std::mem::take(&mut cell.value)
                    };
                    if !resolved.is_empty() {
                        current_cells.push((cell.column, resolved));
                    }
                    cell = CellState::default();
                }
                b"row" => {
                    let width = current_cells
                        .iter()
                        .map(|(c, _)| c + 1)
                        .max()
                        .unwrap_or(0);
                    let mut row = vec![String::new(); width];
                    for (column, value) in current_cells.drain(..) {
                        row[column] = value;
                    }
                    rows.push(row);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(part, e.to_string())),
            _ => {}
        }
    }

    Ok(rows)
}

fn start_cell(
    e: &BytesStart<'_>,
    next_column: &mut usize,
    part: &str,
) -> Result<CellState, ConvertError> {
    let column = match attribute(e, "r", part)? {
        Some(reference) => column_index(&reference).unwrap_or(*next_column),
        None => *next_column,
    };
    *next_column = column + 1;
    let is_shared = attribute(e, "t", part)?.as_deref() == Some("s");
    Ok(CellState {
        column,
        is_shared,
        value: String::new(),
    })
}

/// `"B7"` → zero-based column index 1.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

// ---------------------------------------------------------------------------
// CSV rendering
// ---------------------------------------------------------------------------

struct RenderedCsv {
    content: String,
    data_rows: usize,
}

/// Render rows as CSV, or `None` when the sheet has no non-empty row.
fn render_csv(rows: &[Vec<String>]) -> Option<RenderedCsv> {
    let header_idx = rows
        .iter()
        .position(|row| row.iter().any(|cell| !cell.trim().is_empty()))?;

    let headers: Vec<String> = rows[header_idx]
        .iter()
        .enumerate()
        .map(|(j, cell)| {
            if cell.trim().is_empty() {
                format!("Column_{}", j + 1)
            } else {
                cell.clone()
            }
        })
        .collect();

    let data = &rows[header_idx + 1..];
    let data = &data[..data.len().min(MAX_ROWS_PER_SHEET)];

    let mut lines = Vec::with_capacity(data.len() + 1);
    lines.push(csv_line(&headers));
    for row in data {
        let mut padded = row.clone();
        padded.resize(headers.len().max(row.len()), String::new());
        lines.push(csv_line(&padded));
    }

    Some(RenderedCsv {
        content: lines.join("\n") + "\n",
        data_rows: data.len(),
    })
}

fn csv_line(cells: &[String]) -> String {
    cells
        .iter()
        .map(|c| csv_escape(c))
        .collect::<Vec<_>>()
        .join(",")
}

fn csv_escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn unique_file_name(stem: &str, sheet_name: &str, used: &mut HashSet<String>) -> String {
    let sanitized: String = sheet_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();

    let mut candidate = format!("{stem}__{sanitized}.csv");
    let mut counter = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{stem}__{sanitized}_{counter}.csv");
        counter += 1;
    }
    candidate
}

// ---------------------------------------------------------------------------
// Attribute helper
// ---------------------------------------------------------------------------

fn attribute(
    e: &BytesStart<'_>,
    name: &str,
    part: &str,
) -> Result<Option<String>, ConvertError> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::fixtures::write_container;

    const WORKBOOK: &str = r#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheets>
    <sheet name="Orders" sheetId="1"/>
    <sheet name="Blank" sheetId="2"/>
  </sheets>
</workbook>"#;

    const SHARED_STRINGS: &str = r#"<?xml version="1.0"?>
<sst><si><t>Name</t></si><si><t>Amount</t></si></sst>"#;

    const SHEET1: &str = r#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
    <row r="2"><c r="A2"><v>42</v></c><c r="B2" t="inlineStr"><is><t>hello, world</t></is></c></row>
  </sheetData>
</worksheet>"#;

    const SHEET2: &str = r#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData/>
</worksheet>"#;

    fn sample_workbook(dir: &Path) -> std::path::PathBuf {
        let source = dir.join("ledger.xlsx");
        write_container(
            &source,
            &[
                ("xl/workbook.xml", WORKBOOK),
                ("xl/sharedStrings.xml", SHARED_STRINGS),
                ("xl/worksheets/sheet1.xml", SHEET1),
                ("xl/worksheets/sheet2.xml", SHEET2),
            ],
        );
        source
    }

    #[test]
    fn converts_sheets_to_csv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = sample_workbook(dir.path());
        let output_root = dir.path().join("_normalized");
        std::fs::create_dir_all(&output_root).expect("output root");

        let result = XlsxConverter
            .convert(&source, &output_root)
            .expect("convert");

        assert_eq!(result.output, "_normalized/xlsx/ledger__Orders.csv");
        assert_eq!(result.metadata["total_sheets"], serde_json::json!(2));
        assert_eq!(result.metadata["sheets"], serde_json::json!(["Orders"]));
        assert_eq!(result.metadata["total_rows"], serde_json::json!(1));

        let csv = std::fs::read_to_string(output_root.join("xlsx/ledger__Orders.csv"))
            .expect("read csv");
        assert_eq!(csv, "Name,Amount\n42,\"hello, world\"\n");
    }

    #[test]
    fn workbook_with_only_empty_sheets_is_a_declared_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("empty.xlsx");
        write_container(
            &source,
            &[
                ("xl/workbook.xml", WORKBOOK),
                ("xl/worksheets/sheet1.xml", SHEET2),
            ],
        );

        let result = XlsxConverter.convert(&source, dir.path());
        assert!(matches!(result, Err(ConvertError::Empty(_))));
    }

    #[test]
    fn column_references_resolve() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("B7"), Some(1));
        assert_eq!(column_index("Z1"), Some(25));
        assert_eq!(column_index("AA10"), Some(26));
        assert_eq!(column_index("123"), None);
    }

    #[test]
    fn csv_escaping_quotes_and_commas() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn colliding_sheet_file_names_get_suffixes() {
        let mut used = HashSet::new();
        assert_eq!(unique_file_name("wb", "Q1 Data", &mut used), "wb__Q1_Data.csv");
        assert_eq!(
            unique_file_name("wb", "Q1-Data", &mut used),
            "wb__Q1_Data_2.csv"
        );
    }
}
