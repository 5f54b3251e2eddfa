//! XLSX schema importer
//!
//! Reads the `schema` sheet (or the first sheet when there is none by that
//! name) into a [`Table`] and rebuilds the tree with
//! [`crate::convert::table_to_tree`]. Shared strings, inline strings and
//! formula string results are all read as text; error cells are rejected.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use super::ImportError;
use crate::convert::{Cell, Table, table_to_tree};
use crate::export::xlsx::{FORMAT_VERSION_KEY, META_SHEET, SCHEMA_SHEET};
use crate::models::{DEFAULT_FORMAT_VERSION, SchemaTree};

/// Read an XLSX schema file
pub fn read_xlsx(path: &Path) -> Result<SchemaTree, ImportError> {
    let file = std::fs::File::open(path)?;
    let table = read_table(file)?;
    Ok(table_to_tree(&table)?)
}

/// Read an XLSX schema from memory
pub fn read_xlsx_bytes(bytes: &[u8]) -> Result<SchemaTree, ImportError> {
    let table = read_table(Cursor::new(bytes))?;
    Ok(table_to_tree(&table)?)
}

/// Read the schema sheet of a workbook as a table
pub fn read_table<R: Read + Seek>(source: R) -> Result<Table, ImportError> {
    let mut archive = ZipArchive::new(source)
        .map_err(|e| ImportError::Workbook(format!("Failed to read archive: {}", e)))?;

    let sheets = sheet_paths(&mut archive)?;
    let shared = match read_part(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => parse_shared_strings(&xml)?,
        Err(_) => Vec::new(),
    };

    let schema_path = sheets
        .iter()
        .find(|(name, _)| name == SCHEMA_SHEET)
        .or_else(|| sheets.first())
        .map(|(_, path)| path.clone())
        .ok_or_else(|| ImportError::Workbook("workbook has no sheets".to_string()))?;

    let mut rows = parse_sheet(&read_part(&mut archive, &schema_path)?, &shared)?;
    if rows.is_empty() {
        return Err(ImportError::Workbook("schema sheet is empty".to_string()));
    }
    let header = rows.remove(0).iter().map(Cell::display).collect();

    let version = match sheets.iter().find(|(name, _)| name == META_SHEET) {
        Some((_, path)) => {
            let meta = parse_sheet(&read_part(&mut archive, path)?, &shared)?;
            meta.iter()
                .find(|row| row.first().map(Cell::display).as_deref() == Some(FORMAT_VERSION_KEY))
                .and_then(|row| row.get(1))
                .map(Cell::display)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_FORMAT_VERSION.to_string())
        }
        None => DEFAULT_FORMAT_VERSION.to_string(),
    };

    tracing::debug!("Read {} schema rows (format version {})", rows.len(), version);

    Ok(Table {
        version,
        header,
        rows,
    })
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, ImportError> {
    let mut part = archive
        .by_name(name)
        .map_err(|e| ImportError::Workbook(format!("Failed to find {}: {}", name, e)))?;
    let mut content = String::new();
    part.read_to_string(&mut content)?;
    Ok(content)
}

fn xml_error(part: &str, e: impl std::fmt::Display) -> ImportError {
    ImportError::Workbook(format!("Malformed {}: {}", part, e))
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, ImportError> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == local {
            let value = attr
                .unescape_value()
                .map_err(|err| xml_error("attribute", err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Sheet names in workbook order with their part paths
fn sheet_paths<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<(String, String)>, ImportError> {
    let rels_xml = read_part(archive, "xl/_rels/workbook.xml.rels")?;
    let mut targets: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(&rels_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attribute(e, b"Id")?, attribute(e, b"Target")?) {
                    let path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    };
                    targets.insert(id, path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("workbook relationships", e)),
            _ => {}
        }
    }

    let workbook_xml = read_part(archive, "xl/workbook.xml")?;
    let mut sheets = Vec::new();
    let mut reader = Reader::from_str(&workbook_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                let name = attribute(e, b"name")?.unwrap_or_default();
                if let Some(path) = attribute(e, b"id")?.and_then(|id| targets.get(&id).cloned()) {
                    sheets.push((name, path));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("workbook", e)),
            _ => {}
        }
    }

    Ok(sheets)
}

/// Shared string table; rich-text runs are concatenated, phonetic hints skipped
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ImportError> {
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" if !in_phonetic => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(ref e)) if in_text => {
                current.push_str(&e.unescape().map_err(|err| xml_error("shared strings", err))?);
            }
            Ok(Event::CData(ref e)) if in_text => {
                current.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("shared strings", e)),
            _ => {}
        }
    }

    Ok(strings)
}

/// A `<c>` element being read
struct PendingCell {
    reference: String,
    column: usize,
    cell_type: Option<String>,
    text: String,
}

impl PendingCell {
    fn from_start(e: &BytesStart<'_>, next_column: usize) -> Result<Self, ImportError> {
        let reference = attribute(e, b"r")?.unwrap_or_default();
        let column = column_index(&reference)?.unwrap_or(next_column);
        if column >= MAX_COLUMNS {
            return Err(ImportError::Workbook(format!(
                "cell {} lies beyond column XFD",
                if reference.is_empty() { "without reference" } else { reference.as_str() }
            )));
        }
        Ok(Self {
            reference,
            column,
            cell_type: attribute(e, b"t")?,
            text: String::new(),
        })
    }

    fn into_cell(self, shared: &[String]) -> Result<Cell, ImportError> {
        let at = |reason: String| ImportError::Workbook(format!("cell {}: {}", self.reference, reason));
        match self.cell_type.as_deref() {
            Some("s") => {
                if self.text.trim().is_empty() {
                    return Ok(Cell::Empty);
                }
                let index: usize = self
                    .text
                    .trim()
                    .parse()
                    .map_err(|_| at(format!("bad shared string index '{}'", self.text)))?;
                shared
                    .get(index)
                    .map(|s| Cell::Text(s.clone()))
                    .ok_or_else(|| at(format!("shared string {} does not exist", index)))
            }
            Some("inlineStr") | Some("str") | Some("d") => Ok(Cell::Text(self.text)),
            Some("b") => match self.text.trim() {
                "1" | "true" | "TRUE" => Ok(Cell::Bool(true)),
                "0" | "false" | "FALSE" => Ok(Cell::Bool(false)),
                "" => Ok(Cell::Empty),
                other => Err(at(format!("bad boolean value '{}'", other))),
            },
            Some("e") => Err(at(format!("error value '{}'", self.text))),
            Some("n") | None => {
                let raw = self.text.trim();
                if raw.is_empty() {
                    return Ok(Cell::Empty);
                }
                raw.parse::<f64>()
                    .map(Cell::Number)
                    .map_err(|_| at(format!("bad number '{}'", raw)))
            }
            Some(other) => Err(at(format!("unsupported cell type '{}'", other))),
        }
    }
}

/// Sheet size limits of the SpreadsheetML format (column `XFD`, row 1048576)
const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;

/// Zero-based column of a reference such as `AB12`
fn column_index(reference: &str) -> Result<Option<usize>, ImportError> {
    let mut number = 0usize;
    let mut seen = false;
    for b in reference.bytes().take_while(u8::is_ascii_alphabetic) {
        seen = true;
        number = number * 26 + usize::from(b.to_ascii_uppercase() - b'A' + 1);
        if number > MAX_COLUMNS {
            return Err(ImportError::Workbook(format!(
                "cell {} lies beyond column XFD",
                reference
            )));
        }
    }
    Ok(seen.then(|| number - 1))
}

fn place(rows: &mut Vec<Vec<Cell>>, row: usize, column: usize, cell: Cell) {
    if cell.is_empty() {
        return;
    }
    if rows.len() <= row {
        rows.resize_with(row + 1, Vec::new);
    }
    let cells = &mut rows[row];
    if cells.len() <= column {
        cells.resize(column + 1, Cell::Empty);
    }
    cells[column] = cell;
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<Cell>>, ImportError> {
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut row = 0usize;
    let mut rows_seen = 0usize;
    let mut next_column = 0usize;
    let mut pending: Option<PendingCell> = None;
    let mut capture = false;
    let mut in_phonetic = false;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = row_number(e)?.unwrap_or(rows_seen);
                    rows_seen = row + 1;
                    next_column = 0;
                }
                b"c" => pending = Some(PendingCell::from_start(e, next_column)?),
                b"v" | b"t" if pending.is_some() && !in_phonetic => capture = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = row_number(e)?.unwrap_or(rows_seen);
                    rows_seen = row + 1;
                }
                b"c" => {
                    let cell = PendingCell::from_start(e, next_column)?;
                    next_column = cell.column + 1;
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if capture => {
                if let Some(cell) = pending.as_mut() {
                    cell.text
                        .push_str(&e.unescape().map_err(|err| xml_error("worksheet", err))?);
                }
            }
            Ok(Event::CData(ref e)) if capture => {
                if let Some(cell) = pending.as_mut() {
                    cell.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let column = cell.column;
                        next_column = column + 1;
                        place(&mut rows, row, column, cell.into_cell(shared)?);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("worksheet", e)),
            _ => {}
        }
    }

    // Rows that exist only as formatting leave gaps; keep positions but
    // drop trailing empties.
    while rows.last().is_some_and(|r| r.iter().all(Cell::is_empty)) {
        rows.pop();
    }
    Ok(rows)
}

fn row_number(e: &BytesStart<'_>) -> Result<Option<usize>, ImportError> {
    match attribute(e, b"r")? {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=MAX_ROWS).contains(n))
            .map(|n| Some(n - 1))
            .ok_or_else(|| xml_error("worksheet", format!("bad row number '{}'", raw))),
        None => Ok(None),
    }
}
