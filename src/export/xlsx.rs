//! XLSX schema exporter
//!
//! Writes the table produced by [`crate::convert::tree_to_table`] into a
//! minimal SpreadsheetML package: a `schema` sheet holding the rows and a
//! `meta` sheet holding the format version. Text goes into inline strings,
//! booleans into `t="b"` cells and numbers into plain value cells, so the
//! reader gets every value back with its type.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ExportError;
use crate::convert::{Cell, Table, tree_to_table};
use crate::models::SchemaTree;

pub(crate) const SCHEMA_SHEET: &str = "schema";
pub(crate) const META_SHEET: &str = "meta";
pub(crate) const FORMAT_VERSION_KEY: &str = "format_version";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/></Relationships>"#;

/// Render a tree as XLSX bytes
pub fn write_xlsx(tree: &SchemaTree) -> Result<Vec<u8>, ExportError> {
    let table = tree_to_table(tree);
    tracing::debug!(
        "Writing {} schema rows across {} columns",
        table.rows.len(),
        table.header.len()
    );
    table_to_xlsx(&table)
}

/// Render an already flattened table as XLSX bytes
pub fn table_to_xlsx(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut schema_rows: Vec<Vec<Cell>> = Vec::with_capacity(table.rows.len() + 1);
    schema_rows.push(table.header.iter().cloned().map(Cell::Text).collect());
    schema_rows.extend(table.rows.iter().cloned());

    let meta_rows = vec![
        vec![Cell::Text("key".to_string()), Cell::Text("value".to_string())],
        vec![
            Cell::Text(FORMAT_VERSION_KEY.to_string()),
            Cell::Text(table.version.clone()),
        ],
    ];

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(&schema_rows)),
        ("xl/worksheets/sheet2.xml", sheet_xml(&meta_rows)),
    ];

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in parts {
        writer
            .start_file(name, options)
            .map_err(|e| ExportError::Workbook(format!("Failed to add {}: {}", name, e)))?;
        writer.write_all(content.as_bytes())?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| ExportError::Workbook(format!("Failed to finish archive: {}", e)))?;
    Ok(cursor.into_inner())
}

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/><sheet name="{}" sheetId="2" r:id="rId2"/></sheets></workbook>"#,
        SCHEMA_SHEET, META_SHEET
    )
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    for (r, row) in rows.iter().enumerate() {
        let row_number = r + 1;
        xml.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letters(c), row_number);
            match cell {
                Cell::Empty => {}
                Cell::Text(text) => xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    reference,
                    escape(text.as_str())
                )),
                Cell::Bool(b) => xml.push_str(&format!(
                    r#"<c r="{}" t="b"><v>{}</v></c>"#,
                    reference,
                    if *b { 1 } else { 0 }
                )),
                Cell::Number(n) => {
                    xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n))
                }
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Spreadsheet column name for a zero-based index (`0` → `A`, `26` → `AA`)
pub(crate) fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataType, SchemaNode};
    use std::io::Read;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_package_layout() {
        let tree = SchemaTree::new(vec![
            SchemaNode::section("s", "Fish & <Chips>")
                .with_child(SchemaNode::datapoint("d", "D", DataType::String).with_hidden(false)),
        ])
        .unwrap();
        let bytes = write_xlsx(&tree).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/worksheets/sheet1.xml",
            "xl/worksheets/sheet2.xml",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {}", name);
        }

        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains("Fish &amp; &lt;Chips&gt;"));
        assert!(sheet.contains(r#"t="b"><v>0</v>"#));
    }
}
