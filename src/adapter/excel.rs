//! Excel workbook adapter (reads xlsx, xls, ods; writes xlsx)

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use quick_xml::escape::escape;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::DEFAULT_SHEET_NAME;
use crate::error::{Error, Result};
use crate::model::{column_names, CellValue, ColumnSpec};

use super::{SinkAdapter, SourceAdapter};

/// Reads one sheet of a workbook
///
/// The first row is the header. Reading stops at the first row whose cells
/// are all empty, so anything below a blank row is not seen.
pub struct ExcelSource {
    header: Vec<String>,
    rows: VecDeque<Vec<CellValue>>,
}

impl ExcelSource {
    /// Open `path` at `sheet_name`, or at the first sheet
    pub fn open(path: &Path, sheet_name: Option<&str>) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)?;

        let sheet_name = match sheet_name {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| Error::Spreadsheet("No sheets found in workbook".to_string()))?,
        };

        let range: Range<Data> = workbook.worksheet_range(&sheet_name)?;
        let mut rows = range.rows();

        let header = match rows.next() {
            Some(row) => row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let name = cell_to_string(cell);
                    if name.is_empty() {
                        format!("Column{}", i + 1)
                    } else {
                        name
                    }
                })
                .collect(),
            None => Vec::new(),
        };
        let rows = rows
            .map(|row| row.iter().map(convert_cell).collect())
            .collect();

        debug!(path = %path.display(), sheet = %sheet_name, "Opened spreadsheet source");
        Ok(Self { header, rows })
    }
}

impl SourceAdapter for ExcelSource {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>> {
        match self.rows.pop_front() {
            Some(row) if row.iter().all(CellValue::is_blank) => {
                self.rows.clear();
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }
}

fn cell_to_string(cell: &Data) -> String {
    match convert_cell(cell) {
        CellValue::Null => String::new(),
        value => value.display().into_owned(),
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => {
            // Workbooks store every number as a double
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                CellValue::Int(*f as i64)
            } else {
                CellValue::Real(*f)
            }
        }
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Int(*b as i64),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => CellValue::Text(datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Real(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

/// Cell values of one sheet, anchored at a zero-based (row, column)
struct SheetData {
    name: String,
    origin: (u32, u32),
    rows: Vec<Vec<CellValue>>,
}

/// Writes rows into a new sheet of an xlsx workbook
///
/// An existing workbook keeps its sheets' cell values and gains the new
/// sheet; formatting and formulas of those sheets are not carried over.
/// Nothing reaches disk until `close`.
pub struct ExcelSink {
    path: PathBuf,
    columns: Vec<String>,
    sheets: Vec<SheetData>,
    closed: bool,
}

impl ExcelSink {
    /// Start a sheet named `sheet_name` (default `Sheet`) with a header row
    pub fn create(path: &Path, columns: &[ColumnSpec], sheet_name: Option<&str>) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !matches!(ext.as_str(), "xlsx" | "xlsm") {
            return Err(Error::Config(format!(
                "Spreadsheets can only be written as xlsx, not {}",
                path.display()
            )));
        }

        let mut sheets = if path.exists() {
            load_sheets(path)?
        } else {
            Vec::new()
        };

        let name = unique_sheet_name(&sheets, sheet_name.unwrap_or(DEFAULT_SHEET_NAME));
        check_sheet_name(&name)?;
        let columns = column_names(columns);
        sheets.push(SheetData {
            name,
            origin: (0, 0),
            rows: vec![columns.iter().map(|c| CellValue::Text(c.clone())).collect()],
        });

        debug!(path = %path.display(), sheets = sheets.len(), "Opened spreadsheet sink");
        Ok(Self {
            path: path.to_path_buf(),
            columns,
            sheets,
            closed: false,
        })
    }

    /// Name of the sheet being written
    pub fn sheet_name(&self) -> &str {
        self.sheets.last().map(|s| s.name.as_str()).unwrap_or(DEFAULT_SHEET_NAME)
    }
}

impl SinkAdapter for ExcelSink {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn write_values(&mut self, values: Vec<CellValue>) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if values.len() != self.columns.len() {
            return Err(Error::Config(format!(
                "Row has {} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        if let Some(sheet) = self.sheets.last_mut() {
            sheet.rows.push(values);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        write_workbook(&self.path, &self.sheets)?;
        debug!(path = %self.path.display(), "Saved workbook");
        Ok(())
    }
}

fn load_sheets(path: &Path) -> Result<Vec<SheetData>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        Error::Spreadsheet(format!("Could not open Excel file to append sheet: {}", e))
    })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        sheets.push(SheetData {
            origin: range.start().unwrap_or((0, 0)),
            rows: range
                .rows()
                .map(|row| row.iter().map(convert_cell).collect())
                .collect(),
            name,
        });
    }
    Ok(sheets)
}

fn unique_sheet_name(sheets: &[SheetData], wanted: &str) -> String {
    let taken = |name: &str| sheets.iter().any(|s| s.name.eq_ignore_ascii_case(name));
    if !taken(wanted) {
        return wanted.to_string();
    }
    (1..)
        .map(|n| format!("{}{}", wanted, n))
        .find(|name| !taken(name))
        .unwrap_or_else(|| wanted.to_string())
}

/// Longest sheet name a workbook accepts
const MAX_SHEET_NAME_LEN: usize = 31;

fn check_sheet_name(name: &str) -> Result<()> {
    let problem = if name.trim().is_empty() {
        Some("is empty".to_string())
    } else if name.chars().count() > MAX_SHEET_NAME_LEN {
        Some(format!("is longer than {} characters", MAX_SHEET_NAME_LEN))
    } else if let Some(c) = name.chars().find(|c| "[]:*?/\\".contains(*c)) {
        Some(format!("contains '{}'", c))
    } else if name.starts_with('\'') || name.ends_with('\'') {
        Some("starts or ends with an apostrophe".to_string())
    } else {
        None
    };
    match problem {
        Some(problem) => Err(Error::Config(format!(
            "Invalid sheet name '{}': {}",
            name, problem
        ))),
        None => Ok(()),
    }
}

/// Zero-based column index to its letter name (0 -> A, 26 -> AA)
fn column_letter(mut index: u32) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_DOC_RELS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn write_workbook(path: &Path, sheets: &[SheetData]) -> Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types_xml(sheets.len()).as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(package_rels_xml().as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook_xml(sheets).as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(workbook_rels_xml(sheets.len()).as_bytes())?;

    for (i, sheet) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        zip.write_all(sheet_xml(sheet).as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut xml = format!(
        "{XML_DECL}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>"
    );
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            "<Override PartName=\"/xl/worksheets/sheet{i}.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
        );
    }
    xml.push_str("</Types>");
    xml
}

fn package_rels_xml() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"{NS_PKG_RELS}\">\
         <Relationship Id=\"rId1\" Type=\"{NS_DOC_RELS}/officeDocument\" Target=\"xl/workbook.xml\"/>\
         </Relationships>"
    )
}

fn workbook_xml(sheets: &[SheetData]) -> String {
    let mut xml = format!(
        "{XML_DECL}<workbook xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_DOC_RELS}\"><sheets>"
    );
    for (i, sheet) in sheets.iter().enumerate() {
        let _ = write!(
            xml,
            "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
            escape(sheet.name.as_str()),
            i + 1,
            i + 1
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut xml = format!("{XML_DECL}<Relationships xmlns=\"{NS_PKG_RELS}\">");
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            "<Relationship Id=\"rId{i}\" Type=\"{NS_DOC_RELS}/worksheet\" Target=\"worksheets/sheet{i}.xml\"/>"
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn sheet_xml(sheet: &SheetData) -> String {
    let mut xml = format!("{XML_DECL}<worksheet xmlns=\"{NS_MAIN}\"><sheetData>");
    let (row0, col0) = sheet.origin;

    for (r, row) in sheet.rows.iter().enumerate() {
        let row_number = row0 + r as u32 + 1;
        let _ = write!(xml, "<row r=\"{}\">", row_number);
        for (c, value) in row.iter().enumerate() {
            let cell_ref = format!("{}{}", column_letter(col0 + c as u32), row_number);
            match value {
                CellValue::Null => {}
                CellValue::Int(i) => {
                    let _ = write!(xml, "<c r=\"{}\"><v>{}</v></c>", cell_ref, i);
                }
                CellValue::Real(f) if f.is_finite() => {
                    let _ = write!(xml, "<c r=\"{}\"><v>{}</v></c>", cell_ref, f);
                }
                other => {
                    let text = other.display();
                    let _ = write!(
                        xml,
                        "<c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                        cell_ref,
                        escape(&*text)
                    );
                }
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(names: &[&str]) -> Vec<ColumnSpec> {
        names.iter().map(|n| ColumnSpec::new(*n)).collect()
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_convert_cell() {
        assert_eq!(convert_cell(&Data::Float(3.0)), CellValue::Int(3));
        assert_eq!(convert_cell(&Data::Float(2.5)), CellValue::Real(2.5));
        assert_eq!(convert_cell(&Data::Bool(true)), CellValue::Int(1));
        assert_eq!(convert_cell(&Data::Empty), CellValue::Null);
    }

    #[test]
    fn test_write_then_read_stops_at_blank_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut sink = ExcelSink::create(&path, &specs(&["name", "qty"]), None).unwrap();
        sink.write_values(vec![CellValue::from("bolt <M6>"), CellValue::Int(40)])
            .unwrap();
        sink.write_values(vec![CellValue::from("nut"), CellValue::Real(2.5)])
            .unwrap();
        sink.write_values(vec![CellValue::Null, CellValue::Null]).unwrap();
        sink.write_values(vec![CellValue::from("hidden"), CellValue::Int(1)])
            .unwrap();
        sink.close().unwrap();

        let mut source = ExcelSource::open(&path, None).unwrap();
        assert_eq!(source.header(), ["name", "qty"]);
        assert_eq!(
            source.next_row().unwrap(),
            Some(vec![CellValue::from("bolt <M6>"), CellValue::Int(40)])
        );
        assert_eq!(
            source.next_row().unwrap(),
            Some(vec![CellValue::from("nut"), CellValue::Real(2.5)])
        );
        assert_eq!(source.next_row().unwrap(), None);
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn test_append_sheet_to_existing_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut first = ExcelSink::create(&path, &specs(&["a"]), None).unwrap();
        first.write_values(vec![CellValue::Int(1)]).unwrap();
        first.close().unwrap();

        let mut second = ExcelSink::create(&path, &specs(&["b"]), None).unwrap();
        assert_eq!(second.sheet_name(), "Sheet1");
        second.write_values(vec![CellValue::from("x")]).unwrap();
        second.close().unwrap();

        let mut original = ExcelSource::open(&path, Some("Sheet")).unwrap();
        assert_eq!(original.header(), ["a"]);
        assert_eq!(original.next_row().unwrap(), Some(vec![CellValue::Int(1)]));

        let mut added = ExcelSource::open(&path, Some("Sheet1")).unwrap();
        assert_eq!(added.header(), ["b"]);
        assert_eq!(added.next_row().unwrap(), Some(vec![CellValue::from("x")]));
    }

    #[test]
    fn test_check_sheet_name() {
        assert!(check_sheet_name("Sales 2024").is_ok());
        assert!(check_sheet_name(&"x".repeat(31)).is_ok());
        assert!(check_sheet_name(&"x".repeat(32)).is_err());
        assert!(check_sheet_name("").is_err());
        assert!(check_sheet_name("Q1/Q2").is_err());
        assert!(check_sheet_name("a[1]").is_err());
        assert!(check_sheet_name("'quoted'").is_err());
    }

    #[test]
    fn test_invalid_sheet_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        assert!(matches!(
            ExcelSink::create(&path, &specs(&["a"]), Some("what?")),
            Err(Error::Config(_))
        ));
        assert!(!path.exists());

        let long = "y".repeat(31);
        let mut first = ExcelSink::create(&path, &specs(&["a"]), Some(&long)).unwrap();
        first.close().unwrap();
        // A clash would need a suffix, which makes the name too long
        assert!(matches!(
            ExcelSink::create(&path, &specs(&["a"]), Some(&long)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_legacy_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xls");
        assert!(matches!(
            ExcelSink::create(&path, &specs(&["a"]), None),
            Err(Error::Config(_))
        ));
    }
}
