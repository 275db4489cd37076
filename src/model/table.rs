//! In-memory table with name-or-position addressing

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::entry::{Entry, EntryMut};
use super::record::{zip_record, Record};
use super::schema::ensure_unique;
use super::value::CellValue;
use crate::adapter::SourceAdapter;
use crate::error::{Axis, Error, Result};
use crate::stream::Writer;

/// A row or column address: a declared label or a zero-based position
///
/// A name that is not declared falls back to being parsed as a position, so
/// `Key::Name("2")` reaches the third row when rows carry no labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(name: &'a str) -> Self {
        Key::Name(name)
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(name: &'a String) -> Self {
        Key::Name(name.as_str())
    }
}

impl From<usize> for Key<'_> {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl std::fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Name(name) => write!(f, "{}", name),
            Key::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Optional header overrides applied while loading a table
#[derive(Debug, Clone, Default)]
pub struct TableLayout {
    /// Column names to use instead of the source header
    pub column_headers: Option<Vec<String>>,
    /// One label per data row; rows are addressed by position otherwise
    pub row_headers: Option<Vec<String>>,
}

impl TableLayout {
    /// Override the column names
    pub fn with_column_headers(mut self, headers: Vec<String>) -> Self {
        self.column_headers = Some(headers);
        self
    }

    /// Label every row
    pub fn with_row_headers(mut self, headers: Vec<String>) -> Self {
        self.row_headers = Some(headers);
        self
    }
}

/// A fully materialized table
///
/// Cells are stored row-major. Column names are unique; rows are addressed
/// either through explicit labels or by position.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<String>,
    column_index: FxHashMap<String, usize>,
    row_labels: Option<Vec<String>>,
    row_index: FxHashMap<String, usize>,
    cells: Vec<Vec<CellValue>>,
}

impl Table {
    /// Load a table from any backend
    pub fn open(
        path: impl AsRef<std::path::Path>,
        options: &crate::config::OpenOptions,
        layout: TableLayout,
    ) -> Result<Self> {
        let mut source = crate::adapter::AdapterFactory::open_source(path.as_ref(), options)?;
        Self::from_source(source.as_mut(), layout)
    }

    /// Read `source` to exhaustion and build a table from its output
    pub fn from_source(source: &mut dyn SourceAdapter, layout: TableLayout) -> Result<Self> {
        let header = source.header().to_vec();
        let mut rows = Vec::new();
        while let Some(row) = source.next_row()? {
            rows.push(row);
        }
        source.close()?;

        let columns = layout.column_headers.unwrap_or(header);
        Self::from_rows(columns, rows, layout.row_headers)
    }

    /// Build a table from in-memory rows
    pub fn from_rows(
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
        row_labels: Option<Vec<String>>,
    ) -> Result<Self> {
        ensure_unique(&columns)?;
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::RowWidth {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }

        let mut row_index = FxHashMap::default();
        if let Some(labels) = &row_labels {
            if labels.len() != rows.len() {
                return Err(Error::LabelCount {
                    labels: labels.len(),
                    rows: rows.len(),
                });
            }
            for (i, label) in labels.iter().enumerate() {
                if row_index.insert(label.clone(), i).is_some() {
                    return Err(Error::DuplicateLabel(label.clone()));
                }
            }
        }

        let table = Self {
            columns,
            column_index,
            row_labels,
            row_index,
            cells: rows,
        };

        if table.first_row_matches_header() {
            warn!("First row is identical to column headers; the header may be counted twice");
        }
        debug!(
            rows = table.row_count(),
            columns = table.column_count(),
            "Loaded table"
        );
        Ok(table)
    }

    /// Column names in order
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Explicit row labels, if any were given
    pub fn row_labels(&self) -> Option<&[String]> {
        self.row_labels.as_deref()
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether the first data row repeats the column names
    ///
    /// Values are compared in their rendered form, so a numeric `2020`
    /// matches a header named `"2020"`.
    pub fn first_row_matches_header(&self) -> bool {
        match self.cells.first() {
            Some(first) if !self.columns.is_empty() => first
                .iter()
                .zip(&self.columns)
                .all(|(value, name)| value.display() == name.as_str()),
            _ => false,
        }
    }

    /// Resolve a key on one axis to a position
    pub fn resolve(&self, axis: Axis, key: Key<'_>) -> Result<usize> {
        let (labels, len) = match axis {
            Axis::Row => (&self.row_index, self.row_count()),
            Axis::Column => (&self.column_index, self.column_count()),
        };

        let index = match key {
            Key::Index(index) => index,
            Key::Name(name) => {
                if let Some(&index) = labels.get(name) {
                    return Ok(index);
                }
                name.trim()
                    .parse::<usize>()
                    .map_err(|_| Error::LabelNotFound {
                        axis,
                        label: name.to_string(),
                    })?
            }
        };

        if index < len {
            Ok(index)
        } else {
            Err(Error::IndexOutOfRange { axis, index, len })
        }
    }

    /// Resolve a cell address where either axis may be missing
    pub fn locate(&self, row: Option<Key<'_>>, column: Option<Key<'_>>) -> Result<(usize, usize)> {
        let row = row.ok_or(Error::UnspecifiedAxis(Axis::Row))?;
        let column = column.ok_or(Error::UnspecifiedAxis(Axis::Column))?;
        Ok((
            self.resolve(Axis::Row, row)?,
            self.resolve(Axis::Column, column)?,
        ))
    }

    /// Get the value stored at (`row`, `column`)
    pub fn get_cell<'k>(
        &self,
        row: impl Into<Key<'k>>,
        column: impl Into<Key<'k>>,
    ) -> Result<&CellValue> {
        let (r, c) = self.locate(Some(row.into()), Some(column.into()))?;
        Ok(&self.cells[r][c])
    }

    /// Overwrite the value at (`row`, `column`) and return the stored value
    pub fn set_cell<'k>(
        &mut self,
        row: impl Into<Key<'k>>,
        column: impl Into<Key<'k>>,
        value: impl Into<CellValue>,
    ) -> Result<&CellValue> {
        let (r, c) = self.locate(Some(row.into()), Some(column.into()))?;
        let slot = &mut self.cells[r][c];
        *slot = value.into();
        Ok(&*slot)
    }

    /// View one row
    pub fn get_row<'k>(&self, key: impl Into<Key<'k>>) -> Result<Entry<'_>> {
        let index = self.resolve(Axis::Row, key.into())?;
        Ok(Entry::new(self, Axis::Row, index))
    }

    /// View one column
    pub fn get_col<'k>(&self, key: impl Into<Key<'k>>) -> Result<Entry<'_>> {
        let index = self.resolve(Axis::Column, key.into())?;
        Ok(Entry::new(self, Axis::Column, index))
    }

    /// Mutable view of one row
    pub fn get_row_mut<'k>(&mut self, key: impl Into<Key<'k>>) -> Result<EntryMut<'_>> {
        let index = self.resolve(Axis::Row, key.into())?;
        Ok(EntryMut::new(self, Axis::Row, index))
    }

    /// Mutable view of one column
    pub fn get_col_mut<'k>(&mut self, key: impl Into<Key<'k>>) -> Result<EntryMut<'_>> {
        let index = self.resolve(Axis::Column, key.into())?;
        Ok(EntryMut::new(self, Axis::Column, index))
    }

    /// Label of the row at `index`; its position when rows are unlabelled
    pub fn row_label(&self, index: usize) -> Option<String> {
        if index >= self.row_count() {
            return None;
        }
        match &self.row_labels {
            Some(labels) => labels.get(index).cloned(),
            None => Some(index.to_string()),
        }
    }

    /// Iterate rows as value slices
    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.cells.iter().map(|row| row.as_slice())
    }

    /// Every row as a record keyed by column name
    pub fn records(&self) -> Vec<Record> {
        self.cells
            .iter()
            .map(|row| zip_record(&self.columns, row.clone()))
            .collect()
    }

    /// Write every row through `writer`, projected onto its columns
    pub fn write_to(&self, writer: &mut Writer) -> Result<()> {
        for record in self.records() {
            writer.write(record)?;
        }
        Ok(())
    }

    pub(crate) fn cell_at(&self, row: usize, column: usize) -> &CellValue {
        &self.cells[row][column]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn text_rows(rows: &[&[&str]]) -> Vec<Vec<CellValue>> {
        rows.iter()
            .map(|row| row.iter().map(|s| CellValue::from(*s)).collect())
            .collect()
    }

    fn sample() -> Table {
        Table::from_rows(
            names(&["a", "b", "c"]),
            text_rows(&[&["1", "2", "3"], &["4", "5", "6"]]),
            Some(names(&["r1", "r2"])),
        )
        .unwrap()
    }

    #[test]
    fn test_get_cell_by_every_address_form() {
        let table = sample();
        let expected = text_rows(&[&["1", "2", "3"], &["4", "5", "6"]]);
        let labels = ["r1", "r2"];
        let columns = ["a", "b", "c"];

        for r in 0..2 {
            for c in 0..3 {
                let want = &expected[r][c];
                assert_eq!(table.get_cell(r, c).unwrap(), want);
                assert_eq!(table.get_cell(labels[r], columns[c]).unwrap(), want);
                assert_eq!(table.get_cell(labels[r], c).unwrap(), want);
                assert_eq!(table.get_cell(r, columns[c]).unwrap(), want);
            }
        }
    }

    #[test]
    fn test_set_cell_touches_only_target() {
        let mut table = sample();
        let written = table.set_cell("r2", "b", 42i64).unwrap().clone();
        assert_eq!(written, CellValue::Int(42));
        assert_eq!(table.get_cell(1usize, 1usize).unwrap(), &CellValue::Int(42));

        let untouched: Vec<_> = table
            .rows()
            .flatten()
            .filter(|v| **v != CellValue::Int(42))
            .cloned()
            .collect();
        assert_eq!(untouched, text_rows(&[&["1", "2", "3", "4", "6"]])[0]);
    }

    #[test]
    fn test_positional_fallback_for_names() {
        let table = sample();
        assert_eq!(table.get_cell("1", "2").unwrap(), &CellValue::from("6"));
    }

    #[test]
    fn test_identity_row_labels() {
        let table = Table::from_rows(names(&["a"]), text_rows(&[&["x"], &["y"]]), None).unwrap();
        assert_eq!(table.get_cell("1", "a").unwrap(), &CellValue::from("y"));
        assert_eq!(table.row_label(1).as_deref(), Some("1"));
        assert_eq!(table.row_label(2), None);
    }

    #[test]
    fn test_unknown_label() {
        let table = sample();
        let err = table.get_cell("nope", "a").unwrap_err();
        assert!(matches!(err, Error::LabelNotFound { axis: Axis::Row, .. }));

        let err = table.get_cell("r1", 7usize).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexOutOfRange { axis: Axis::Column, index: 7, len: 3 }
        ));
    }

    #[test]
    fn test_locate_reports_missing_axis() {
        let table = sample();
        assert!(matches!(
            table.locate(None, Some(Key::Index(0))),
            Err(Error::UnspecifiedAxis(Axis::Row))
        ));
        assert!(matches!(
            table.locate(Some(Key::Name("r1")), None),
            Err(Error::UnspecifiedAxis(Axis::Column))
        ));
    }

    #[test]
    fn test_label_count_mismatch() {
        let rows = text_rows(&[&["1"], &["2"], &["3"], &["4"], &["5"]]);
        let err = Table::from_rows(names(&["a"]), rows, Some(names(&["x", "y", "z"]))).unwrap_err();
        assert!(matches!(err, Error::LabelCount { labels: 3, rows: 5 }));
        assert!(err.to_string().contains("(3 vs 5)"));
    }

    #[test]
    fn test_short_row_names_index() {
        let rows = text_rows(&[&["1", "2"], &["3", "4"], &["5"]]);
        let err = Table::from_rows(names(&["a", "b"]), rows, None).unwrap_err();
        assert!(matches!(err, Error::RowWidth { row: 2, expected: 2, found: 1 }));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let err = Table::from_rows(names(&["a", "a"]), Vec::new(), None).unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn test_duplicate_row_labels_rejected() {
        let rows = text_rows(&[&["1"], &["2"]]);
        let err = Table::from_rows(names(&["a"]), rows, Some(names(&["r", "r"]))).unwrap_err();
        assert!(matches!(err, Error::DuplicateLabel(label) if label == "r"));
    }

    #[test]
    fn test_header_repeated_in_first_row_is_kept() {
        let rows = text_rows(&[&["a", "b"], &["1", "2"]]);
        let table = Table::from_rows(names(&["a", "b"]), rows, None).unwrap();
        assert!(table.first_row_matches_header());
        assert_eq!(table.row_count(), 2);
        assert!(!sample().first_row_matches_header());
    }

    #[test]
    fn test_typed_first_row_matches_header() {
        let rows = vec![
            vec![CellValue::Int(2020), CellValue::Real(2.5)],
            vec![CellValue::Int(1), CellValue::Int(2)],
        ];
        let table = Table::from_rows(names(&["2020", "2.5"]), rows, None).unwrap();
        assert!(table.first_row_matches_header());
    }

    #[test]
    fn test_empty_table() {
        let table = Table::from_rows(names(&["a"]), Vec::new(), None).unwrap();
        assert_eq!(table.row_count(), 0);
        assert!(!table.first_row_matches_header());
        assert!(table.get_row(0usize).is_err());
    }
}
