//! Format adapters for reading and writing tabular resources

mod csv;
mod excel;
mod sqlite;

use std::path::Path;

use crate::config::{Format, OpenOptions};
use crate::error::{Error, Result};
use crate::model::CellValue;

pub use self::csv::{CsvSink, CsvSource};
pub use self::excel::{ExcelSink, ExcelSource};
pub use self::sqlite::{SqliteSink, SqliteSource};

/// A resource opened for reading: one header, then rows of raw values
pub trait SourceAdapter {
    /// Column names, in order
    fn header(&self) -> &[String];

    /// Next row of values, or `None` once exhausted
    ///
    /// Sources are one-shot: after exhaustion or `close` they keep
    /// returning `None`.
    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>>;

    /// Release the underlying resource
    fn close(&mut self) -> Result<()>;
}

/// A resource opened for writing with a fixed column list
pub trait SinkAdapter {
    /// Column names the sink writes, in order
    fn columns(&self) -> &[String];

    /// Append one row already ordered by `columns`
    fn write_values(&mut self, values: Vec<CellValue>) -> Result<()>;

    /// Persist everything and release the underlying resource
    fn close(&mut self) -> Result<()>;
}

/// Picks the adapter for a resource
pub struct AdapterFactory;

impl AdapterFactory {
    /// Open `path` for reading
    pub fn open_source(path: &Path, options: &OpenOptions) -> Result<Box<dyn SourceAdapter>> {
        match options.resolve_format(path)? {
            Format::Delimited { delimiter } => Ok(Box::new(CsvSource::open(path, delimiter)?)),
            Format::Spreadsheet => Ok(Box::new(ExcelSource::open(
                path,
                options.sheet_name.as_deref(),
            )?)),
            Format::Relational => Ok(Box::new(SqliteSource::open(
                path,
                options.require_table()?,
                &options.columns,
                &options.select,
            )?)),
        }
    }

    /// Open `path` for writing
    pub fn open_sink(path: &Path, options: &OpenOptions) -> Result<Box<dyn SinkAdapter>> {
        if options.columns.is_empty() {
            return Err(Error::Config("A writer needs at least one column".to_string()));
        }
        match options.resolve_format(path)? {
            Format::Delimited { delimiter } => Ok(Box::new(CsvSink::create(
                path,
                &options.columns,
                delimiter,
            )?)),
            Format::Spreadsheet => Ok(Box::new(ExcelSink::create(
                path,
                &options.columns,
                options.sheet_name.as_deref(),
            )?)),
            Format::Relational => Ok(Box::new(SqliteSink::open(
                path,
                options.require_table()?,
                &options.columns,
                options.commit_interval,
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        let options = OpenOptions::new().with_columns(["a"]);

        assert!(matches!(
            AdapterFactory::open_sink(&path, &options),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_sqlite_requires_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        let options = OpenOptions::new().with_columns(["a"]);

        assert!(matches!(
            AdapterFactory::open_sink(&path, &options),
            Err(Error::Config(_))
        ));
    }
}
