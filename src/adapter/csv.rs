//! Delimited text adapter

use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{column_names, CellValue, ColumnSpec};

use super::{SinkAdapter, SourceAdapter};

/// Reads a delimited file as rows of raw text fields
pub struct CsvSource {
    header: Vec<String>,
    reader: Option<csv::Reader<File>>,
    record: StringRecord,
}

impl CsvSource {
    /// Open `path`, consuming its first record as the header
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let header = reader.headers()?.iter().map(String::from).collect();
        debug!(path = %path.display(), "Opened delimited source");

        Ok(Self {
            header,
            reader: Some(reader),
            record: StringRecord::new(),
        })
    }
}

impl SourceAdapter for CsvSource {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        if reader.read_record(&mut self.record)? {
            Ok(Some(
                self.record
                    .iter()
                    .map(|field| CellValue::Text(field.to_string()))
                    .collect(),
            ))
        } else {
            // Release the file handle as soon as the input runs out
            self.reader = None;
            Ok(None)
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

/// Writes rows to a delimited file, header first
pub struct CsvSink {
    columns: Vec<String>,
    writer: Option<csv::Writer<File>>,
}

impl CsvSink {
    /// Create (or truncate) `path` and write the header row
    pub fn create(path: &Path, columns: &[ColumnSpec], delimiter: u8) -> Result<Self> {
        let columns = column_names(columns);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)?;
        writer.write_record(&columns)?;
        debug!(path = %path.display(), "Opened delimited sink");

        Ok(Self {
            columns,
            writer: Some(writer),
        })
    }
}

impl SinkAdapter for CsvSink {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn write_values(&mut self, values: Vec<CellValue>) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::Closed)?;
        if values.len() != self.columns.len() {
            return Err(Error::Config(format!(
                "Row has {} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        writer.write_record(values.iter().map(|v| v.display().into_owned()))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_yields_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "id,name\n1,\"Smith, J\"\n2,\n").unwrap();

        let mut source = CsvSource::open(&path, b',').unwrap();
        assert_eq!(source.header(), ["id", "name"]);
        assert_eq!(
            source.next_row().unwrap(),
            Some(vec![CellValue::from("1"), CellValue::from("Smith, J")])
        );
        assert_eq!(
            source.next_row().unwrap(),
            Some(vec![CellValue::from("2"), CellValue::from("")])
        );
        assert_eq!(source.next_row().unwrap(), None);
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn test_sink_quotes_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        std::fs::write(&path, "stale content\n").unwrap();

        let columns = vec![ColumnSpec::new("a"), ColumnSpec::new("b")];
        let mut sink = CsvSink::create(&path, &columns, b'\t').unwrap();
        sink.write_values(vec![CellValue::from("x\ty"), CellValue::Int(3)])
            .unwrap();
        sink.write_values(vec![CellValue::Null, CellValue::Real(0.5)])
            .unwrap();
        sink.close().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "a\tb\n\"x\ty\"\t3\n\t0.5\n");
        assert!(matches!(sink.write_values(vec![]), Err(Error::Closed)));
    }
}
