//! Records passed through readers and writers

use indexmap::IndexMap;

use super::value::CellValue;
use crate::error::{Error, Result};

/// One row keyed by column name, in header order
pub type Record = IndexMap<String, CellValue>;

/// A row handed to a writer: either already ordered, or keyed by name
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Ordered(Vec<CellValue>),
    Named(Record),
}

impl Row {
    /// Project the row into `columns` order
    ///
    /// Named rows must carry every column; extra keys are ignored. Ordered
    /// rows must have exactly one value per column.
    pub fn into_values(self, columns: &[String]) -> Result<Vec<CellValue>> {
        match self {
            Row::Ordered(values) => {
                if values.len() != columns.len() {
                    return Err(Error::Config(format!(
                        "Row has {} values for {} columns",
                        values.len(),
                        columns.len()
                    )));
                }
                Ok(values)
            }
            Row::Named(mut record) => columns
                .iter()
                .map(|name| {
                    record
                        .swap_remove(name)
                        .ok_or_else(|| Error::MissingColumn(name.clone()))
                })
                .collect(),
        }
    }
}

impl From<Vec<CellValue>> for Row {
    fn from(values: Vec<CellValue>) -> Self {
        Row::Ordered(values)
    }
}

impl From<Record> for Row {
    fn from(record: Record) -> Self {
        Row::Named(record)
    }
}

/// Zip a header against one row of values
pub fn zip_record(header: &[String], values: Vec<CellValue>) -> Record {
    header.iter().cloned().zip(values).collect()
}
