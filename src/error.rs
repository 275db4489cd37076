//! Error types for tabio

use std::fmt;

use thiserror::Error;

/// Result type for tabio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which axis of a table a lookup refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Row,
    Column,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => write!(f, "row"),
            Axis::Column => write!(f, "column"),
        }
    }
}

/// Errors raised while opening, reading, writing or addressing tabular data
#[derive(Debug, Error)]
pub enum Error {
    /// No adapter handles this resource
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid or ambiguous construction arguments
    #[error("Configuration error: {0}")]
    Config(String),

    /// A header declares the same column twice
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// Row labels contain the same label twice
    #[error("Duplicate row label: {0}")]
    DuplicateLabel(String),

    /// A row does not have one value per declared column
    #[error("Inconsistent number of columns (row {row}: expected {expected}, found {found})")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Explicit row labels do not line up with the loaded rows
    #[error("Row labels do not match length of table ({labels} vs {rows})")]
    LabelCount { labels: usize, rows: usize },

    /// Declared columns disagree with an existing relational table
    #[error("Columns do not match existing table '{table}': {}", .mismatched.join(", "))]
    SchemaMismatch {
        table: String,
        mismatched: Vec<String>,
    },

    /// A named record lacks one of the writer's columns
    #[error("Record is missing column: {0}")]
    MissingColumn(String),

    /// A cell address leaves one axis out
    #[error("{0} not specified")]
    UnspecifiedAxis(Axis),

    /// A label is neither declared nor a valid position
    #[error("Unknown {axis} label: {label}")]
    LabelNotFound { axis: Axis, label: String },

    /// A position falls outside the table
    #[error("{axis} index {index} out of range (len {len})")]
    IndexOutOfRange { axis: Axis, index: usize, len: usize },

    /// A written value does not fit the column's type
    #[error("Column '{column}' holds {expected} values but got {value}")]
    TypeMismatch {
        column: String,
        expected: String,
        value: String,
    },

    /// The stream was already closed
    #[error("Stream is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<calamine::Error> for Error {
    fn from(err: calamine::Error) -> Self {
        Error::Spreadsheet(err.to_string())
    }
}
