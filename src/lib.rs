//! tabio - uniform record access for tabular data
//!
//! Open a CSV/TSV file, an Excel workbook or a SQLite table and read it as
//! records keyed by column name, write records back out in any of those
//! formats, or load the whole thing into a [`Table`] addressed by row and
//! column labels or positions.

pub mod adapter;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod stream;

pub use config::{Format, ModifyOptions, OpenOptions};
pub use error::{Axis, Error, Result};
pub use model::{CellValue, Key, Record, Row, Table, TableLayout};
pub use stream::{Modifier, Reader, Writer};
