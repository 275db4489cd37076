//! Data model for tabular data representation

mod entry;
mod record;
mod schema;
mod table;
mod value;

pub use entry::{Entry, EntryMut};
pub use record::{zip_record, Record, Row};
pub use schema::{column_names, ensure_unique, ColumnSpec, SqlType};
pub use table::{Key, Table, TableLayout};
pub use value::CellValue;
