//! Reading records keyed by column name

use std::path::Path;

use tracing::debug;

use crate::adapter::{AdapterFactory, SourceAdapter};
use crate::config::OpenOptions;
use crate::error::{Error, Result};
use crate::model::{ensure_unique, zip_record, Record};

/// Yields one [`Record`] per source row, in order
///
/// A reader makes a single pass. Once the source runs out it is closed, and
/// further reads return nothing.
pub struct Reader {
    source: Box<dyn SourceAdapter>,
    columns: Vec<String>,
    rows_read: usize,
    done: bool,
}

impl Reader {
    /// Open `path` with the adapter its format calls for
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let source = AdapterFactory::open_source(path, options)?;
        debug!(path = %path.display(), "Opened reader");
        Self::from_source(source)
    }

    /// Wrap an already opened source
    ///
    /// Fails if the source header names a column twice.
    pub fn from_source(source: Box<dyn SourceAdapter>) -> Result<Self> {
        let columns = source.header().to_vec();
        ensure_unique(&columns)?;
        Ok(Self {
            source,
            columns,
            rows_read: 0,
            done: false,
        })
    }

    /// Column names, in source order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Read the next record
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if self.done {
            return Ok(None);
        }
        match self.source.next_row()? {
            Some(values) => {
                let row = self.rows_read;
                self.rows_read += 1;
                if values.len() != self.columns.len() {
                    return Err(Error::RowWidth {
                        row,
                        expected: self.columns.len(),
                        found: values.len(),
                    });
                }
                Ok(Some(zip_record(&self.columns, values)))
            }
            None => {
                self.close()?;
                Ok(None)
            }
        }
    }

    /// Release the source
    pub fn close(&mut self) -> Result<()> {
        if !self.done {
            self.done = true;
            self.source.close()?;
            debug!(rows = self.rows_read, "Closed reader");
        }
        Ok(())
    }
}

impl Iterator for Reader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
