//! Read a resource and write an annotated copy of it

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Reader, Writer};
use crate::config::{ModifyOptions, OpenOptions};
use crate::error::Result;
use crate::model::{ColumnSpec, Record, Row};

/// Pairs a reader over an input with a writer over a derived output
pub struct Modifier {
    reader: Reader,
    writer: Writer,
    output: PathBuf,
}

impl Modifier {
    /// Open `input` for reading and its derived output for writing
    ///
    /// `read` configures the input. The output takes its format from its own
    /// path and reuses the table and sheet names from `read`.
    pub fn open(input: impl AsRef<Path>, read: &OpenOptions, modify: &ModifyOptions) -> Result<Self> {
        let input = input.as_ref();
        let output = modify.output_path(input)?;
        modify.check_columns()?;

        let reader = Reader::open(input, read)?;
        let columns = modify.output_columns(reader.columns())?;

        let write = OpenOptions {
            format: None,
            delimiter: None,
            select: Default::default(),
            columns: columns.into_iter().map(ColumnSpec::new).collect(),
            ..read.clone()
        };
        let writer = Writer::open(&output, &write)?;

        debug!(input = %input.display(), output = %output.display(), "Opened modifier");
        Ok(Self {
            reader,
            writer,
            output,
        })
    }

    /// Where the modified copy is written
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Columns of the input
    pub fn input_columns(&self) -> &[String] {
        self.reader.columns()
    }

    /// Columns of the output
    pub fn output_columns(&self) -> &[String] {
        self.writer.columns()
    }

    /// Read the next input record
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        self.reader.next_record()
    }

    /// Append one row to the output
    pub fn write(&mut self, row: impl Into<Row>) -> Result<()> {
        self.writer.write(row)
    }

    /// Pass every remaining record through `annotate` and write the result
    pub fn apply<F>(&mut self, mut annotate: F) -> Result<usize>
    where
        F: FnMut(&mut Record) -> Result<()>,
    {
        let mut count = 0;
        while let Some(mut record) = self.reader.next_record()? {
            annotate(&mut record)?;
            self.writer.write(record)?;
            count += 1;
        }
        Ok(count)
    }

    /// Close the reader, then the writer
    pub fn close(&mut self) -> Result<()> {
        self.reader.close()?;
        self.writer.close()
    }
}

impl Iterator for Modifier {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next()
    }
}
