//! Writing records in a fixed column order

use std::path::Path;

use tracing::{debug, warn};

use crate::adapter::{AdapterFactory, SinkAdapter};
use crate::config::OpenOptions;
use crate::error::{Error, Result};
use crate::model::Row;

/// Accepts ordered or named rows and appends them to a sink
///
/// The header is written when the writer is opened. Dropping an unclosed
/// writer closes it and logs any failure; call [`Writer::close`] to see it.
pub struct Writer {
    sink: Box<dyn SinkAdapter>,
    written: usize,
    closed: bool,
}

impl Writer {
    /// Create `path` with the adapter its format calls for
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let sink = AdapterFactory::open_sink(path, options)?;
        debug!(path = %path.display(), columns = sink.columns().len(), "Opened writer");
        Ok(Self::from_sink(sink))
    }

    /// Wrap an already opened sink
    pub fn from_sink(sink: Box<dyn SinkAdapter>) -> Self {
        Self {
            sink,
            written: 0,
            closed: false,
        }
    }

    /// Output columns, in the order they are written
    pub fn columns(&self) -> &[String] {
        self.sink.columns()
    }

    /// Number of rows written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Append one row
    pub fn write(&mut self, row: impl Into<Row>) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        let values = row.into().into_values(self.sink.columns())?;
        self.sink.write_values(values)?;
        self.written += 1;
        Ok(())
    }

    /// Flush and release the sink
    pub fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.sink.close()?;
            debug!(rows = self.written, "Closed writer");
        }
        Ok(())
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close writer: {}", e);
        }
    }
}
