//! Output formatting for records

mod json;
mod terminal;

use std::io::Write;

use anyhow::Result;

use crate::model::Record;

pub use json::JsonOutput;
pub use terminal::TerminalOutput;

/// How records are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

/// Trait for output formatters
pub trait OutputFormatter {
    /// Render records under `columns` to a writer
    fn render(&self, columns: &[String], records: &[Record], writer: &mut dyn Write) -> Result<()>;
}

/// Factory for creating output formatters
pub struct OutputFactory;

impl OutputFactory {
    /// Create an output formatter based on format type
    pub fn create(format: OutputFormat) -> Box<dyn OutputFormatter> {
        match format {
            OutputFormat::Terminal => Box::new(TerminalOutput::new()),
            OutputFormat::Json => Box::new(JsonOutput::new()),
        }
    }
}

/// Render records to stdout
pub fn render_to_stdout(columns: &[String], records: &[Record], format: OutputFormat) -> Result<()> {
    let formatter = OutputFactory::create(format);
    let mut stdout = std::io::stdout().lock();
    formatter.render(columns, records, &mut stdout)
}
