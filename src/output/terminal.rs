//! Grid output for terminals

use std::io::Write;

use anyhow::Result;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::model::Record;

use super::OutputFormatter;

/// Draws records as a bordered grid
pub struct TerminalOutput;

impl TerminalOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TerminalOutput {
    fn render(&self, columns: &[String], records: &[Record], writer: &mut dyn Write) -> Result<()> {
        let mut builder = Builder::default();
        builder.push_record(columns.iter().cloned());
        for record in records {
            builder.push_record(columns.iter().map(|name| {
                record
                    .get(name)
                    .map(|v| v.display().into_owned())
                    .unwrap_or_default()
            }));
        }

        let mut table = builder.build();
        table.with(Style::modern());
        writeln!(writer, "{}", table)?;
        writeln!(writer, "({} rows)", records.len())?;
        Ok(())
    }
}
