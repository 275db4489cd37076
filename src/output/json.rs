//! JSON lines output format

use std::io::Write;

use anyhow::Result;

use crate::model::Record;

use super::OutputFormatter;

/// One JSON object per record, one record per line
pub struct JsonOutput;

impl JsonOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonOutput {
    fn render(&self, _columns: &[String], records: &[Record], writer: &mut dyn Write) -> Result<()> {
        for record in records {
            serde_json::to_writer(&mut *writer, record)?;
            writeln!(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    #[test]
    fn test_json_lines() {
        let mut record = Record::new();
        record.insert("name".into(), CellValue::from("ann"));
        record.insert("age".into(), CellValue::Int(31));
        record.insert("note".into(), CellValue::Null);

        let mut out = Vec::new();
        JsonOutput::new()
            .render(&[], &[record.clone(), record], &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "{\"name\":\"ann\",\"age\":31,\"note\":null}\n{\"name\":\"ann\",\"age\":31,\"note\":null}\n"
        );
    }
}
