//! Construction options for readers, writers and modifiers

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::model::{CellValue, ColumnSpec};

/// Rows buffered by the SQLite writer between commits
pub const DEFAULT_COMMIT_INTERVAL: usize = 100;

/// Sheet name used when writing a spreadsheet without one
pub const DEFAULT_SHEET_NAME: &str = "Sheet";

/// Storage format of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Delimited text with the given field separator
    Delimited { delimiter: u8 },
    /// Spreadsheet workbook
    Spreadsheet,
    /// SQLite database
    Relational,
}

impl Format {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" | "txt" => Ok(Format::Delimited { delimiter: b',' }),
            "tsv" | "tab" => Ok(Format::Delimited { delimiter: b'\t' }),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(Format::Spreadsheet),
            "sqlite" | "sqlite3" | "db" | "db3" => Ok(Format::Relational),
            _ => Err(Error::UnsupportedFormat(if ext.is_empty() {
                path.display().to_string()
            } else {
                ext
            })),
        }
    }
}

/// Options for opening a resource for reading or writing
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Format override; detected from the extension when unset
    pub format: Option<Format>,
    /// Table name (SQLite only, required there)
    pub table: Option<String>,
    /// Writer columns, or the read projection for SQLite
    pub columns: Vec<ColumnSpec>,
    /// Equality filter applied when reading SQLite
    pub select: IndexMap<String, CellValue>,
    /// Sheet to read, or sheet to create when writing
    pub sheet_name: Option<String>,
    /// Writes between SQLite commits
    pub commit_interval: usize,
    /// Field separator override for delimited text
    pub delimiter: Option<u8>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            format: None,
            table: None,
            columns: Vec::new(),
            select: IndexMap::new(),
            sheet_name: None,
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            delimiter: None,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a format instead of detecting it
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the SQLite table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the columns
    pub fn with_columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnSpec>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add one equality condition to the SQLite read filter
    pub fn with_select(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.select.insert(column.into(), value.into());
        self
    }

    /// Set the sheet name
    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    /// Set the commit interval
    pub fn with_commit_interval(mut self, interval: usize) -> Self {
        self.commit_interval = interval;
        self
    }

    /// Set the field separator for delimited text
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Resolve the format for `path`, honoring overrides
    pub fn resolve_format(&self, path: &Path) -> Result<Format> {
        let format = match self.format {
            Some(format) => format,
            None => Format::from_path(path)?,
        };
        Ok(match (format, self.delimiter) {
            (Format::Delimited { .. }, Some(delimiter)) => Format::Delimited { delimiter },
            (format, _) => format,
        })
    }

    /// The table name, which SQLite requires
    pub fn require_table(&self) -> Result<&str> {
        self.table
            .as_deref()
            .ok_or_else(|| Error::Config("A table name is required for SQLite".to_string()))
    }
}

/// Options for deriving a modifier's output
#[derive(Debug, Clone, Default)]
pub struct ModifyOptions {
    /// Explicit output path
    pub output: Option<PathBuf>,
    /// Tag inserted before the output's extension
    pub tag: Option<String>,
    /// Replacement extension for the output
    pub ext: Option<String>,
    /// Explicit output columns
    pub columns: Option<Vec<String>>,
    /// Columns appended after the input's columns
    pub add_columns: Option<Vec<String>>,
}

impl ModifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write to an explicit path
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Derive the output path by tagging the input name
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Derive the output path by swapping the extension
    pub fn with_ext(mut self, ext: impl Into<String>) -> Self {
        self.ext = Some(ext.into());
        self
    }

    /// Replace the output columns
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Append columns to the input's columns
    pub fn with_add_columns(mut self, columns: Vec<String>) -> Self {
        self.add_columns = Some(columns);
        self
    }

    /// Work out where the modified copy of `input` goes
    ///
    /// An explicit output wins. Otherwise the extension is swapped and then
    /// the tag is inserted before the (possibly new) extension:
    /// `data.csv` with tag `scored` becomes `data_scored.csv`.
    pub fn output_path(&self, input: &Path) -> Result<PathBuf> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }
        if self.tag.is_none() && self.ext.is_none() {
            return Err(Error::Config(
                "One of output, tag or ext is required to avoid overwriting the input".to_string(),
            ));
        }

        let mut path = input.to_path_buf();
        if let Some(ext) = &self.ext {
            path.set_extension(ext.trim_start_matches('.'));
        }
        if let Some(tag) = &self.tag {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let name = match path.extension() {
                Some(ext) => format!("{}_{}.{}", stem, tag, ext.to_string_lossy()),
                None => format!("{}_{}", stem, tag),
            };
            path.set_file_name(name);
        }

        if path == input {
            return Err(Error::Config(format!(
                "Output path would overwrite the input: {}",
                input.display()
            )));
        }
        Ok(path)
    }

    /// Reject column options that cannot be combined
    pub fn check_columns(&self) -> Result<()> {
        if self.columns.is_some() && self.add_columns.is_some() {
            return Err(Error::Config(
                "Give either output columns or columns to add, not both".to_string(),
            ));
        }
        Ok(())
    }

    /// Work out the output columns from the input's columns
    pub fn output_columns(&self, input_columns: &[String]) -> Result<Vec<String>> {
        self.check_columns()?;
        Ok(match (&self.columns, &self.add_columns) {
            (Some(columns), _) => columns.clone(),
            (None, Some(extra)) => {
                let mut columns = input_columns.to_vec();
                columns.extend(extra.iter().cloned());
                columns
            }
            (None, None) => input_columns.to_vec(),
        })
    }
}
