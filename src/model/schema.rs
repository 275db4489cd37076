//! Column metadata and type information

use serde::{Deserialize, Serialize};

use super::value::CellValue;
use crate::error::{Error, Result};

/// Storage type of a relational column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Int,
    Real,
    Text,
    /// Any other declared type, kept verbatim and never checked
    Other(String),
}

impl SqlType {
    /// Infer a column type from the first value written to it
    pub fn infer(value: &CellValue) -> SqlType {
        match value {
            CellValue::Real(_) => SqlType::Real,
            CellValue::Int(_) => SqlType::Int,
            _ => SqlType::Text,
        }
    }

    /// Map a declared SQLite type name onto its affinity
    pub fn from_declared(decl: &str) -> SqlType {
        let upper = decl.to_ascii_uppercase();
        if upper.contains("INT") {
            SqlType::Int
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            SqlType::Text
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            SqlType::Real
        } else {
            SqlType::Other(decl.to_string())
        }
    }

    /// Type name used in `CREATE TABLE`
    pub fn sql_name(&self) -> &str {
        match self {
            SqlType::Int => "int",
            SqlType::Real => "real",
            SqlType::Text => "text",
            SqlType::Other(name) => name,
        }
    }

    /// Check that `value` fits a column of this type
    ///
    /// Numeric columns take numeric values only, integer columns additionally
    /// reject a fractional part. Null fits anywhere.
    pub fn check(&self, column: &str, value: &CellValue) -> Result<()> {
        let fits = match (self, value) {
            (_, CellValue::Null) => true,
            (SqlType::Int, CellValue::Int(_)) => true,
            (SqlType::Int, CellValue::Real(f)) => f.fract() == 0.0,
            (SqlType::Real, v) => v.is_numeric(),
            (SqlType::Int, _) => false,
            (SqlType::Text, _) | (SqlType::Other(_), _) => true,
        };
        if fits {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                column: column.to_string(),
                expected: self.to_string(),
                value: format!("{} {:?}", value.kind(), value.display()),
            })
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

/// A writer column: a bare name, or a name with a declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Declared type, if any
    pub sql_type: Option<SqlType>,
}

impl ColumnSpec {
    /// Create an untyped column
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: None,
        }
    }

    /// Create a column with a declared type
    pub fn typed(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type: Some(sql_type),
        }
    }
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        ColumnSpec::new(name)
    }
}

impl From<String> for ColumnSpec {
    fn from(name: String) -> Self {
        ColumnSpec::new(name)
    }
}

impl From<(&str, SqlType)> for ColumnSpec {
    fn from((name, sql_type): (&str, SqlType)) -> Self {
        ColumnSpec::typed(name, sql_type)
    }
}

/// Names of `specs`, in order
pub fn column_names(specs: &[ColumnSpec]) -> Vec<String> {
    specs.iter().map(|c| c.name.clone()).collect()
}

/// Reject a header that names the same column twice
pub fn ensure_unique(names: &[String]) -> Result<()> {
    let mut seen = rustc_hash::FxHashSet::default();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(Error::DuplicateColumn(name.clone()));
        }
    }
    Ok(())
}
