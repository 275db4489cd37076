//! SQLite adapter

use std::collections::VecDeque;
use std::path::Path;

use indexmap::IndexMap;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::model::{column_names, ensure_unique, CellValue, ColumnSpec, SqlType};

use super::{SinkAdapter, SourceAdapter};

/// Rows fetched per query while paging through a table
const PAGE_SIZE: usize = 500;

/// Reads the rows of one table, optionally projected and filtered
///
/// Rows are fetched a page at a time in rowid order, so only one page is
/// held in memory. The connection is released once the rows run out.
pub struct SqliteSource {
    conn: Option<Connection>,
    header: Vec<String>,
    width: usize,
    query: String,
    filter: Vec<CellValue>,
    last_rowid: i64,
    page: VecDeque<Vec<CellValue>>,
    exhausted: bool,
}

impl SqliteSource {
    /// Query `table` in the database at `path`
    ///
    /// `columns` projects the result; `select` keeps only rows where every
    /// named column equals the given value (a NULL value matches NULL).
    #[instrument(skip_all, fields(path = %path.display(), table = %table))]
    pub fn open(
        path: &Path,
        table: &str,
        columns: &[ColumnSpec],
        select: &IndexMap<String, CellValue>,
    ) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| quote_ident(&c.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut conditions: Vec<String> = select
            .keys()
            .enumerate()
            .map(|(i, name)| format!("{} IS ?{}", quote_ident(name), i + 1))
            .collect();
        conditions.push(format!("_rowid_ > ?{}", select.len() + 1));
        let query = format!(
            "SELECT _rowid_, {} FROM {} WHERE {} ORDER BY _rowid_ LIMIT {}",
            projection,
            quote_ident(table),
            conditions.join(" AND "),
            PAGE_SIZE
        );
        debug!("SELECT SQL: {}", query);

        let (header, width) = {
            let stmt = conn.prepare_cached(&query)?;
            let width = stmt.column_count().saturating_sub(1);
            let header: Vec<String> = if columns.is_empty() {
                stmt.column_names()
                    .into_iter()
                    .skip(1)
                    .map(String::from)
                    .collect()
            } else {
                column_names(columns)
            };
            (header, width)
        };

        Ok(Self {
            conn: Some(conn),
            header,
            width,
            query,
            filter: select.values().cloned().collect(),
            last_rowid: i64::MIN,
            page: VecDeque::new(),
            exhausted: false,
        })
    }

    fn fetch_page(&mut self) -> Result<()> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };
        let mut params = self.filter.clone();
        params.push(CellValue::Int(self.last_rowid));

        let mut stmt = conn.prepare_cached(&self.query)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut fetched = 0;
        while let Some(row) = rows.next()? {
            self.last_rowid = row.get(0)?;
            let mut values = Vec::with_capacity(self.width);
            for i in 1..=self.width {
                values.push(CellValue::from(row.get_ref(i)?));
            }
            self.page.push_back(values);
            fetched += 1;
        }

        if fetched < PAGE_SIZE {
            self.exhausted = true;
        }
        debug!(rows = fetched, "Fetched page");
        Ok(())
    }
}

impl SourceAdapter for SqliteSource {
    fn header(&self) -> &[String] {
        &self.header
    }

    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>> {
        if self.page.is_empty() && !self.exhausted {
            self.fetch_page()?;
        }
        match self.page.pop_front() {
            Some(row) => Ok(Some(row)),
            None => {
                self.close()?;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.page.clear();
        self.exhausted = true;
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| e)?;
            debug!("Closed SQLite source");
        }
        Ok(())
    }
}

/// Appends rows to one table, committing in batches
///
/// If the table exists its columns must match the declared ones exactly,
/// and its own column order and types are used. Otherwise the table is
/// created from the declared types, or from the types of the first row
/// written when none were declared. Once known, the types are enforced on
/// every row.
pub struct SqliteSink {
    conn: Option<Connection>,
    table: String,
    columns: Vec<String>,
    types: Option<Vec<SqlType>>,
    insert_sql: String,
    commit_interval: usize,
    pending: usize,
}

impl SqliteSink {
    /// Open (or create) the database at `path` for writing into `table`
    #[instrument(skip_all, fields(path = %path.display(), table = %table))]
    pub fn open(
        path: &Path,
        table: &str,
        columns: &[ColumnSpec],
        commit_interval: usize,
    ) -> Result<Self> {
        let declared = column_names(columns);
        ensure_unique(&declared)?;

        let conn = Connection::open(path)?;
        let existing = table_columns(&conn, table)?;

        let (columns, types) = if !existing.is_empty() {
            let mut mismatched: Vec<String> = declared
                .iter()
                .filter(|name| !existing.iter().any(|(n, _)| n == *name))
                .chain(
                    existing
                        .iter()
                        .map(|(n, _)| n)
                        .filter(|n| !declared.contains(*n)),
                )
                .cloned()
                .collect();
            if !mismatched.is_empty() {
                mismatched.sort();
                return Err(Error::SchemaMismatch {
                    table: table.to_string(),
                    mismatched,
                });
            }
            let (names, types): (Vec<_>, Vec<_>) = existing
                .into_iter()
                .map(|(name, decl)| (name, SqlType::from_declared(&decl)))
                .unzip();
            (names, Some(types))
        } else {
            let declared_types: Vec<Option<SqlType>> =
                columns.iter().map(|c| c.sql_type.clone()).collect();
            let typed = declared_types.iter().filter(|t| t.is_some()).count();
            if typed == 0 {
                (declared, None)
            } else if typed == declared_types.len() {
                let types: Vec<SqlType> = declared_types.into_iter().flatten().collect();
                create_table(&conn, table, &declared, &types)?;
                (declared, Some(types))
            } else {
                return Err(Error::Config(
                    "Declare a type for every column or for none".to_string(),
                ));
            }
        };

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            placeholders.join(", ")
        );

        conn.execute_batch("BEGIN")?;
        debug!("Opened SQLite sink");

        Ok(Self {
            conn: Some(conn),
            table: table.to_string(),
            columns,
            types,
            insert_sql,
            commit_interval,
            pending: 0,
        })
    }

    /// Column types, once declared, reconciled or inferred
    pub fn column_types(&self) -> Option<&[SqlType]> {
        self.types.as_deref()
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(conn) = &self.conn {
            conn.execute_batch("COMMIT; BEGIN")?;
            debug!(table = %self.table, rows = self.pending, "Committed batch");
        }
        self.pending = 0;
        Ok(())
    }
}

impl SinkAdapter for SqliteSink {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn write_values(&mut self, values: Vec<CellValue>) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(Error::Closed)?;
        if values.len() != self.columns.len() {
            return Err(Error::Config(format!(
                "Row has {} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }

        if self.types.is_none() {
            let inferred: Vec<SqlType> = values.iter().map(SqlType::infer).collect();
            create_table(conn, &self.table, &self.columns, &inferred)?;
            self.types = Some(inferred);
        }
        if let Some(types) = &self.types {
            for ((name, sql_type), value) in self.columns.iter().zip(types).zip(&values) {
                sql_type.check(name, value)?;
            }
        }

        conn.prepare_cached(&self.insert_sql)?
            .execute(params_from_iter(values.iter()))?;

        self.pending += 1;
        if self.pending >= self.commit_interval {
            self.commit()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.execute_batch("COMMIT")?;
            conn.close().map_err(|(_, e)| e)?;
            debug!(table = %self.table, "Closed SQLite sink");
        }
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Columns of `table` with their declared types; empty if it does not exist
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn create_table(conn: &Connection, table: &str, columns: &[String], types: &[SqlType]) -> Result<()> {
    let defs: Vec<String> = columns
        .iter()
        .zip(types)
        .map(|(name, sql_type)| format!("{} {}", quote_ident(name), sql_type.sql_name()))
        .collect();
    let sql = format!("CREATE TABLE {} ({})", quote_ident(table), defs.join(", "));
    debug!("CREATE TABLE SQL: {}", sql);
    conn.execute(&sql, [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_rows(path: &Path, table: &str) -> i64 {
        let conn = Connection::open(path).unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    fn specs(names: &[&str]) -> Vec<ColumnSpec> {
        names.iter().map(|n| ColumnSpec::new(*n)).collect()
    }

    #[test]
    fn test_types_inferred_from_first_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");

        let mut sink = SqliteSink::open(&path, "t", &specs(&["n", "x", "s"]), 100).unwrap();
        assert!(sink.column_types().is_none());
        sink.write_values(vec![CellValue::Int(1), CellValue::Real(0.5), CellValue::from("a")])
            .unwrap();
        assert_eq!(
            sink.column_types().unwrap(),
            [SqlType::Int, SqlType::Real, SqlType::Text]
        );

        // Whole floats still fit an int column
        sink.write_values(vec![CellValue::Real(2.0), CellValue::Int(3), CellValue::Int(9)])
            .unwrap();

        let err = sink
            .write_values(vec![CellValue::Real(2.5), CellValue::Real(1.0), CellValue::Null])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref column, .. } if column == "n"));

        let err = sink
            .write_values(vec![CellValue::Int(1), CellValue::from("oops"), CellValue::Null])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref column, .. } if column == "x"));

        sink.close().unwrap();
        assert_eq!(count_rows(&path, "t"), 2);
    }

    #[test]
    fn test_values_keep_their_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");

        let mut sink = SqliteSink::open(&path, "t", &specs(&["n", "x"]), 100).unwrap();
        sink.write_values(vec![CellValue::Int(7), CellValue::Real(0.1)])
            .unwrap();
        sink.close().unwrap();

        let mut source = SqliteSource::open(&path, "t", &[], &IndexMap::new()).unwrap();
        assert_eq!(source.header(), ["n", "x"]);
        assert_eq!(
            source.next_row().unwrap(),
            Some(vec![CellValue::Int(7), CellValue::Real(0.1)])
        );
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn test_schema_mismatch_reports_symmetric_difference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x int, y text)")
            .unwrap();

        let err = SqliteSink::open(&path, "t", &specs(&["x", "z"]), 100)
            .err()
            .unwrap();
        match err {
            Error::SchemaMismatch { table, mismatched } => {
                assert_eq!(table, "t");
                assert_eq!(mismatched, vec!["y", "z"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_existing_table_order_and_types_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER, y TEXT)")
            .unwrap();

        let columns = vec![ColumnSpec::new("y"), ColumnSpec::typed("x", SqlType::Real)];
        let mut sink = SqliteSink::open(&path, "t", &columns, 100).unwrap();
        assert_eq!(sink.columns(), ["x", "y"]);
        assert_eq!(sink.column_types().unwrap(), [SqlType::Int, SqlType::Text]);
        assert!(sink
            .write_values(vec![CellValue::from("nope"), CellValue::from("a")])
            .is_err());
        sink.close().unwrap();
    }

    #[test]
    fn test_declared_types_create_table_eagerly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");

        let columns = vec![
            ColumnSpec::typed("id", SqlType::Int),
            ColumnSpec::typed("label", SqlType::Text),
        ];
        let mut sink = SqliteSink::open(&path, "t", &columns, 100).unwrap();
        sink.close().unwrap();

        assert_eq!(count_rows(&path, "t"), 0);
    }

    #[test]
    fn test_partial_types_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        let columns = vec![ColumnSpec::typed("id", SqlType::Int), ColumnSpec::new("label")];
        assert!(matches!(
            SqliteSink::open(&path, "t", &columns, 100),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_commit_batching() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        let interval = 5;

        let mut sink = SqliteSink::open(&path, "t", &specs(&["n"]), interval).unwrap();
        for i in 0..=interval {
            sink.write_values(vec![CellValue::Int(i as i64)]).unwrap();
        }
        assert!(count_rows(&path, "t") >= interval as i64);

        for i in 0..3 {
            sink.write_values(vec![CellValue::Int(i)]).unwrap();
        }
        sink.close().unwrap();
        assert_eq!(count_rows(&path, "t"), interval as i64 + 4);
    }

    #[test]
    fn test_projection_and_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE people (name text, city text, age int);
             INSERT INTO people VALUES ('ann', 'oslo', 31), ('bob', 'rome', 40), ('cy', 'oslo', 40);",
        )
        .unwrap();
        drop(conn);

        let mut select = IndexMap::new();
        select.insert("city".to_string(), CellValue::from("oslo"));
        select.insert("age".to_string(), CellValue::Int(40));

        let mut source =
            SqliteSource::open(&path, "people", &specs(&["age", "name"]), &select).unwrap();
        assert_eq!(source.header(), ["age", "name"]);
        assert_eq!(
            source.next_row().unwrap(),
            Some(vec![CellValue::Int(40), CellValue::from("cy")])
        );
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn test_null_filter_matches_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE t (name text, city text);
             INSERT INTO t VALUES ('ann', NULL), ('bob', 'rome');",
        )
        .unwrap();
        drop(conn);

        let mut select = IndexMap::new();
        select.insert("city".to_string(), CellValue::Null);

        let mut source = SqliteSource::open(&path, "t", &specs(&["name"]), &select).unwrap();
        assert_eq!(source.next_row().unwrap(), Some(vec![CellValue::from("ann")]));
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn test_rows_fetched_page_by_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        let total = PAGE_SIZE * 2 + 3;

        let mut sink = SqliteSink::open(&path, "t", &specs(&["n"]), 1000).unwrap();
        for n in 0..total {
            sink.write_values(vec![CellValue::Int(n as i64)]).unwrap();
        }
        sink.close().unwrap();

        let mut source = SqliteSource::open(&path, "t", &[], &IndexMap::new()).unwrap();
        assert!(source.page.is_empty());

        assert_eq!(source.next_row().unwrap(), Some(vec![CellValue::Int(0)]));
        assert_eq!(source.page.len(), PAGE_SIZE - 1);

        let mut expected = 1;
        while let Some(row) = source.next_row().unwrap() {
            assert_eq!(row, vec![CellValue::Int(expected)]);
            assert!(source.page.len() < PAGE_SIZE);
            expected += 1;
        }
        assert_eq!(expected as usize, total);
        assert!(source.conn.is_none());
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn test_hostile_identifiers_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        let table = "t\"; DROP TABLE x; --";

        let mut sink = SqliteSink::open(&path, table, &specs(&["a b", "c\"d"]), 100).unwrap();
        sink.write_values(vec![CellValue::from("'quoted'"), CellValue::Int(1)])
            .unwrap();
        sink.close().unwrap();

        let mut source = SqliteSource::open(&path, table, &[], &IndexMap::new()).unwrap();
        assert_eq!(source.header(), ["a b", "c\"d"]);
        assert_eq!(
            source.next_row().unwrap(),
            Some(vec![CellValue::from("'quoted'"), CellValue::Int(1)])
        );
    }
}
