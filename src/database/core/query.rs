//! Passthrough SQL execution
//!
//! Statements are handed to SQLite as-is. Results come back either as raw rows
//! or as a [`QueryTable`] that keeps the column names alongside the rows.

use std::fmt;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};
use serde::{Serialize, Serializer};

use crate::Result;

/// A single SQLite value, owned
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Real(f) => Some(*f),
            SqlValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            SqlValue::Null => ValueRef::Null,
            SqlValue::Integer(i) => ValueRef::Integer(*i),
            SqlValue::Real(f) => ValueRef::Real(*f),
            SqlValue::Text(s) => ValueRef::Text(s.as_bytes()),
            SqlValue::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Integer(i) => serializer.serialize_i64(*i),
            SqlValue::Real(f) => serializer.serialize_f64(*f),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Blob(b) => serializer.serialize_bytes(b),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Raw result rows, in column order
pub type Rows = Vec<Vec<SqlValue>>;

/// Query result with named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Rows,
}

impl QueryTable {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of the named column
    pub fn column(&self, name: &str) -> Option<Vec<&SqlValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Value at (row, column name)
    pub fn get(&self, row: usize, column: &str) -> Option<&SqlValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(name, value)| (name.clone(), sql_to_json(value)))
                    .collect()
            })
            .collect()
    }

    /// Drop the column names, keeping the raw rows
    pub fn into_rows(self) -> Rows {
        self.rows
    }
}

fn sql_to_json(value: &SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Null => serde_json::Value::Null,
        SqlValue::Integer(i) => (*i).into(),
        SqlValue::Real(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        SqlValue::Text(s) => serde_json::Value::String(s.clone()),
        SqlValue::Blob(b) => serde_json::Value::Array(b.iter().map(|x| (*x).into()).collect()),
    }
}

/// Result of [`execute_sql`]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows(Rows),
    Table(QueryTable),
}

impl QueryOutput {
    pub fn len(&self) -> usize {
        match self {
            QueryOutput::Rows(rows) => rows.len(),
            QueryOutput::Table(table) => table.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run a statement and collect every row with its column names
pub fn query_table(conn: &Connection, sql: &str) -> Result<QueryTable> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(SqlValue::from(row.get_ref(idx)?));
        }
        rows.push(values);
    }

    Ok(QueryTable { columns, rows })
}

/// Run a statement, returning raw rows or a [`QueryTable`]
pub fn execute_sql(conn: &Connection, sql: &str, as_table: bool) -> Result<QueryOutput> {
    let table = query_table(conn, sql)?;
    if as_table {
        Ok(QueryOutput::Table(table))
    } else {
        Ok(QueryOutput::Rows(table.into_rows()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER, name TEXT, score REAL);
             INSERT INTO t VALUES (1, 'a', 1.5), (2, NULL, 2.0);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_execute_sql_rows() {
        let conn = setup();
        let out = execute_sql(&conn, "SELECT id, name FROM t ORDER BY id", false).unwrap();
        assert_eq!(
            out,
            QueryOutput::Rows(vec![
                vec![SqlValue::Integer(1), SqlValue::Text("a".to_string())],
                vec![SqlValue::Integer(2), SqlValue::Null],
            ])
        );
    }

    #[test]
    fn test_execute_sql_table() {
        let conn = setup();
        let out = execute_sql(&conn, "SELECT * FROM t ORDER BY id", true).unwrap();
        let QueryOutput::Table(table) = out else {
            panic!("expected a table");
        };
        assert_eq!(table.columns, vec!["id", "name", "score"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "score"), Some(&SqlValue::Real(1.5)));
        assert_eq!(
            table.column("id").unwrap(),
            vec![&SqlValue::Integer(1), &SqlValue::Integer(2)]
        );
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_to_records() {
        let conn = setup();
        let table = query_table(&conn, "SELECT id, name FROM t WHERE id = 2").unwrap();
        let records = table.to_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], serde_json::json!(2));
        assert!(records[0]["name"].is_null());
    }

    #[test]
    fn test_non_query_statement_passthrough() {
        let conn = setup();
        let out = execute_sql(&conn, "DELETE FROM t WHERE id = 1", true).unwrap();
        assert!(out.is_empty());
        let table = query_table(&conn, "SELECT COUNT(*) AS n FROM t").unwrap();
        assert_eq!(table.get(0, "n"), Some(&SqlValue::Integer(1)));
    }

    #[test]
    fn test_invalid_sql_is_database_error() {
        let conn = setup();
        let err = execute_sql(&conn, "SELEC nonsense", false).unwrap_err();
        assert!(matches!(err, crate::Error::Database(_)));
    }

    #[test]
    fn test_sql_value_display() {
        assert_eq!(SqlValue::Null.to_string(), "NULL");
        assert_eq!(SqlValue::Integer(7).to_string(), "7");
        assert_eq!(SqlValue::Text("x".into()).to_string(), "x");
        assert_eq!(SqlValue::Blob(vec![1, 2]).to_string(), "<2 bytes>");
    }
}
