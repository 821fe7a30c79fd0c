//! Database connection management
//!
//! This module provides the connection wrapper shared by ingestion and queries.

use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::Result;

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let conn = match path {
            Some(p) => {
                debug!("Opening database at {}", p.display());
                Connection::open(p)?
            }
            None => Connection::open_in_memory()?,
        };

        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Open a database file, creating it if needed
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Some(path))
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    fn configure(&self) -> Result<()> {
        // WAL for file databases; in-memory databases report "memory"
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        self.conn.execute("PRAGMA synchronous=NORMAL", [])?;

        // 100MB page cache
        self.conn.execute("PRAGMA cache_size=100000", [])?;

        self.conn.execute("PRAGMA temp_store=MEMORY", [])?;

        // Foreign keys are declared in the schema but never enforced:
        // orphan business/user references are loaded as-is.
        self.conn.execute("PRAGMA foreign_keys=OFF", [])?;

        Ok(())
    }

    /// Execute a SQL statement without parameters
    pub fn execute(&self, sql: &str) -> Result<usize> {
        Ok(self.conn.execute(sql, [])?)
    }

    /// Execute a SQL statement with parameters
    pub fn execute_with_params<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        table_exists(&self.conn, table_name)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        table_count(&self.conn, table_name)
    }
}

pub(crate) fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        [table_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn table_count(conn: &Connection, table_name: &str) -> Result<u64> {
    let query = format!("SELECT COUNT(*) FROM \"{}\"", table_name);
    let count: u64 = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = DatabaseConn::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yelp.db");
        let db = DatabaseConn::open_path(&path).unwrap();
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)")
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_foreign_keys_disabled() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let enabled: i64 = db
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 0);
    }

    #[test]
    fn test_table_exists() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY)")
            .unwrap();

        assert!(db.table_exists("test_table").unwrap());
        assert!(!db.table_exists("nonexistent_table").unwrap());
    }

    #[test]
    fn test_table_count() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        db.execute("INSERT INTO test_table (id) VALUES (1), (2), (3)")
            .unwrap();
        db.execute_with_params("INSERT INTO test_table (name) VALUES (?1)", ["x"])
            .unwrap();

        assert_eq!(db.table_count("test_table").unwrap(), 4);
    }
}
