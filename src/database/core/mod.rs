//! Core database infrastructure
//!
//! This module provides the foundational database components used throughout yelpdb:
//! - `DatabaseConn`: Core SQLite connection wrapper with configuration
//! - `SchemaManager`: Schema initialization and management
//! - `SchemaStatus`: Schema state enumeration
//! - `execute_sql`: SQL passthrough returning raw rows or a column-named table

mod connection;
mod query;
mod schema;

pub use connection::DatabaseConn;
pub use query::{execute_sql, query_table, QueryOutput, QueryTable, Rows, SqlValue};
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};
