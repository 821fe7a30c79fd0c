//! Database module
//!
//! This module provides all database functionality for yelpdb, organized into:
//!
//! - **core**: Core database infrastructure (SQLite connection, schema, SQL passthrough)
//! - **yelp**: The Yelp database, tying schema, ingestion and queries together
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   ├── schema      # Entity, derived and meta table definitions
//! │   └── query       # execute_sql / QueryTable
//! │
//! └── yelp            # YelpDatabase
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use yelpdb::database::YelpDatabase;
//! use yelpdb::ingest::IngestOptions;
//!
//! // Open (or create) the database file
//! let db = YelpDatabase::open(Path::new("yelp.db"))?;
//!
//! // Load the raw JSON files
//! let report = db.ingest(Path::new("data/raw"), IngestOptions::default())?;
//!
//! // Query data
//! let table = db.query_table("SELECT city, COUNT(*) FROM business GROUP BY city")?;
//! ```

pub mod core;
mod yelp;

pub use core::{
    execute_sql, query_table, DatabaseConn, QueryOutput, QueryTable, Rows, SchemaDefinitions,
    SchemaManager, SchemaStatus, SqlValue, SCHEMA_VERSION,
};

pub use yelp::{YelpDatabase, META_LAST_INGESTED_AT, META_LAST_RAW_DATA_FOLDER};
