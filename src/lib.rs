#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! yelpdb - Load the Yelp academic dataset into SQLite
//!
//! yelpdb reads the newline-delimited JSON files of the Yelp dataset
//! (businesses, users, reviews, check-ins, tips and photos) and writes them into
//! a single SQLite database, one table per entity. It can be used as both a
//! command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | CLI binary | `display` + `clap`, `indicatif`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! yelpdb = { version = "0.1", default-features = false }
//!
//! # Library with table rendering
//! yelpdb = { version = "0.1", default-features = false, features = ["display"] }
//! ```
//!
//! # Architecture
//!
//! - **[`config`]**: YAML configuration with `YELPDB_` environment overrides
//! - **[`database`]**: SQLite connection, schema, SQL passthrough and [`YelpDatabase`]
//! - **[`ingest`]**: Source discovery, JSON-lines reading, entity mappings and loading
//! - **[`output`]**: Output formats for query results
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use yelpdb::{YelpDatabase, YelpDbConfig};
//!
//! let config = YelpDbConfig::load(Path::new("config.yaml"))?;
//! let db = YelpDatabase::from_config(&config)?;
//! let report = db.ingest(&config.raw_data_folder_path, config.ingest_options())?;
//!
//! let top = db.query_table(
//!     "SELECT name, stars FROM business ORDER BY review_count DESC LIMIT 10",
//! )?;
//! ```
//!
//! # Semantics
//!
//! - Business, user and review files are required; check-in, tip and photo
//!   files are loaded when present.
//! - Each JSON line becomes one row. Unknown keys are ignored and missing keys
//!   are stored as NULL.
//! - Rows are appended: loading the same files twice stores every row twice.
//! - References between tables are declared but not enforced, so a review of
//!   an unknown user is stored as-is.

pub mod config;
pub mod database;
mod error;
pub mod ingest;
pub mod output;

pub use config::YelpDbConfig;
pub use database::{execute_sql, QueryOutput, QueryTable, SqlValue, YelpDatabase};
pub use error::{Error, Result};
pub use ingest::{IngestOptions, IngestProgress, IngestReport, Ingestor, SourceKind};
pub use output::OutputFormat;
