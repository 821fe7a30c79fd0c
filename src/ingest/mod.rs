//! Ingestion of the Yelp JSON-lines files
//!
//! The [`Ingestor`] resolves the source files under a raw data folder and
//! loads them in a fixed order (business, user, review, checkin, tip, photo).
//! Business, user and review files are required and are checked before any
//! table is written; the others are skipped when absent.
//!
//! # Progress Tracking
//!
//! ```rust,ignore
//! use yelpdb::ingest::{Ingestor, IngestOptions, IngestProgress};
//! use std::sync::Arc;
//!
//! let callback = Arc::new(|progress: IngestProgress| {
//!     if let IngestProgress::Update { source, records_processed, .. } = progress {
//!         println!("{}: {} records", source, records_processed);
//!     }
//! });
//!
//! let report = Ingestor::new(&conn, IngestOptions::default())
//!     .with_progress(callback)
//!     .run(Path::new("data/raw"))?;
//! ```

mod derived;
mod loader;
pub mod mapping;
mod progress;
mod reader;
mod source;

use std::path::Path;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use derived::{flatten_attributes, parse_elite_years};
pub use loader::{EntityLoader, LoadStats};
pub use mapping::{ColumnKind, ColumnMapping, DerivedTable, EntityMapping};
pub use progress::{IngestProgress, IngestProgressCallback, INGEST_PROGRESS_INTERVAL};
pub use reader::{JsonlReader, SourceRecord};
pub use source::{SourceKind, SourceSet};

use crate::Result;

/// Number of records committed per transaction unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Options for an ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Load the photos file when present
    pub include_photos: bool,
    /// Records per committed batch
    pub batch_size: usize,
    /// Populate the derived tables alongside the entity tables
    pub derive_tables: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            include_photos: true,
            batch_size: DEFAULT_BATCH_SIZE,
            derive_tables: true,
        }
    }
}

/// What an ingestion run loaded
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub loaded: Vec<LoadStats>,
    /// Optional sources that were absent or disabled
    pub skipped: Vec<SourceKind>,
}

impl IngestReport {
    pub fn total_records(&self) -> u64 {
        self.loaded.iter().map(|s| s.records).sum()
    }

    pub fn stats(&self, kind: SourceKind) -> Option<&LoadStats> {
        self.loaded.iter().find(|s| s.source == kind)
    }
}

/// Loads every source file of a raw data folder into an initialized database
pub struct Ingestor<'a> {
    conn: &'a Connection,
    options: IngestOptions,
    progress: Option<IngestProgressCallback>,
}

impl<'a> Ingestor<'a> {
    pub fn new(conn: &'a Connection, options: IngestOptions) -> Self {
        Self {
            conn,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: IngestProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Load all sources found under `folder`
    ///
    /// Fails with `MissingInput` before touching any table when a required
    /// file is absent. A failure part way stops the run; files loaded before it
    /// keep their rows.
    pub fn run(&self, folder: &Path) -> Result<IngestReport> {
        let sources = SourceSet::discover(folder)?;
        sources.check_required()?;

        let mut report = IngestReport::default();
        for kind in SourceKind::ALL {
            if kind == SourceKind::Photo && !self.options.include_photos {
                debug!("Photo loading disabled, skipping");
                self.skip(&mut report, kind, "disabled");
                continue;
            }

            match sources.path(kind) {
                Some(path) => report.loaded.push(self.load_source(kind, path)?),
                None => {
                    debug!("No {} file in {}, skipping", kind, folder.display());
                    self.skip(&mut report, kind, "file not found");
                }
            }
        }

        info!(
            "Ingested {} records from {} files",
            report.total_records(),
            report.loaded.len()
        );
        Ok(report)
    }

    /// Load a single source file
    ///
    /// Loading the same file again appends its rows a second time.
    pub fn load_source(&self, kind: SourceKind, path: &Path) -> Result<LoadStats> {
        let records = JsonlReader::open(path)?;
        EntityLoader::new(self.conn, kind)
            .batch_size(self.options.batch_size)
            .derive_tables(self.options.derive_tables)
            .progress(self.progress.clone())
            .load(records)
    }

    fn skip(&self, report: &mut IngestReport, kind: SourceKind, reason: &str) {
        report.skipped.push(kind);
        if let Some(ref cb) = self.progress {
            cb(IngestProgress::Skipped {
                source: kind,
                reason: reason.to_string(),
            });
        }
    }
}
