//! Writes the records of one source file into its tables

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Instant;

use rusqlite::{params_from_iter, Connection, Transaction};
use serde::Serialize;
use tracing::{debug, info};

use super::mapping::EntityMapping;
use super::progress::{IngestProgress, IngestProgressCallback, INGEST_PROGRESS_INTERVAL};
use super::reader::{JsonlReader, SourceRecord};
use super::source::SourceKind;
use crate::{Error, Result};

/// Outcome of loading one source file
#[derive(Debug, Clone, Serialize)]
pub struct LoadStats {
    pub source: SourceKind,
    pub path: PathBuf,
    pub table: String,
    /// Rows written to the entity table
    pub records: u64,
    /// Rows written to derived tables
    pub derived_rows: u64,
    pub duration_secs: f64,
}

/// Loads a JSON-lines source into the tables of its [`EntityMapping`]
///
/// Rows are committed every `batch_size` records and at end of file. When a
/// line fails to parse, the rows read before it are committed and the parse
/// error is returned. A failed insert rolls back the open batch only.
pub struct EntityLoader<'a> {
    conn: &'a Connection,
    kind: SourceKind,
    mapping: &'static EntityMapping,
    batch_size: usize,
    derive_tables: bool,
    progress: Option<IngestProgressCallback>,
}

impl<'a> EntityLoader<'a> {
    pub fn new(conn: &'a Connection, kind: SourceKind) -> Self {
        Self {
            conn,
            kind,
            mapping: kind.mapping(),
            batch_size: super::DEFAULT_BATCH_SIZE,
            derive_tables: true,
            progress: None,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn derive_tables(mut self, derive_tables: bool) -> Self {
        self.derive_tables = derive_tables;
        self
    }

    pub fn progress(mut self, callback: Option<IngestProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Load every record of the file
    pub fn load<R: BufRead>(&self, mut records: JsonlReader<R>) -> Result<LoadStats> {
        self.mapping.verify(self.conn)?;

        let path = records.path().to_path_buf();
        info!("Loading {} records from {}", self.kind, path.display());
        self.notify(IngestProgress::Started {
            source: self.kind,
            file_path: path.display().to_string(),
        });

        let entity_sql = self.mapping.insert_sql();
        let derived_sql: Vec<String> = self
            .mapping
            .derived
            .iter()
            .map(|d| d.insert_sql())
            .collect();

        let start_time = Instant::now();
        let mut stats = LoadStats {
            source: self.kind,
            path: path.clone(),
            table: self.mapping.table.to_string(),
            records: 0,
            derived_rows: 0,
            duration_secs: 0.0,
        };

        // references point at non-unique ids; the pragma is a no-op inside a transaction
        self.conn.pragma_update(None, "foreign_keys", false)?;
        let mut tx = self.conn.unchecked_transaction()?;
        let mut pending = 0usize;

        for item in records.by_ref() {
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    // keep everything read before the bad line
                    tx.commit()?;
                    return Err(e);
                }
            };

            stats.derived_rows += self
                .insert_record(&tx, &entity_sql, &derived_sql, &record)
                .map_err(|source| Error::Insert {
                    path: path.clone(),
                    line: record.line,
                    source,
                })?;
            stats.records += 1;
            pending += 1;

            if pending >= self.batch_size {
                tx.commit()?;
                debug!("Committed {} {} records", stats.records, self.kind);
                tx = self.conn.unchecked_transaction()?;
                pending = 0;
            }

            if stats.records % INGEST_PROGRESS_INTERVAL == 0 {
                let elapsed = start_time.elapsed().as_secs_f64();
                self.notify(IngestProgress::Update {
                    source: self.kind,
                    records_processed: stats.records,
                    rate: rate(stats.records, elapsed),
                    elapsed_secs: elapsed,
                });
            }
        }

        tx.commit()?;

        stats.duration_secs = start_time.elapsed().as_secs_f64();
        info!(
            "Loaded {} {} records ({} derived rows) in {:.1}s",
            stats.records, self.kind, stats.derived_rows, stats.duration_secs
        );
        self.notify(IngestProgress::Completed {
            source: self.kind,
            total_records: stats.records,
            duration_secs: stats.duration_secs,
            rate: rate(stats.records, stats.duration_secs),
        });

        Ok(stats)
    }

    /// Insert the entity row and its derived rows; returns the derived row count
    fn insert_record(
        &self,
        tx: &Transaction<'_>,
        entity_sql: &str,
        derived_sql: &[String],
        record: &SourceRecord,
    ) -> rusqlite::Result<u64> {
        let row = self.mapping.row(&record.fields);
        tx.prepare_cached(entity_sql)?
            .execute(params_from_iter(row.iter()))?;

        if !self.derive_tables {
            return Ok(0);
        }

        let mut derived_rows = 0;
        for (derived, sql) in self.mapping.derived.iter().zip(derived_sql) {
            let mut stmt = tx.prepare_cached(sql)?;
            for row in (derived.extract)(&record.fields) {
                stmt.execute(params_from_iter(row.iter()))?;
                derived_rows += 1;
            }
        }
        Ok(derived_rows)
    }

    fn notify(&self, progress: IngestProgress) {
        if let Some(ref cb) = self.progress {
            cb(progress);
        }
    }
}

fn rate(count: u64, secs: f64) -> Option<f64> {
    if secs > 0.0 {
        Some(count as f64 / secs)
    } else {
        None
    }
}
