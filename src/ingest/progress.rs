//! Progress reporting for ingestion runs

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::source::SourceKind;

/// Progress update interval for ingestion (every 10,000 records)
pub const INGEST_PROGRESS_INTERVAL: u64 = 10_000;

/// Progress information for ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngestProgress {
    /// Loading of a source file has started
    Started {
        source: SourceKind,
        file_path: String,
    },
    /// Emitted every [`INGEST_PROGRESS_INTERVAL`] records
    Update {
        source: SourceKind,
        records_processed: u64,
        /// Records per second (if available)
        #[serde(skip_serializing_if = "Option::is_none")]
        rate: Option<f64>,
        elapsed_secs: f64,
    },
    /// Loading of a source file has completed
    Completed {
        source: SourceKind,
        total_records: u64,
        duration_secs: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        rate: Option<f64>,
    },
    /// An optional source was not loaded
    Skipped { source: SourceKind, reason: String },
}

impl IngestProgress {
    pub fn source(&self) -> SourceKind {
        match self {
            IngestProgress::Started { source, .. }
            | IngestProgress::Update { source, .. }
            | IngestProgress::Completed { source, .. }
            | IngestProgress::Skipped { source, .. } => *source,
        }
    }
}

/// Type alias for progress callback function
pub type IngestProgressCallback = Arc<dyn Fn(IngestProgress) + Send + Sync>;
