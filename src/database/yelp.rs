//! The Yelp database: schema lifecycle, ingestion and queries over one connection

use std::path::Path;

use tracing::{info, warn};

use super::core::{
    execute_sql, query_table, DatabaseConn, QueryOutput, QueryTable, Rows, SchemaDefinitions,
    SchemaManager, SchemaStatus, SCHEMA_VERSION,
};
use crate::config::YelpDbConfig;
use crate::ingest::{IngestOptions, IngestProgressCallback, IngestReport, Ingestor};
use crate::Result;

/// Metadata key for the time of the last completed ingestion (RFC 3339)
pub const META_LAST_INGESTED_AT: &str = "last_ingested_at";
/// Metadata key for the raw data folder of the last completed ingestion
pub const META_LAST_RAW_DATA_FOLDER: &str = "last_raw_data_folder";

/// SQLite database holding the Yelp entity tables
///
/// `YelpDatabase` owns the connection for the lifetime of a run. Opening a
/// database creates any missing tables; existing tables and their rows are
/// left in place.
pub struct YelpDatabase {
    db: DatabaseConn,
}

impl YelpDatabase {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        let schema = SchemaManager::new(&db.conn);

        match schema.check_status()? {
            SchemaStatus::Current => {
                info!("Database schema is current");
            }
            SchemaStatus::NotInitialized => {
                info!("Initializing database schema in {}", path.display());
                schema.initialize()?;
            }
            SchemaStatus::Incomplete { missing } => {
                info!("Creating missing tables: {}", missing.join(", "));
                schema.create_missing_tables()?;
                // a recorded version belongs to whoever created the file
                if schema.get_meta("schema_version")?.is_none() {
                    schema.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;
                }
            }
            SchemaStatus::VersionMismatch {
                database_version,
                required_version,
            } => {
                warn!(
                    "Database schema is v{}, this build expects v{}; existing tables are kept",
                    database_version, required_version
                );
            }
        }

        Ok(Self { db })
    }

    /// Open the database named by a configuration
    pub fn from_config(config: &YelpDbConfig) -> Result<Self> {
        Self::open(&config.database_file_path)
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        SchemaManager::new(&db.conn).initialize()?;
        Ok(Self { db })
    }

    /// Get the underlying database connection (for advanced queries)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    /// Load every source file under `folder`
    pub fn ingest(&self, folder: &Path, options: IngestOptions) -> Result<IngestReport> {
        self.ingest_with_progress(folder, options, None)
    }

    /// Load every source file under `folder`, reporting progress to `callback`
    pub fn ingest_with_progress(
        &self,
        folder: &Path,
        options: IngestOptions,
        callback: Option<IngestProgressCallback>,
    ) -> Result<IngestReport> {
        let mut ingestor = Ingestor::new(&self.db.conn, options);
        if let Some(cb) = callback {
            ingestor = ingestor.with_progress(cb);
        }
        let report = ingestor.run(folder)?;

        self.set_meta(META_LAST_INGESTED_AT, &chrono::Utc::now().to_rfc3339())?;
        self.set_meta(META_LAST_RAW_DATA_FOLDER, &folder.to_string_lossy())?;
        Ok(report)
    }

    /// Run arbitrary SQL, returning raw rows or a column-named table
    pub fn execute_sql(&self, sql: &str, as_table: bool) -> Result<QueryOutput> {
        execute_sql(&self.db.conn, sql, as_table)
    }

    pub fn query_table(&self, sql: &str) -> Result<QueryTable> {
        query_table(&self.db.conn, sql)
    }

    pub fn query_rows(&self, sql: &str) -> Result<Rows> {
        Ok(query_table(&self.db.conn, sql)?.into_rows())
    }

    /// Row counts of the entity and derived tables, in schema order
    pub fn table_counts(&self) -> Result<Vec<(String, u64)>> {
        SchemaDefinitions::ENTITY_TABLES
            .iter()
            .chain(SchemaDefinitions::DERIVED_TABLE_NAMES)
            .map(|table| -> Result<(String, u64)> {
                Ok((table.to_string(), self.db.table_count(table)?))
            })
            .collect()
    }

    /// Drop every table and recreate an empty schema
    pub fn reset(&self) -> Result<()> {
        let schema = SchemaManager::new(&self.db.conn);
        schema.reset()?;
        schema.initialize()?;
        info!("Database reset");
        Ok(())
    }

    /// Get metadata value from the database
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        SchemaManager::new(&self.db.conn).get_meta(key)
    }

    /// Set metadata value in the database
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        SchemaManager::new(&self.db.conn).set_meta(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqlValue;
    use crate::ingest::SourceKind;

    fn raw_folder() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            (
                SourceKind::Business,
                r#"{"business_id":"b1","name":"Cafe","stars":4.5,"categories":"Cafes, Coffee & Tea"}"#,
            ),
            (SourceKind::User, r#"{"user_id":"u2","name":"Ann","elite":"2019,20,20"}"#),
            (
                SourceKind::Review,
                r#"{"review_id":"r1","user_id":"u1","business_id":"b1","stars":4}"#,
            ),
        ];
        for (kind, line) in files {
            std::fs::write(dir.path().join(kind.file_name()), line).unwrap();
        }
        dir
    }

    #[test]
    fn test_open_in_memory() {
        let db = YelpDatabase::open_in_memory().unwrap();
        let counts = db.table_counts().unwrap();
        assert_eq!(counts[0], ("business".to_string(), 0));
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn test_open_file_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yelp.db");
        {
            let db = YelpDatabase::open(&path).unwrap();
            db.set_meta("note", "kept").unwrap();
        }
        assert!(path.exists());

        let db = YelpDatabase::open(&path).unwrap();
        assert_eq!(db.get_meta("note").unwrap(), Some("kept".to_string()));
        assert_eq!(db.get_meta("schema_version").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_open_creates_missing_tables_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yelp.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE business (id INTEGER PRIMARY KEY, business_id TEXT, name TEXT);
                 INSERT INTO business (business_id, name) VALUES ('old', 'Kept');",
            )
            .unwrap();
        }

        let db = YelpDatabase::open(&path).unwrap();
        let rows = db.query_rows("SELECT business_id FROM business").unwrap();
        assert_eq!(rows, vec![vec![SqlValue::from("old")]]);
        assert!(db.db.table_exists("reviews").unwrap());
    }

    #[test]
    fn test_open_incomplete_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yelp.db");
        {
            let db = YelpDatabase::open(&path).unwrap();
            db.set_meta("schema_version", "99").unwrap();
            db.connection().execute("DROP TABLE photos", []).unwrap();
        }

        let db = YelpDatabase::open(&path).unwrap();
        assert!(db.db.table_exists("photos").unwrap());
        assert_eq!(db.get_meta("schema_version").unwrap(), Some("99".to_string()));
    }

    #[test]
    fn test_ingest_and_query() {
        let raw = raw_folder();
        let db = YelpDatabase::open_in_memory().unwrap();

        let report = db.ingest(raw.path(), IngestOptions::default()).unwrap();
        assert_eq!(report.total_records(), 3);

        let table = db
            .query_table("SELECT business_id, name, stars FROM business")
            .unwrap();
        assert_eq!(table.get(0, "name"), Some(&SqlValue::from("Cafe")));
        assert_eq!(table.get(0, "stars"), Some(&SqlValue::Real(4.5)));

        let years = db
            .query_rows("SELECT year FROM user_elite ORDER BY year")
            .unwrap();
        assert_eq!(
            years,
            vec![vec![SqlValue::Integer(2019)], vec![SqlValue::Integer(2020)]]
        );

        assert!(db.get_meta(META_LAST_INGESTED_AT).unwrap().is_some());
        assert_eq!(
            db.get_meta(META_LAST_RAW_DATA_FOLDER).unwrap(),
            Some(raw.path().to_string_lossy().into_owned())
        );
    }

    #[test]
    fn test_reset_clears_rows() {
        let raw = raw_folder();
        let db = YelpDatabase::open_in_memory().unwrap();
        db.ingest(raw.path(), IngestOptions::default()).unwrap();

        db.reset().unwrap();
        assert!(db.table_counts().unwrap().iter().all(|(_, n)| *n == 0));
        assert!(db.get_meta(META_LAST_INGESTED_AT).unwrap().is_none());
    }

    #[test]
    fn test_failed_ingest_leaves_meta_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let db = YelpDatabase::open_in_memory().unwrap();
        assert!(db.ingest(dir.path(), IngestOptions::default()).is_err());
        assert!(db.get_meta(META_LAST_INGESTED_AT).unwrap().is_none());
    }
}
