//! Database schema management
//!
//! This module provides the table definitions for the Yelp entities, the tables
//! derived from their nested fields, and the metadata table.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use super::connection::table_exists;
use crate::Result;

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 1;

/// Schema definitions for all tables in the database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the meta table (tracks schema version and ingestion runs)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS yelpdb_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    pub const BUSINESS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS business (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business_id TEXT,
            name TEXT,
            address TEXT,
            city TEXT,
            state TEXT,
            postal_code TEXT,
            latitude REAL,
            longitude REAL,
            stars REAL,
            review_count INTEGER,
            is_open INTEGER,
            attributes TEXT,
            categories TEXT,
            hours TEXT
        );
    "#;

    pub const USERS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT,
            name TEXT,
            review_count INTEGER,
            yelping_since TEXT,
            useful INTEGER,
            funny INTEGER,
            cool INTEGER,
            fans INTEGER,
            average_stars REAL,
            elite TEXT,
            friend_count INTEGER,
            compliment_hot INTEGER,
            compliment_more INTEGER,
            compliment_profile INTEGER,
            compliment_cute INTEGER,
            compliment_list INTEGER,
            compliment_note INTEGER,
            compliment_plain INTEGER,
            compliment_cool INTEGER,
            compliment_funny INTEGER,
            compliment_writer INTEGER,
            compliment_photos INTEGER
        );
    "#;

    pub const REVIEWS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            review_id TEXT,
            user_id TEXT REFERENCES users(user_id),
            business_id TEXT REFERENCES business(business_id),
            stars REAL,
            useful INTEGER,
            funny INTEGER,
            cool INTEGER,
            text TEXT,
            date TEXT
        );
    "#;

    pub const CHECKINS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS checkins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business_id TEXT REFERENCES business(business_id),
            date TEXT
        );
    "#;

    pub const TIPS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS tips (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT REFERENCES users(user_id),
            business_id TEXT REFERENCES business(business_id),
            text TEXT,
            date TEXT,
            compliment_count INTEGER
        );
    "#;

    pub const PHOTOS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS photos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            photo_id TEXT,
            business_id TEXT REFERENCES business(business_id),
            caption TEXT,
            label TEXT
        );
    "#;

    /// Tables expanded from nested or list-valued source fields
    pub const DERIVED_TABLES: &'static [&'static str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS business_category (
            business_id TEXT REFERENCES business(business_id),
            category TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS business_attribute (
            business_id TEXT REFERENCES business(business_id),
            name TEXT NOT NULL,
            value TEXT
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS business_hours (
            business_id TEXT REFERENCES business(business_id),
            day TEXT NOT NULL,
            open_hours TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS user_friend (
            user_id TEXT REFERENCES users(user_id),
            friend_id TEXT NOT NULL
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS user_elite (
            user_id TEXT REFERENCES users(user_id),
            year INTEGER NOT NULL
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS checkin_date (
            business_id TEXT REFERENCES business(business_id),
            date TEXT NOT NULL
        );
        "#,
    ];

    /// SQL for creating indexes on the Yelp string identifiers
    pub const INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_business_business_id ON business(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_users_user_id ON users(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_reviews_review_id ON reviews(review_id)",
        "CREATE INDEX IF NOT EXISTS idx_reviews_business_id ON reviews(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_reviews_user_id ON reviews(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_checkins_business_id ON checkins(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_tips_business_id ON tips(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_tips_user_id ON tips(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_photos_business_id ON photos(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_business_category_business_id ON business_category(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_business_category_category ON business_category(category)",
        "CREATE INDEX IF NOT EXISTS idx_business_attribute_business_id ON business_attribute(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_business_hours_business_id ON business_hours(business_id)",
        "CREATE INDEX IF NOT EXISTS idx_user_friend_user_id ON user_friend(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_user_friend_friend_id ON user_friend(friend_id)",
        "CREATE INDEX IF NOT EXISTS idx_user_elite_user_id ON user_elite(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_checkin_date_business_id ON checkin_date(business_id)",
    ];

    /// The six entity tables, in load order
    pub const ENTITY_TABLES: &'static [&'static str] =
        &["business", "users", "reviews", "checkins", "tips", "photos"];

    /// Tables populated from nested source fields
    pub const DERIVED_TABLE_NAMES: &'static [&'static str] = &[
        "business_category",
        "business_attribute",
        "business_hours",
        "user_friend",
        "user_elite",
        "checkin_date",
    ];

    /// Get all table creation SQL statements
    pub fn all_tables() -> Vec<&'static str> {
        let mut tables = vec![
            Self::META_TABLE,
            Self::BUSINESS_TABLE,
            Self::USERS_TABLE,
            Self::REVIEWS_TABLE,
            Self::CHECKINS_TABLE,
            Self::TIPS_TABLE,
            Self::PHOTOS_TABLE,
        ];
        tables.extend(Self::DERIVED_TABLES.iter().copied());
        tables
    }

    /// Every table the schema is expected to contain
    pub fn required_tables() -> Vec<&'static str> {
        let mut tables = vec!["yelpdb_meta"];
        tables.extend(Self::ENTITY_TABLES.iter().copied());
        tables.extend(Self::DERIVED_TABLE_NAMES.iter().copied());
        tables
    }
}

/// Schema manager for the Yelp database
///
/// Creates missing tables and reports on the state of an existing schema.
/// Existing tables are never altered.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Initialize the database schema
    ///
    /// Creates all tables and indexes if they don't exist and records the
    /// schema version in the meta table. Meant for fresh databases; use
    /// [`SchemaManager::create_missing_tables`] on an existing one.
    pub fn initialize(&self) -> Result<()> {
        self.create_missing_tables()?;
        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;
        debug!("Schema initialized (v{})", SCHEMA_VERSION);

        Ok(())
    }

    /// Create absent tables and indexes, leaving the recorded version alone
    pub fn create_missing_tables(&self) -> Result<()> {
        for table_sql in SchemaDefinitions::all_tables() {
            self.conn.execute(table_sql, [])?;
        }

        for index_sql in SchemaDefinitions::INDEXES {
            self.conn.execute(index_sql, [])?;
        }

        Ok(())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        if !table_exists(self.conn, "yelpdb_meta")? {
            let any_entity = SchemaDefinitions::ENTITY_TABLES
                .iter()
                .map(|t| table_exists(self.conn, t))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .any(|exists| exists);
            if !any_entity {
                return Ok(SchemaStatus::NotInitialized);
            }
        }

        let missing = self.missing_tables()?;
        if !missing.is_empty() {
            return Ok(SchemaStatus::Incomplete { missing });
        }

        let current_version = self.get_schema_version()?;
        if current_version == SCHEMA_VERSION {
            Ok(SchemaStatus::Current)
        } else {
            Ok(SchemaStatus::VersionMismatch {
                database_version: current_version,
                required_version: SCHEMA_VERSION,
            })
        }
    }

    /// Get the current schema version from the database (0 if unrecorded)
    fn get_schema_version(&self) -> Result<u32> {
        let version = self.get_meta("schema_version")?;
        Ok(version.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Names of required tables absent from the database
    pub fn missing_tables(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for table in SchemaDefinitions::required_tables() {
            if !table_exists(self.conn, table)? {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO yelpdb_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
            [key, value],
        )?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        if !table_exists(self.conn, "yelpdb_meta")? {
            return Ok(None);
        }
        let value = self
            .conn
            .query_row(
                "SELECT value FROM yelpdb_meta WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Reset the database by dropping all tables
    pub fn reset(&self) -> Result<()> {
        for table in SchemaDefinitions::DERIVED_TABLE_NAMES {
            self.conn
                .execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
        }
        for table in SchemaDefinitions::ENTITY_TABLES.iter().rev() {
            self.conn
                .execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
        }
        self.conn.execute("DROP TABLE IF EXISTS yelpdb_meta", [])?;

        Ok(())
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Database is not initialized (fresh database)
    NotInitialized,

    /// Schema is current and complete
    Current,

    /// Some tables are missing; they can be created without touching the rest
    Incomplete { missing: Vec<String> },

    /// Schema was written by a different version
    VersionMismatch {
        database_version: u32,
        required_version: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_schema_not_initialized() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
    }

    #[test]
    fn test_schema_initialize() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();

        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
        for table in SchemaDefinitions::required_tables() {
            assert!(table_exists(&conn, table).unwrap(), "missing {}", table);
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        conn.execute("INSERT INTO business (business_id) VALUES ('b1')", [])
            .unwrap();
        manager.initialize().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM business", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_schema_incomplete() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        conn.execute("DROP TABLE photos", []).unwrap();

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::Incomplete {
                missing: vec!["photos".to_string()]
            }
        );

        manager.create_missing_tables().unwrap();
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_create_missing_tables_keeps_recorded_version() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        manager.set_meta("schema_version", "99").unwrap();
        conn.execute("DROP TABLE photos", []).unwrap();

        manager.create_missing_tables().unwrap();
        assert_eq!(manager.get_schema_version().unwrap(), 99);
        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::VersionMismatch {
                database_version: 99,
                required_version: SCHEMA_VERSION,
            }
        );
    }

    #[test]
    fn test_schema_version_mismatch() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        manager.set_meta("schema_version", "99").unwrap();

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::VersionMismatch {
                database_version: 99,
                required_version: SCHEMA_VERSION,
            }
        );
    }

    #[test]
    fn test_meta_operations() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        assert_eq!(manager.get_meta("test_key").unwrap(), None);

        manager.initialize().unwrap();

        manager.set_meta("test_key", "test_value").unwrap();
        let value = manager.get_meta("test_key").unwrap();
        assert_eq!(value, Some("test_value".to_string()));

        let missing = manager.get_meta("nonexistent").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_schema_reset() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);

        manager.reset().unwrap();
        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
    }
}
