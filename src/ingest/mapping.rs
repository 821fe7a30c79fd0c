//! Declarative mapping from JSON records to table rows
//!
//! Each entity has an [`EntityMapping`]: the target table, one [`ColumnMapping`]
//! per column naming the JSON key it is read from, and the derived tables that
//! expand nested fields. Keys not listed are ignored; listed keys that are
//! absent (or hold a value that cannot be coerced) become NULL.

use std::collections::HashSet;

use rusqlite::Connection;
use serde_json::{Map, Value};

use super::derived;
use crate::database::SqlValue;
use crate::{Error, Result};

/// How a JSON value is stored in its column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Strings stored as-is; other scalars stored in their JSON text form
    Text,
    /// Like `Text`, with surrounding whitespace removed from strings
    TrimmedText,
    /// Integers, booleans (0/1) and numeric strings
    Integer,
    /// Any number, or a numeric string
    Real,
    /// Objects and arrays serialized to JSON text
    Json,
    /// Number of entries in a comma-separated string or an array
    Count,
}

/// One column of an entity table and the JSON key feeding it
#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub column: &'static str,
    pub field: &'static str,
    pub kind: ColumnKind,
}

impl ColumnMapping {
    pub const fn new(column: &'static str, field: &'static str, kind: ColumnKind) -> Self {
        Self {
            column,
            field,
            kind,
        }
    }

    /// Read this column's value out of a record
    pub fn extract(&self, record: &Map<String, Value>) -> SqlValue {
        match record.get(self.field) {
            None | Some(Value::Null) => SqlValue::Null,
            Some(value) => coerce(value, self.kind),
        }
    }
}

const fn text(name: &'static str) -> ColumnMapping {
    ColumnMapping::new(name, name, ColumnKind::Text)
}

const fn trimmed(name: &'static str) -> ColumnMapping {
    ColumnMapping::new(name, name, ColumnKind::TrimmedText)
}

const fn integer(name: &'static str) -> ColumnMapping {
    ColumnMapping::new(name, name, ColumnKind::Integer)
}

const fn real(name: &'static str) -> ColumnMapping {
    ColumnMapping::new(name, name, ColumnKind::Real)
}

const fn json(name: &'static str) -> ColumnMapping {
    ColumnMapping::new(name, name, ColumnKind::Json)
}

/// A table whose rows are expanded from one field of a parent record
pub struct DerivedTable {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    /// Produces zero or more rows (in `columns` order) for one record
    pub extract: fn(&Map<String, Value>) -> Vec<Vec<SqlValue>>,
}

impl std::fmt::Debug for DerivedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedTable")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .finish()
    }
}

/// Full correspondence between one source kind and its tables
#[derive(Debug)]
pub struct EntityMapping {
    pub table: &'static str,
    pub columns: &'static [ColumnMapping],
    pub derived: &'static [DerivedTable],
}

impl EntityMapping {
    /// Values for every mapped column, in mapping order
    pub fn row(&self, record: &Map<String, Value>) -> Vec<SqlValue> {
        self.columns.iter().map(|c| c.extract(record)).collect()
    }

    /// `INSERT` statement with one positional parameter per mapped column
    pub fn insert_sql(&self) -> String {
        let columns: Vec<&str> = self.columns.iter().map(|c| c.column).collect();
        insert_sql(self.table, &columns)
    }

    /// Check that the live tables have every column this mapping writes
    pub fn verify(&self, conn: &Connection) -> Result<()> {
        let columns: Vec<&str> = self.columns.iter().map(|c| c.column).collect();
        verify_columns(conn, self.table, &columns)?;
        for derived in self.derived {
            verify_columns(conn, derived.table, derived.columns)?;
        }
        Ok(())
    }
}

impl DerivedTable {
    pub fn insert_sql(&self) -> String {
        insert_sql(self.table, self.columns)
    }
}

fn insert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn verify_columns(conn: &Connection, table: &str, columns: &[&str]) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let existing = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<HashSet<String>>>()?;

    for column in columns {
        if !existing.contains(*column) {
            return Err(Error::SchemaMismatch {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Convert a non-null JSON value for a column of the given kind
pub fn coerce(value: &Value, kind: ColumnKind) -> SqlValue {
    match kind {
        ColumnKind::Text => match value {
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Null => SqlValue::Null,
            other => SqlValue::Text(other.to_string()),
        },
        ColumnKind::TrimmedText => match value {
            Value::String(s) => SqlValue::Text(s.trim().to_string()),
            other => coerce(other, ColumnKind::Text),
        },
        ColumnKind::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(SqlValue::Integer)
                .unwrap_or(SqlValue::Null),
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Integer)
                .unwrap_or(SqlValue::Null),
            _ => SqlValue::Null,
        },
        ColumnKind::Real => match value {
            Value::Number(n) => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(SqlValue::Real)
                .unwrap_or(SqlValue::Null),
            _ => SqlValue::Null,
        },
        ColumnKind::Json => match value {
            Value::Null => SqlValue::Null,
            other => SqlValue::Text(other.to_string()),
        },
        ColumnKind::Count => match value {
            Value::Array(items) => SqlValue::Integer(items.len() as i64),
            Value::String(s) => SqlValue::Integer(derived::split_list(s).count() as i64),
            _ => SqlValue::Null,
        },
    }
}

// =============================================================================
// Entity mappings
// =============================================================================

pub static BUSINESS: EntityMapping = EntityMapping {
    table: "business",
    columns: &[
        trimmed("business_id"),
        trimmed("name"),
        trimmed("address"),
        trimmed("city"),
        trimmed("state"),
        trimmed("postal_code"),
        real("latitude"),
        real("longitude"),
        real("stars"),
        integer("review_count"),
        integer("is_open"),
        json("attributes"),
        text("categories"),
        json("hours"),
    ],
    derived: &[
        DerivedTable {
            table: "business_category",
            columns: &["business_id", "category"],
            extract: derived::business_categories,
        },
        DerivedTable {
            table: "business_attribute",
            columns: &["business_id", "name", "value"],
            extract: derived::business_attributes,
        },
        DerivedTable {
            table: "business_hours",
            columns: &["business_id", "day", "open_hours"],
            extract: derived::business_hours,
        },
    ],
};

pub static USER: EntityMapping = EntityMapping {
    table: "users",
    columns: &[
        trimmed("user_id"),
        text("name"),
        integer("review_count"),
        text("yelping_since"),
        integer("useful"),
        integer("funny"),
        integer("cool"),
        integer("fans"),
        real("average_stars"),
        text("elite"),
        ColumnMapping::new("friend_count", "friends", ColumnKind::Count),
        integer("compliment_hot"),
        integer("compliment_more"),
        integer("compliment_profile"),
        integer("compliment_cute"),
        integer("compliment_list"),
        integer("compliment_note"),
        integer("compliment_plain"),
        integer("compliment_cool"),
        integer("compliment_funny"),
        integer("compliment_writer"),
        integer("compliment_photos"),
    ],
    derived: &[
        DerivedTable {
            table: "user_friend",
            columns: &["user_id", "friend_id"],
            extract: derived::user_friends,
        },
        DerivedTable {
            table: "user_elite",
            columns: &["user_id", "year"],
            extract: derived::user_elite_years,
        },
    ],
};

pub static REVIEW: EntityMapping = EntityMapping {
    table: "reviews",
    columns: &[
        trimmed("review_id"),
        trimmed("user_id"),
        trimmed("business_id"),
        real("stars"),
        integer("useful"),
        integer("funny"),
        integer("cool"),
        text("text"),
        text("date"),
    ],
    derived: &[],
};

pub static CHECKIN: EntityMapping = EntityMapping {
    table: "checkins",
    columns: &[trimmed("business_id"), text("date")],
    derived: &[DerivedTable {
        table: "checkin_date",
        columns: &["business_id", "date"],
        extract: derived::checkin_dates,
    }],
};

pub static TIP: EntityMapping = EntityMapping {
    table: "tips",
    columns: &[
        trimmed("user_id"),
        trimmed("business_id"),
        text("text"),
        text("date"),
        integer("compliment_count"),
    ],
    derived: &[],
};

pub static PHOTO: EntityMapping = EntityMapping {
    table: "photos",
    columns: &[
        trimmed("photo_id"),
        trimmed("business_id"),
        text("caption"),
        text("label"),
    ],
    derived: &[],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SchemaManager;
    use crate::ingest::SourceKind;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_business_row_direct_mapping() {
        let rec = record(json!({"business_id": "b1", "name": "Cafe", "stars": 4.5}));
        let row = BUSINESS.row(&rec);
        assert_eq!(row.len(), BUSINESS.columns.len());
        assert_eq!(row[0], SqlValue::Text("b1".to_string()));
        assert_eq!(row[1], SqlValue::Text("Cafe".to_string()));
        assert_eq!(row[8], SqlValue::Real(4.5));
        // missing keys become NULL
        assert_eq!(row[2], SqlValue::Null);
        assert_eq!(row[9], SqlValue::Null);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let rec = record(json!({"photo_id": "p1", "unexpected": [1, 2, 3]}));
        let row = PHOTO.row(&rec);
        assert_eq!(
            row,
            vec![
                SqlValue::Text("p1".to_string()),
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null
            ]
        );
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce(&json!(3), ColumnKind::Integer), SqlValue::Integer(3));
        assert_eq!(coerce(&json!(3.0), ColumnKind::Integer), SqlValue::Integer(3));
        assert_eq!(coerce(&json!(3.5), ColumnKind::Integer), SqlValue::Null);
        assert_eq!(coerce(&json!(true), ColumnKind::Integer), SqlValue::Integer(1));
        assert_eq!(coerce(&json!(" 12 "), ColumnKind::Integer), SqlValue::Integer(12));
        assert_eq!(coerce(&json!("abc"), ColumnKind::Integer), SqlValue::Null);
    }

    #[test]
    fn test_coerce_real_and_text() {
        assert_eq!(coerce(&json!(4), ColumnKind::Real), SqlValue::Real(4.0));
        assert_eq!(coerce(&json!("4.5"), ColumnKind::Real), SqlValue::Real(4.5));
        assert_eq!(coerce(&json!({"a": 1}), ColumnKind::Real), SqlValue::Null);
        assert_eq!(
            coerce(&json!(12345), ColumnKind::Text),
            SqlValue::Text("12345".to_string())
        );
    }

    #[test]
    fn test_coerce_json_and_count() {
        assert_eq!(
            coerce(&json!({"WiFi": "free"}), ColumnKind::Json),
            SqlValue::Text(r#"{"WiFi":"free"}"#.to_string())
        );
        assert_eq!(
            coerce(&json!("a, b, c"), ColumnKind::Count),
            SqlValue::Integer(3)
        );
        assert_eq!(coerce(&json!("None"), ColumnKind::Count), SqlValue::Integer(0));
        assert_eq!(coerce(&json!(["a", "b"]), ColumnKind::Count), SqlValue::Integer(2));
    }

    #[test]
    fn test_business_text_trimmed() {
        let rec = record(json!({
            "business_id": " b1 ",
            "name": "  Cafe Rouge ",
            "city": "Tucson\n",
            "postal_code": 85701,
            "categories": " Cafes "
        }));
        let row = BUSINESS.row(&rec);
        assert_eq!(row[0], SqlValue::from("b1"));
        assert_eq!(row[1], SqlValue::from("Cafe Rouge"));
        assert_eq!(row[3], SqlValue::from("Tucson"));
        assert_eq!(row[5], SqlValue::from("85701"));
        // free text columns keep their whitespace
        assert_eq!(row[12], SqlValue::from(" Cafes "));
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            CHECKIN.insert_sql(),
            "INSERT INTO checkins (business_id, date) VALUES (?1, ?2)"
        );
    }

    #[test]
    fn test_mappings_match_schema() {
        let conn = Connection::open_in_memory().unwrap();
        SchemaManager::new(&conn).initialize().unwrap();

        for kind in SourceKind::ALL {
            kind.mapping().verify(&conn).unwrap();
        }
    }

    #[test]
    fn test_verify_detects_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE photos (id INTEGER PRIMARY KEY, photo_id TEXT)", [])
            .unwrap();

        match PHOTO.verify(&conn) {
            Err(Error::SchemaMismatch { table, column }) => {
                assert_eq!(table, "photos");
                assert_eq!(column, "business_id");
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }
}
