//! Run configuration loaded from a YAML file
//!
//! The keys may sit under a `database:` section or at the top level of the
//! file. Environment variables prefixed with `YELPDB_` override file values,
//! with `__` separating nested keys (`YELPDB_DATABASE__BATCH_SIZE=5000`).

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, FileFormat};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ingest::{IngestOptions, DEFAULT_BATCH_SIZE};
use crate::{Error, Result};

/// Annotated configuration file, shown in the CLI's long help
pub const EXAMPLE_CONFIG: &str = r#"### yelpdb configuration file
database:
  ### SQLite file to create or extend
  database_file_path: yelp.db
  ### folder holding the yelp_academic_dataset_*.json files
  raw_data_folder_path: data/raw
  # include_photos: true
  # batch_size: 10000
  # derive_tables: true
"#;

const ENV_PREFIX: &str = "YELPDB";
const SECTION: &str = "database";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YelpDbConfig {
    /// SQLite database file; created if it does not exist
    pub database_file_path: PathBuf,
    /// Folder holding the raw JSON-lines files
    pub raw_data_folder_path: PathBuf,
    pub include_photos: bool,
    pub batch_size: usize,
    pub derive_tables: bool,
}

impl YelpDbConfig {
    /// Load configuration from a YAML file plus `YELPDB_` environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: &Path, env: Environment) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::config(path, "configuration file not found"));
        }

        let settings = Config::builder()
            .add_source(config::File::from(path).format(FileFormat::Yaml))
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()
            .map_err(|e| Error::config(path, e.to_string()))?;

        Self::from_settings(&settings, path)
    }

    /// Parse configuration from YAML text (no environment overrides)
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let origin = Path::new("<inline>");
        let settings = Config::builder()
            .add_source(config::File::from_str(yaml, FileFormat::Yaml))
            .build()
            .map_err(|e| Error::config(origin, e.to_string()))?;

        Self::from_settings(&settings, origin)
    }

    fn from_settings(settings: &Config, origin: &Path) -> Result<Self> {
        let database_file_path = required_path(settings, origin, "database_file_path")?;
        let raw_data_folder_path = required_path(settings, origin, "raw_data_folder_path")?;

        let batch_size =
            lookup::<usize>(settings, origin, "batch_size")?.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(Error::config(origin, "batch_size must be greater than zero"));
        }

        Ok(YelpDbConfig {
            database_file_path,
            raw_data_folder_path,
            include_photos: lookup(settings, origin, "include_photos")?.unwrap_or(true),
            batch_size,
            derive_tables: lookup(settings, origin, "derive_tables")?.unwrap_or(true),
        })
    }

    /// Ingestion options carried by this configuration
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            include_photos: self.include_photos,
            batch_size: self.batch_size,
            derive_tables: self.derive_tables,
        }
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Database File:      {}", self.database_file_path.display()),
            format!("Raw Data Folder:    {}", self.raw_data_folder_path.display()),
            format!("Include Photos:     {}", self.include_photos),
            format!("Batch Size:         {}", self.batch_size),
            format!("Derived Tables:     {}", self.derive_tables),
        ]
        .join("\n")
    }
}

/// Value of `key` from the `database` section, else from the top level
fn lookup<T: DeserializeOwned>(
    settings: &Config,
    origin: &Path,
    key: &str,
) -> Result<Option<T>> {
    for full_key in [format!("{}.{}", SECTION, key), key.to_string()] {
        match settings.get::<T>(&full_key) {
            Ok(value) => return Ok(Some(value)),
            Err(ConfigError::NotFound(_)) => continue,
            Err(e) => return Err(Error::config(origin, format!("invalid '{}': {}", key, e))),
        }
    }
    Ok(None)
}

fn required_path(settings: &Config, origin: &Path, key: &str) -> Result<PathBuf> {
    match lookup::<String>(settings, origin, key)? {
        Some(value) if !value.trim().is_empty() => Ok(PathBuf::from(value.trim())),
        Some(_) => Err(Error::config(origin, format!("'{}' must not be empty", key))),
        None => Err(Error::config(origin, format!("missing required key '{}'", key))),
    }
}
