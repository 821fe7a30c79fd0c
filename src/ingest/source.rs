//! Source files of the Yelp dataset and how they are located on disk

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::mapping::{self, EntityMapping};
use crate::{Error, Result};

/// One kind of source file, and the entity table it feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Business,
    User,
    Review,
    Checkin,
    Tip,
    Photo,
}

impl SourceKind {
    /// All kinds in load order; business and user precede the records that reference them
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Business,
        SourceKind::User,
        SourceKind::Review,
        SourceKind::Checkin,
        SourceKind::Tip,
        SourceKind::Photo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Business => "business",
            SourceKind::User => "user",
            SourceKind::Review => "review",
            SourceKind::Checkin => "checkin",
            SourceKind::Tip => "tip",
            SourceKind::Photo => "photo",
        }
    }

    /// Business, user and review files must be present for a load to start
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            SourceKind::Business | SourceKind::User | SourceKind::Review
        )
    }

    /// Canonical file name as shipped in the dataset archive
    pub fn file_name(&self) -> &'static str {
        match self {
            SourceKind::Business => "yelp_academic_dataset_business.json",
            SourceKind::User => "yelp_academic_dataset_user.json",
            SourceKind::Review => "yelp_academic_dataset_review.json",
            SourceKind::Checkin => "yelp_academic_dataset_checkin.json",
            SourceKind::Tip => "yelp_academic_dataset_tip.json",
            SourceKind::Photo => "photos.json",
        }
    }

    /// Mapping from this kind's JSON records to its table
    pub fn mapping(&self) -> &'static EntityMapping {
        match self {
            SourceKind::Business => &mapping::BUSINESS,
            SourceKind::User => &mapping::USER,
            SourceKind::Review => &mapping::REVIEW,
            SourceKind::Checkin => &mapping::CHECKIN,
            SourceKind::Tip => &mapping::TIP,
            SourceKind::Photo => &mapping::PHOTO,
        }
    }

    /// Classify a file name by the first keyword it contains
    fn classify(file_name: &str) -> Option<SourceKind> {
        Self::ALL
            .into_iter()
            .find(|kind| file_name.contains(kind.as_str()))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "business" | "businesses" => Ok(SourceKind::Business),
            "user" | "users" => Ok(SourceKind::User),
            "review" | "reviews" => Ok(SourceKind::Review),
            "checkin" | "checkins" => Ok(SourceKind::Checkin),
            "tip" | "tips" => Ok(SourceKind::Tip),
            "photo" | "photos" => Ok(SourceKind::Photo),
            _ => Err(format!("unknown source kind '{}'", s)),
        }
    }
}

/// Source files found in a raw data folder
#[derive(Debug, Clone)]
pub struct SourceSet {
    folder: PathBuf,
    files: BTreeMap<SourceKind, PathBuf>,
}

impl SourceSet {
    /// Locate the source files under `folder`
    ///
    /// The canonical file name wins. Otherwise the first `*.json` file (in name
    /// order) whose name contains the kind's keyword is used.
    pub fn discover(folder: &Path) -> Result<Self> {
        if !folder.is_dir() {
            return Err(Error::config(
                folder,
                "raw data folder does not exist or is not a directory",
            ));
        }

        let mut files = BTreeMap::new();
        for kind in SourceKind::ALL {
            let path = folder.join(kind.file_name());
            if path.is_file() {
                files.insert(kind, path);
            }
        }

        let entries = std::fs::read_dir(folder).map_err(|e| Error::Io {
            path: folder.to_path_buf(),
            source: e,
        })?;
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        candidates.sort();

        for path in candidates {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(kind) = SourceKind::classify(name) {
                if !files.contains_key(&kind) {
                    debug!("Using {} as the {} source", path.display(), kind);
                    files.insert(kind, path);
                }
            }
        }

        Ok(Self {
            folder: folder.to_path_buf(),
            files,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path of the given kind's file, if present
    pub fn path(&self, kind: SourceKind) -> Option<&Path> {
        self.files.get(&kind).map(PathBuf::as_path)
    }

    /// Fail on the first required kind without a file
    pub fn check_required(&self) -> Result<()> {
        for kind in SourceKind::ALL.into_iter().filter(SourceKind::is_required) {
            if !self.files.contains_key(&kind) {
                return Err(Error::MissingInput {
                    kind,
                    folder: self.folder.clone(),
                });
            }
        }
        Ok(())
    }
}
