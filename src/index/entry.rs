//! Typed records stored in the index.
//!
//! Rows are decoded into these structs at the store boundary and nowhere else.

use std::path::PathBuf;

use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A cached thumbnail for one source image.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Canonical path of the source image.
    pub path: PathBuf,
    /// Encoded thumbnail bytes.
    pub data: Vec<u8>,
    /// When the thumbnail was generated (epoch seconds).
    pub created_at: f64,
    /// Source modification time the thumbnail was generated from.
    pub source_mtime: f64,
    /// Source size in bytes at generation time.
    pub source_size: u64,
}

impl CacheEntry {
    /// An entry is only usable while the source still has the same mtime.
    ///
    /// Rewriting a file without changing its mtime is not detected.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_valid_for(&self, current_mtime: f64) -> bool {
        self.source_mtime == current_mtime
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: PathBuf::from(row.get::<_, String>("path")?),
            data: row.get("data")?,
            created_at: row.get("created_at")?,
            source_mtime: row.get("source_mtime")?,
            source_size: u64::try_from(row.get::<_, i64>("source_size")?).unwrap_or(0),
        })
    }
}

/// Last time a path was shown, or its mtime if it never was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecencyRecord {
    pub path: PathBuf,
    pub last_access_at: f64,
}

impl RecencyRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: PathBuf::from(row.get::<_, String>("path")?),
            last_access_at: row.get("last_access_at")?,
        })
    }
}

/// Where a quarantined file came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelocationRecord {
    /// Canonical path of the file inside the quarantine area.
    pub quarantine_path: PathBuf,
    /// Canonical path the file was moved from.
    pub original_path: PathBuf,
    /// When it was moved (epoch seconds); the file mtime when rebuilt from disk.
    pub relocated_at: f64,
}

impl RelocationRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            quarantine_path: PathBuf::from(row.get::<_, String>("quarantine_path")?),
            original_path: PathBuf::from(row.get::<_, String>("original_path")?),
            relocated_at: row.get("relocated_at")?,
        })
    }
}
