//! Thumbnail table access.

use std::path::{Path, PathBuf};

use rusqlite::{params, OptionalExtension};

use super::database::IndexDb;
use super::entry::CacheEntry;
use crate::error::Result;
use crate::scanner::path_utils::{now_secs, path_key};

/// Aggregate numbers about the thumbnail table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub total_bytes: u64,
}

/// CRUD over cached thumbnails. Paths must already be canonical.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailStore<'a> {
    db: &'a IndexDb,
}

impl<'a> ThumbnailStore<'a> {
    pub(crate) fn new(db: &'a IndexDb) -> Self {
        Self { db }
    }

    /// Look up the stored entry for `path`, valid or not.
    pub fn get(&self, path: &Path) -> Result<Option<CacheEntry>> {
        let key = path_key(path);
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT path, data, created_at, source_mtime, source_size
                 FROM thumbnails WHERE path = ?1",
                [&key],
                CacheEntry::from_row,
            )
            .optional()
        })
    }

    /// Insert or overwrite the entry for `entry.path`.
    pub fn put(&self, entry: &CacheEntry) -> Result<()> {
        let key = path_key(&entry.path);
        let size = i64::try_from(entry.source_size).unwrap_or(i64::MAX);
        let written_at = now_secs();
        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO thumbnails
                    (path, data, created_at, source_mtime, source_size, written_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(path) DO UPDATE SET
                    data = excluded.data,
                    created_at = excluded.created_at,
                    source_mtime = excluded.source_mtime,
                    source_size = excluded.source_size,
                    written_at = excluded.written_at",
                params![key, entry.data, entry.created_at, entry.source_mtime, size, written_at],
            )
            .map(|_| ())
        })
    }

    /// Delete the entry for `path`. Returns whether one existed.
    pub fn delete(&self, path: &Path) -> Result<bool> {
        let key = path_key(path);
        self.db.with_tx(|tx| {
            tx.execute("DELETE FROM thumbnails WHERE path = ?1", [&key])
                .map(|n| n > 0)
        })
    }

    /// Number of entries and total stored bytes.
    pub fn stats(&self) -> Result<CacheStats> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(data)), 0) FROM thumbnails",
                [],
                |row| {
                    Ok(CacheStats {
                        entries: u64::try_from(row.get::<_, i64>(0)?).unwrap_or(0),
                        total_bytes: u64::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
                    })
                },
            )
        })
    }

    /// Delete entries whose path fails `is_live`, skipping entries written at or
    /// after `cutoff`.
    pub fn remove_orphans<F>(&self, is_live: F, cutoff: f64) -> Result<usize>
    where
        F: Fn(&Path) -> bool,
    {
        self.db.with_tx(|tx| {
            let orphans: Vec<String> = {
                let mut stmt = tx.prepare("SELECT path, written_at FROM thumbnails")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })?;
                let mut orphans = Vec::new();
                for row in rows {
                    let (path, written_at) = row?;
                    if written_at < cutoff && !is_live(&PathBuf::from(&path)) {
                        orphans.push(path);
                    }
                }
                orphans
            };
            let mut delete = tx.prepare_cached("DELETE FROM thumbnails WHERE path = ?1")?;
            for path in &orphans {
                delete.execute([path])?;
            }
            Ok(orphans.len())
        })
    }
}
