//! Recency tracking for least-recently-viewed selection.
//!
//! Never-viewed paths are seeded with their own modification time, so among
//! unviewed images the oldest file comes up first, and any real view (stamped
//! with the current time) pushes an image behind all of them.
//!
//! [`RecencyStore::least_recently_accessed`] seeds missing candidates itself,
//! using the same rule as [`RecencyStore::sync`]. Callers never need to sync
//! first, and calling `sync` first changes nothing.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, OptionalExtension};

use super::database::IndexDb;
use super::entry::RecencyRecord;
use crate::error::Result;
use crate::scanner::path_utils::{mtime_secs, now_secs, path_key};

/// Seed timestamp for a path with no recorded view: its mtime, or the epoch
/// if it cannot be read.
#[must_use]
pub fn seed_timestamp(path: &Path) -> f64 {
    fs::metadata(path)
        .and_then(|m| mtime_secs(&m))
        .unwrap_or(0.0)
}

/// Per-path last-access timestamps. Paths must already be canonical.
#[derive(Debug, Clone, Copy)]
pub struct RecencyStore<'a> {
    db: &'a IndexDb,
}

impl<'a> RecencyStore<'a> {
    pub(crate) fn new(db: &'a IndexDb) -> Self {
        Self { db }
    }

    /// Create records for any `paths` that have none, seeded with file mtime.
    ///
    /// Existing records are left untouched. Returns the number inserted.
    pub fn sync(&self, paths: &[PathBuf]) -> Result<usize> {
        let missing = self.missing(paths)?;
        if missing.is_empty() {
            return Ok(0);
        }

        // Stat outside the write transaction.
        let seeded: Vec<(String, f64)> = missing
            .into_iter()
            .map(|path| {
                let ts = seed_timestamp(&path);
                (path_key(&path), ts)
            })
            .collect();

        let written_at = now_secs();
        let inserted = self.db.with_tx(|tx| {
            let mut insert = tx.prepare_cached(
                "INSERT OR IGNORE INTO recency (path, last_access_at, written_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            let mut inserted = 0;
            for (key, ts) in &seeded {
                inserted += insert.execute(params![key, ts, written_at])?;
            }
            Ok(inserted)
        })?;
        log::debug!("Seeded {} recency record(s)", inserted);
        Ok(inserted)
    }

    fn missing(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        self.db.with_conn(|conn| {
            let mut select = conn.prepare_cached("SELECT 1 FROM recency WHERE path = ?1")?;
            let mut missing = Vec::new();
            for path in paths {
                if !select.exists([path_key(path)])? {
                    missing.push(path.clone());
                }
            }
            Ok(missing)
        })
    }

    /// Stamp `path` as viewed now.
    pub fn record_access(&self, path: &Path) -> Result<()> {
        self.record_access_at(path, now_secs())
    }

    /// Stamp `path` with an explicit access time.
    pub fn record_access_at(&self, path: &Path, at: f64) -> Result<()> {
        let key = path_key(path);
        let written_at = now_secs();
        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO recency (path, last_access_at, written_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET
                    last_access_at = excluded.last_access_at,
                    written_at = excluded.written_at",
                params![key, at, written_at],
            )
            .map(|_| ())
        })?;
        log::trace!("Recorded access to {}", path.display());
        Ok(())
    }

    /// The candidate with the oldest timestamp.
    ///
    /// Candidates without a record are seeded first (see [`Self::sync`]).
    /// Ties go to the candidate that appears first in `candidates`.
    /// Returns `None` only when `candidates` is empty.
    pub fn least_recently_accessed(&self, candidates: &[PathBuf]) -> Result<Option<PathBuf>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        self.sync(candidates)?;

        let stamps: Vec<Option<f64>> = self.db.with_conn(|conn| {
            let mut select =
                conn.prepare_cached("SELECT last_access_at FROM recency WHERE path = ?1")?;
            candidates
                .iter()
                .map(|path| {
                    select
                        .query_row([path_key(path)], |row| row.get(0))
                        .optional()
                })
                .collect()
        })?;

        let mut best: Option<(usize, f64)> = None;
        for (i, stamp) in stamps.into_iter().enumerate() {
            // A record swept between the two steps falls back to the seed rule.
            let ts = stamp.unwrap_or_else(|| seed_timestamp(&candidates[i]));
            if best.map_or(true, |(_, best_ts)| ts < best_ts) {
                best = Some((i, ts));
            }
        }
        Ok(best.map(|(i, _)| candidates[i].clone()))
    }

    /// The stored record for `path`, if any.
    pub fn get(&self, path: &Path) -> Result<Option<RecencyRecord>> {
        let key = path_key(path);
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT path, last_access_at FROM recency WHERE path = ?1",
                [&key],
                RecencyRecord::from_row,
            )
            .optional()
        })
    }

    /// Delete the record for `path`. Returns whether one existed.
    pub fn delete(&self, path: &Path) -> Result<bool> {
        let key = path_key(path);
        self.db.with_tx(|tx| {
            tx.execute("DELETE FROM recency WHERE path = ?1", [&key])
                .map(|n| n > 0)
        })
    }

    /// Number of records.
    pub fn len(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM recency", [], |row| row.get::<_, i64>(0))
                .map(|n| u64::try_from(n).unwrap_or(0))
        })
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Delete records whose path fails `is_live`, skipping ones written at or
    /// after `cutoff`.
    pub fn remove_orphans<F>(&self, is_live: F, cutoff: f64) -> Result<usize>
    where
        F: Fn(&Path) -> bool,
    {
        self.db.with_tx(|tx| {
            let orphans: Vec<String> = {
                let mut stmt = tx.prepare("SELECT path, written_at FROM recency")?;
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
            let mut delete = tx.prepare_cached("DELETE FROM recency WHERE path = ?1")?;
            for path in &orphans {
                delete.execute([path])?;
            }
            Ok(orphans.len())
        })
    }
}
