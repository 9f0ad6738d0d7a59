//! Relocation ledger: quarantined path → original path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::{params, OptionalExtension};

use super::database::IndexDb;
use super::entry::RelocationRecord;
use crate::error::Result;
use crate::scanner::path_utils::{now_secs, path_key};

/// CRUD over relocation records. Paths must already be canonical.
#[derive(Debug, Clone, Copy)]
pub struct LedgerStore<'a> {
    db: &'a IndexDb,
}

impl<'a> LedgerStore<'a> {
    pub(crate) fn new(db: &'a IndexDb) -> Self {
        Self { db }
    }

    /// Insert a record, replacing any existing one for the same quarantine path.
    pub fn insert(&self, record: &RelocationRecord) -> Result<()> {
        let quarantine = path_key(&record.quarantine_path);
        let original = path_key(&record.original_path);
        let written_at = now_secs();
        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT OR REPLACE INTO ledger
                    (quarantine_path, original_path, relocated_at, written_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![quarantine, original, record.relocated_at, written_at],
            )
            .map(|_| ())
        })
    }

    /// Insert records that have no entry yet. Returns how many were inserted.
    pub fn insert_missing(&self, records: &[RelocationRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<(String, String, f64)> = records
            .iter()
            .map(|r| {
                (
                    path_key(&r.quarantine_path),
                    path_key(&r.original_path),
                    r.relocated_at,
                )
            })
            .collect();
        let written_at = now_secs();
        self.db.with_tx(|tx| {
            let mut insert = tx.prepare_cached(
                "INSERT OR IGNORE INTO ledger
                    (quarantine_path, original_path, relocated_at, written_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut inserted = 0;
            for (quarantine, original, at) in &rows {
                inserted += insert.execute(params![quarantine, original, at, written_at])?;
            }
            Ok(inserted)
        })
    }

    /// The record for a quarantined file, if tracked.
    pub fn get(&self, quarantine_path: &Path) -> Result<Option<RelocationRecord>> {
        let key = path_key(quarantine_path);
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT quarantine_path, original_path, relocated_at
                 FROM ledger WHERE quarantine_path = ?1",
                [&key],
                RelocationRecord::from_row,
            )
            .optional()
        })
    }

    /// Delete the record for a quarantined file. Returns whether one existed.
    pub fn remove(&self, quarantine_path: &Path) -> Result<bool> {
        let key = path_key(quarantine_path);
        self.db.with_tx(|tx| {
            tx.execute("DELETE FROM ledger WHERE quarantine_path = ?1", [&key])
                .map(|n| n > 0)
        })
    }

    /// All records, most recently relocated first.
    pub fn list(&self) -> Result<Vec<RelocationRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT quarantine_path, original_path, relocated_at
                 FROM ledger ORDER BY relocated_at DESC, quarantine_path ASC",
            )?;
            let rows = stmt.query_map([], RelocationRecord::from_row)?;
            rows.collect()
        })
    }

    /// Set of tracked quarantine paths.
    pub fn quarantine_paths(&self) -> Result<HashSet<PathBuf>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT quarantine_path FROM ledger")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0).map(PathBuf::from))?;
            rows.collect()
        })
    }

    /// Delete every record. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        self.db.with_tx(|tx| tx.execute("DELETE FROM ledger", []))
    }

    /// Number of records.
    pub fn len(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM ledger", [], |row| row.get::<_, i64>(0))
                .map(|n| u64::try_from(n).unwrap_or(0))
        })
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Delete records whose file is not in `live`, skipping ones written at or
    /// after `cutoff`. `relocated_at` is not consulted.
    pub fn remove_orphans(&self, live: &HashSet<PathBuf>, cutoff: f64) -> Result<usize> {
        self.db.with_tx(|tx| {
            let orphans: Vec<String> = {
                let mut stmt = tx.prepare("SELECT quarantine_path, written_at FROM ledger")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })?;
                let mut orphans = Vec::new();
                for row in rows {
                    let (path, written_at) = row?;
                    if written_at < cutoff && !live.contains(Path::new(&path)) {
                        orphans.push(path);
                    }
                }
                orphans
            };
            let mut delete = tx.prepare_cached("DELETE FROM ledger WHERE quarantine_path = ?1")?;
            for path in &orphans {
                delete.execute([path])?;
            }
            Ok(orphans.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;
    use tempfile::tempdir;

    fn record(q: &str, o: &str, at: f64) -> RelocationRecord {
        RelocationRecord {
            quarantine_path: PathBuf::from(q),
            original_path: PathBuf::from(o),
            relocated_at: at,
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        let ledger = index.ledger();

        let r = record("/g/trash/a.jpg", "/g/a.jpg", 10.0);
        ledger.insert(&r).unwrap();
        assert_eq!(ledger.get(Path::new("/g/trash/a.jpg")).unwrap(), Some(r));
        assert!(ledger.remove(Path::new("/g/trash/a.jpg")).unwrap());
        assert_eq!(ledger.get(Path::new("/g/trash/a.jpg")).unwrap(), None);
        assert!(!ledger.remove(Path::new("/g/trash/a.jpg")).unwrap());
    }

    #[test]
    fn test_list_newest_first() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        let ledger = index.ledger();

        ledger.insert(&record("/q/old.jpg", "/g/old.jpg", 1.0)).unwrap();
        ledger.insert(&record("/q/new.jpg", "/g/new.jpg", 3.0)).unwrap();
        ledger.insert(&record("/q/mid.jpg", "/g/mid.jpg", 2.0)).unwrap();

        let names: Vec<_> = ledger
            .list()
            .unwrap()
            .into_iter()
            .map(|r| r.quarantine_path)
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/q/new.jpg"),
                PathBuf::from("/q/mid.jpg"),
                PathBuf::from("/q/old.jpg")
            ]
        );
    }

    #[test]
    fn test_insert_missing_keeps_existing() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        let ledger = index.ledger();

        ledger.insert(&record("/q/a.jpg", "/g/sub/a.jpg", 5.0)).unwrap();
        let inserted = ledger
            .insert_missing(&[
                record("/q/a.jpg", "/g/a.jpg", 1.0),
                record("/q/b.jpg", "/g/b.jpg", 1.0),
            ])
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(
            ledger.get(Path::new("/q/a.jpg")).unwrap().unwrap().original_path,
            PathBuf::from("/g/sub/a.jpg")
        );
        assert_eq!(ledger.len().unwrap(), 2);
        assert_eq!(ledger.clear().unwrap(), 2);
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn test_remove_orphans_ignores_relocation_time() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        let ledger = index.ledger();

        // 2100-01-01, e.g. a file rebuilt from disk with a skewed mtime.
        ledger.insert(&record("/q/future.jpg", "/g/future.jpg", 4_102_444_800.0)).unwrap();
        ledger.insert(&record("/q/kept.jpg", "/g/kept.jpg", 1.0)).unwrap();
        let live = HashSet::from([PathBuf::from("/q/kept.jpg")]);

        assert_eq!(ledger.remove_orphans(&live, now_secs() + 1.0).unwrap(), 1);
        assert!(ledger.get(Path::new("/q/future.jpg")).unwrap().is_none());
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn test_remove_orphans_keeps_rows_written_after_cutoff() {
        let dir = tempdir().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        let ledger = index.ledger();

        let cutoff = now_secs();
        ledger.insert(&record("/q/fresh.jpg", "/g/fresh.jpg", 1.0)).unwrap();

        assert_eq!(ledger.remove_orphans(&HashSet::new(), cutoff).unwrap(), 0);
        assert_eq!(ledger.len().unwrap(), 1);
    }
}
