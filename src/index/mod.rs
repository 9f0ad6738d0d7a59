//! Persistent index over the gallery tree.
//!
//! One SQLite file holds three independent tables, each exposed through a
//! small typed store:
//!
//! * [`thumbnails`]: cached thumbnail bytes, valid while the source mtime is unchanged
//! * [`recency`]: last-view timestamps for least-recently-viewed selection
//! * [`ledger`]: where each quarantined file came from
//!
//! [`database`] owns connections, migrations and self-healing; [`entry`]
//! defines the records rows are decoded into.
//!
//! Everything in here is derived data. Deleting the database file loses
//! thumbnails and view history but nothing else: the ledger can be rebuilt
//! from the quarantine directory layout by the reconciler.

pub mod database;
pub mod entry;
pub mod ledger;
pub mod recency;
pub mod thumbnails;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use database::{IndexDb, DEFAULT_BUSY_TIMEOUT, SCHEMA_VERSION};
pub use entry::{CacheEntry, RecencyRecord, RelocationRecord};
pub use ledger::LedgerStore;
pub use recency::RecencyStore;
pub use thumbnails::{CacheStats, ThumbnailStore};

use crate::error::Result;
use crate::scanner::path_utils::path_key;

/// Cheaply cloneable handle to the index database.
#[derive(Debug, Clone)]
pub struct Index {
    db: Arc<IndexDb>,
}

impl Index {
    /// Open (or create) the index at `path` with the default busy timeout.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open (or create) the index at `path`.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        Ok(Self {
            db: Arc::new(IndexDb::open(path, busy_timeout)?),
        })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Schema version recorded in the database.
    pub fn schema_version(&self) -> Result<i64> {
        self.db.schema_version()
    }

    #[must_use]
    pub fn thumbnails(&self) -> ThumbnailStore<'_> {
        ThumbnailStore::new(&self.db)
    }

    #[must_use]
    pub fn recency(&self) -> RecencyStore<'_> {
        RecencyStore::new(&self.db)
    }

    #[must_use]
    pub fn ledger(&self) -> LedgerStore<'_> {
        LedgerStore::new(&self.db)
    }

    /// Remove `path` from all three tables in one transaction.
    pub fn forget(&self, path: &Path) -> Result<()> {
        let key = path_key(path);
        self.db.with_tx(|tx| {
            tx.execute("DELETE FROM thumbnails WHERE path = ?1", [&key])?;
            tx.execute("DELETE FROM recency WHERE path = ?1", [&key])?;
            tx.execute("DELETE FROM ledger WHERE quarantine_path = ?1", [&key])?;
            Ok(())
        })?;
        log::trace!("Forgot {}", path.display());
        Ok(())
    }

    /// Empty every table.
    pub fn clear(&self) -> Result<()> {
        self.db.with_tx(|tx| {
            tx.execute_batch(
                "DELETE FROM thumbnails;
                 DELETE FROM recency;
                 DELETE FROM ledger;",
            )
        })?;
        log::info!("Cleared index at {}", self.path().display());
        Ok(())
    }
}
