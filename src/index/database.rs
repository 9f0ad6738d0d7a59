//! SQLite plumbing shared by the three index stores.
//!
//! Every operation opens its own connection, runs one short transaction and
//! drops the connection again, so [`IndexDb`] is `Send + Sync` and can be
//! shared freely between request threads. No connection outlives a call and
//! no lock is held while images are decoded or directories are walked.
//!
//! # Schema management
//!
//! The schema is versioned through `PRAGMA user_version` and applied once in
//! [`IndexDb::open`]. Steady-state reads and writes never probe for tables.
//! Instead, when a statement fails because the database file was deleted,
//! replaced with garbage, or had its tables dropped, the store heals itself
//! (recreating an empty schema) and retries the operation once.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};

use crate::error::{Error, Result};

/// Current schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 3;

/// Default time a connection waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One schema step, applied inside the migration transaction.
type Migration = fn(&Transaction<'_>) -> rusqlite::Result<()>;

/// Ordered migrations. Each step is idempotent so it can be replayed
/// when healing a database whose tables were dropped.
const MIGRATIONS: &[(i64, Migration)] = &[
    (1, create_tables),
    (2, create_indexes),
    (3, add_write_stamps),
];

const TABLES: &[&str] = &["thumbnails", "recency", "ledger"];

/// Column holding the wall-clock time a row was last written. The orphan
/// sweep compares it against the live-set capture time.
const WRITE_STAMP: &str = "written_at";

fn create_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS thumbnails (
            path TEXT PRIMARY KEY,
            data BLOB NOT NULL,
            created_at REAL NOT NULL,
            source_mtime REAL NOT NULL,
            source_size INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS recency (
            path TEXT PRIMARY KEY,
            last_access_at REAL NOT NULL
        );
        CREATE TABLE IF NOT EXISTS ledger (
            quarantine_path TEXT PRIMARY KEY,
            original_path TEXT NOT NULL,
            relocated_at REAL NOT NULL
        );
        ",
    )
}

fn create_indexes(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r"
        CREATE INDEX IF NOT EXISTS idx_recency_last_access ON recency(last_access_at);
        CREATE INDEX IF NOT EXISTS idx_ledger_relocated_at ON ledger(relocated_at DESC);
        ",
    )
}

/// Rows that predate this column count as written at the epoch.
fn add_write_stamps(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    for table in TABLES {
        if !has_column(tx, table, WRITE_STAMP)? {
            tx.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN {WRITE_STAMP} REAL NOT NULL DEFAULT 0"
            ))?;
        }
    }
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        if row.get::<_, String>("name")? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Handle to the on-disk index database.
#[derive(Debug)]
pub struct IndexDb {
    path: PathBuf,
    busy_timeout: Duration,
    /// Serializes healing so two failing threads don't both rebuild the file.
    heal_lock: Mutex<()>,
}

impl IndexDb {
    /// Open (or create) the index at `path` and bring its schema up to date.
    ///
    /// A file that is not a SQLite database is replaced with an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be created
    /// at all, e.g. because the directory is read-only.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let db = Self {
            path: path.to_path_buf(),
            busy_timeout,
            heal_lock: Mutex::new(()),
        };
        db.ensure_parent()?;
        match db.initialize() {
            Ok(()) => {}
            Err(e) if is_corruption(&e) => {
                log::warn!(
                    "Index at {} is unreadable ({}), recreating it",
                    db.path.display(),
                    e
                );
                db.remove_files();
                db.initialize().map_err(Error::StoreUnavailable)?;
            }
            Err(e) => return Err(Error::StoreUnavailable(e)),
        }
        log::debug!("Opened index at {}", db.path.display());
        Ok(db)
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema version recorded in the database.
    pub fn schema_version(&self) -> Result<i64> {
        self.with_conn(|conn| conn.query_row("PRAGMA user_version", [], |row| row.get(0)))
    }

    /// Run `op` against a fresh connection.
    pub(crate) fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(&Connection) -> rusqlite::Result<T>,
    {
        self.run(|conn| op(conn))
    }

    /// Run `op` inside an immediate transaction and commit it.
    pub(crate) fn with_tx<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(&Transaction<'_>) -> rusqlite::Result<T>,
    {
        self.run(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let value = op(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(&mut Connection) -> rusqlite::Result<T>,
    {
        match self.connect().and_then(|mut conn| op(&mut conn)) {
            Ok(value) => Ok(value),
            Err(e) if needs_heal(&e) => {
                log::warn!(
                    "Index at {} needs repair ({}), reinitializing",
                    self.path.display(),
                    e
                );
                self.heal(&e)?;
                let mut conn = self.connect().map_err(Error::StoreUnavailable)?;
                op(&mut conn).map_err(Error::StoreUnavailable)
            }
            Err(e) => Err(Error::StoreUnavailable(e)),
        }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    fn initialize(&self) -> rusqlite::Result<()> {
        let mut conn = self.connect()?;
        migrate(&mut conn)
    }

    /// Bring a broken database back to an empty, current schema.
    fn heal(&self, cause: &rusqlite::Error) -> Result<()> {
        let _guard = self
            .heal_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Another thread may have repaired it while we waited.
        if self.is_healthy() {
            return Ok(());
        }

        if is_corruption(cause) {
            self.remove_files();
        }
        self.ensure_parent()?;

        let result = self.connect().and_then(|mut conn| {
            conn.pragma_update(None, "user_version", 0)?;
            migrate(&mut conn)
        });
        match result {
            Ok(()) => Ok(()),
            Err(e) if is_corruption(&e) => {
                self.remove_files();
                self.initialize().map_err(Error::StoreUnavailable)
            }
            Err(e) => Err(Error::StoreUnavailable(e)),
        }
    }

    fn is_healthy(&self) -> bool {
        if !self.path.exists() {
            return false;
        }
        let Ok(conn) = self.connect() else {
            return false;
        };
        let found: rusqlite::Result<i64> = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (?1, ?2, ?3)",
            [TABLES[0], TABLES[1], TABLES[2]],
            |row| row.get(0),
        );
        found.is_ok_and(|n| n == TABLES.len() as i64)
    }

    fn ensure_parent(&self) -> Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| Error::from_io(parent, e))
            }
            _ => Ok(()),
        }
    }

    fn remove_files(&self) {
        for suffix in ["", "-journal", "-wal", "-shm"] {
            let mut name = self.path.as_os_str().to_os_string();
            name.push(suffix);
            let file = PathBuf::from(name);
            match fs::remove_file(&file) {
                Ok(()) => log::debug!("Removed {}", file.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", file.display(), e),
            }
        }
    }
}

/// Apply all migrations newer than the recorded `user_version`.
fn migrate(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current: i64 = tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > SCHEMA_VERSION {
        log::warn!(
            "Index schema version {} is newer than supported version {}",
            current,
            SCHEMA_VERSION
        );
    }
    for (version, step) in MIGRATIONS {
        if *version > current {
            log::debug!("Applying index migration {}", version);
            step(&tx)?;
            tx.pragma_update(None, "user_version", *version)?;
        }
    }
    tx.commit()
}

/// The file exists but is not (or no longer) a usable SQLite database.
fn is_corruption(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

/// Failures that reinitializing the schema can fix.
fn needs_heal(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, msg) => {
            matches!(
                err.code,
                ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt | ErrorCode::CannotOpen
            ) || msg
                .as_deref()
                .is_some_and(|m| m.contains("no such table"))
        }
        _ => false,
    }
}
