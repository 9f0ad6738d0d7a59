//! Reconciliation between the index and the filesystem.
//!
//! Files are added, moved and deleted behind the index's back. The
//! reconciler periodically compares what is on disk with what the index
//! remembers:
//!
//! 1. [`Reconciler::collect_live`] walks the tree (quarantine excluded) and
//!    the quarantine area once each. The tree walk yields images only; the
//!    quarantine walk yields every regular file, since anything can be
//!    quarantined.
//! 2. [`Reconciler::resync_ledger_from_disk`] recreates ledger records for
//!    quarantined files that have none, inferring the original location
//!    from the file's position under the quarantine root.
//! 3. [`Reconciler::sweep_orphans`] deletes rows for files that no longer exist.
//!
//! Rows written (by wall clock) after the live set was captured are never
//! swept, whatever their domain timestamps say, so requests
//! served while a walk is in progress are safe. Only one reconciliation runs
//! at a time; a concurrent attempt fails fast with
//! [`Error::ReconcileInProgress`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::index::{Index, RelocationRecord};
use crate::scanner::path_utils::{canonicalize, mtime_secs, now_secs, reroot};
use crate::scanner::{Walker, WalkerConfig};

/// How often the periodic task checks its shutdown flag while idle.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Snapshot of the files present on disk.
#[derive(Debug, Clone, Default)]
pub struct LiveSet {
    /// Images in the gallery tree, quarantine excluded.
    pub tree: HashSet<PathBuf>,
    /// Every file inside the quarantine area, images or not.
    pub quarantine: HashSet<PathBuf>,
    /// Epoch seconds taken before either walk started.
    pub captured_at: f64,
}

impl LiveSet {
    /// Whether `path` exists in either area.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.tree.contains(path) || self.quarantine.contains(path)
    }
}

/// Rows deleted by [`Reconciler::sweep_orphans`], per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub cache: usize,
    pub recency: usize,
    pub ledger: usize,
}

impl SweepReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.cache + self.recency + self.ledger
    }
}

/// Outcome of a full [`Reconciler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Images found in the tree.
    pub tree_images: usize,
    /// Files found in the quarantine area.
    pub quarantined_images: usize,
    /// Ledger records recreated from the quarantine layout.
    pub resynced: usize,
    /// Orphaned rows removed.
    pub swept: SweepReport,
}

/// Keeps the index consistent with the filesystem.
#[derive(Debug)]
pub struct Reconciler {
    tree_root: PathBuf,
    quarantine_root: PathBuf,
    walker_config: WalkerConfig,
    index: Index,
    /// Canonical index database path, kept out of the quarantine walk.
    index_file: Option<PathBuf>,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag when dropped.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Reconciler {
    /// Create a reconciler for `tree_root`, whose quarantine lives at `quarantine_root`.
    ///
    /// `walker_config` supplies the recognized extensions and symlink policy;
    /// the quarantine root is always excluded from the tree walk.
    pub fn new(
        tree_root: &Path,
        quarantine_root: &Path,
        index: Index,
        walker_config: WalkerConfig,
    ) -> Result<Self> {
        let db = index.path();
        let index_file = db
            .parent()
            .and_then(|dir| canonicalize(dir).ok())
            .zip(db.file_name())
            .map(|(dir, name)| dir.join(name));
        Ok(Self {
            tree_root: canonicalize(tree_root)?,
            quarantine_root: canonicalize(quarantine_root)?,
            walker_config,
            index,
            index_file,
            in_progress: AtomicBool::new(false),
        })
    }

    /// Whether a reconciliation is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<RunGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ReconcileInProgress)?;
        Ok(RunGuard {
            flag: &self.in_progress,
        })
    }

    fn tree_walker(&self) -> Walker {
        let config = self
            .walker_config
            .clone()
            .exclude(self.quarantine_root.clone());
        Walker::new(&self.tree_root, config)
    }

    /// Every regular file under the quarantine root, except the index database
    /// and its journal if they were placed there.
    #[must_use]
    pub fn quarantined_files(&self) -> HashSet<PathBuf> {
        let config = self.walker_config.clone().with_extensions(Vec::new());
        Walker::new(&self.quarantine_root, config)
            .collect_set()
            .into_iter()
            .filter(|path| !self.is_index_file(path))
            .collect()
    }

    fn is_index_file(&self, path: &Path) -> bool {
        let Some(db) = &self.index_file else {
            return false;
        };
        path.parent() == db.parent()
            && path
                .file_name()
                .zip(db.file_name())
                .is_some_and(|(name, db_name)| {
                    name.as_encoded_bytes().starts_with(db_name.as_encoded_bytes())
                })
    }

    /// Walk both areas and return the files currently present.
    pub fn collect_live(&self) -> Result<LiveSet> {
        let _guard = self.acquire()?;
        Ok(self.collect_live_unguarded())
    }

    fn collect_live_unguarded(&self) -> LiveSet {
        let captured_at = now_secs();
        let started = Instant::now();
        let tree = self.tree_walker().collect_set();
        let quarantine = self.quarantined_files();
        log::debug!(
            "Live set: {} tree image(s), {} quarantined file(s) in {:.2?}",
            tree.len(),
            quarantine.len(),
            started.elapsed()
        );
        LiveSet {
            tree,
            quarantine,
            captured_at,
        }
    }

    /// Delete index rows whose file is gone.
    ///
    /// Cache and recency rows survive if their path is anywhere in `live`;
    /// ledger rows only if the path is in the quarantine area.
    pub fn sweep_orphans(&self, live: &LiveSet) -> Result<SweepReport> {
        let _guard = self.acquire()?;
        self.sweep_unguarded(live)
    }

    fn sweep_unguarded(&self, live: &LiveSet) -> Result<SweepReport> {
        let cutoff = live.captured_at;
        let report = SweepReport {
            cache: self
                .index
                .thumbnails()
                .remove_orphans(|p| live.contains(p), cutoff)?,
            recency: self
                .index
                .recency()
                .remove_orphans(|p| live.contains(p), cutoff)?,
            ledger: self
                .index
                .ledger()
                .remove_orphans(&live.quarantine, cutoff)?,
        };
        if report.total() > 0 {
            log::info!(
                "Swept {} orphaned row(s) (cache {}, recency {}, ledger {})",
                report.total(),
                report.cache,
                report.recency,
                report.ledger
            );
        }
        Ok(report)
    }

    /// Recreate ledger records for quarantined files that have none.
    ///
    /// The original location is the file's path relative to the quarantine
    /// root, re-rooted onto the tree root. The relocation time is the file's
    /// mtime. Existing records are never touched. Returns how many were added.
    pub fn resync_ledger_from_disk(&self) -> Result<usize> {
        let _guard = self.acquire()?;
        let quarantined = self.quarantined_files();
        self.resync_unguarded(&quarantined)
    }

    fn resync_unguarded(&self, quarantined: &HashSet<PathBuf>) -> Result<usize> {
        let ledger = self.index.ledger();
        let tracked = ledger.quarantine_paths()?;

        let mut missing: Vec<RelocationRecord> = quarantined
            .iter()
            .filter(|path| !tracked.contains(*path))
            .filter_map(|path| self.infer_record(path))
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }
        missing.sort_by(|a, b| a.quarantine_path.cmp(&b.quarantine_path));

        let inserted = ledger.insert_missing(&missing)?;
        log::info!("Recovered {} ledger record(s) from the quarantine layout", inserted);
        Ok(inserted)
    }

    fn infer_record(&self, quarantine_path: &Path) -> Option<RelocationRecord> {
        let original = reroot(quarantine_path, &self.quarantine_root, &self.tree_root)?;
        let relocated_at = match std::fs::metadata(quarantine_path).and_then(|m| mtime_secs(&m)) {
            Ok(mtime) => mtime,
            Err(e) => {
                log::warn!(
                    "Skipping {} during ledger resync: {}",
                    quarantine_path.display(),
                    e
                );
                return None;
            }
        };
        Some(RelocationRecord {
            quarantine_path: quarantine_path.to_path_buf(),
            original_path: original,
            relocated_at,
        })
    }

    /// Collect the live set, resync the ledger, then sweep orphans.
    pub fn run(&self) -> Result<ReconcileReport> {
        let _guard = self.acquire()?;
        let started = Instant::now();

        let live = self.collect_live_unguarded();
        let resynced = self.resync_unguarded(&live.quarantine)?;
        let swept = self.sweep_unguarded(&live)?;

        let report = ReconcileReport {
            tree_images: live.tree.len(),
            quarantined_images: live.quarantine.len(),
            resynced,
            swept,
        };
        log::debug!("Reconciliation finished in {:.2?}: {:?}", started.elapsed(), report);
        Ok(report)
    }

    /// Run [`Reconciler::run`] every `interval` on a background thread.
    ///
    /// The thread exits promptly once `shutdown` is set. Failures are logged
    /// and the next tick tries again.
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("reconciler".to_string())
            .spawn(move || {
                log::debug!("Periodic reconciliation every {:?}", interval);
                while !shutdown.load(Ordering::SeqCst) {
                    match self.run() {
                        Ok(report) => log::debug!("Periodic reconciliation: {:?}", report),
                        Err(Error::ReconcileInProgress) => {
                            log::debug!("Reconciliation already running, skipping tick");
                        }
                        Err(e) => log::warn!("Periodic reconciliation failed: {}", e),
                    }

                    let deadline = Instant::now() + interval;
                    while !shutdown.load(Ordering::SeqCst) && Instant::now() < deadline {
                        thread::sleep(SHUTDOWN_POLL.min(deadline - Instant::now()));
                    }
                }
                log::debug!("Periodic reconciliation stopped");
            })
    }
}
