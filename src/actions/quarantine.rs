//! Reversible quarantine ("trash") for gallery images.
//!
//! # Overview
//!
//! Quarantined files are moved into a dedicated directory that mirrors the
//! gallery layout: `<root>/sub/cat.jpg` lands at `<quarantine>/sub/cat.jpg`.
//! Every move is recorded in the relocation ledger so it can be undone.
//!
//! - [`Quarantine::quarantine`]: move a file in, never overwriting (`cat_1.jpg`, `cat_2.jpg`, …)
//! - [`Quarantine::restore`]: move a tracked file back and drop its record
//! - [`Quarantine::purge_all`]: permanently delete every tracked file
//!
//! The directory layout is the durable source of truth. If the process dies
//! between the move and the ledger write, the reconciler rebuilds the missing
//! record from the file's position under the quarantine root.
//!
//! # Example
//!
//! ```no_run
//! use gallery_index::actions::Quarantine;
//! use gallery_index::index::Index;
//! use std::path::Path;
//!
//! let index = Index::open(Path::new("/srv/gallery/.igallery.db")).unwrap();
//! let quarantine = Quarantine::new(
//!     Path::new("/srv/gallery"),
//!     Path::new("/srv/gallery/trash"),
//!     index,
//! ).unwrap();
//!
//! let moved = quarantine.quarantine(Path::new("/srv/gallery/blurry.jpg")).unwrap();
//! let back = quarantine.restore(&moved).unwrap();
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::index::{Index, RelocationRecord};
use crate::scanner::path_utils::{canonicalize, first_free_path, now_secs, reroot, resolve_lenient};

/// Moves files between the gallery tree and its quarantine area.
#[derive(Debug)]
pub struct Quarantine {
    tree_root: PathBuf,
    quarantine_root: PathBuf,
    index: Index,
    /// Serializes free-name selection and the move that claims the name.
    move_lock: Mutex<()>,
}

impl Quarantine {
    /// Create the quarantine directory if needed and resolve both roots.
    ///
    /// # Errors
    ///
    /// Fails if the tree root does not exist or the quarantine directory
    /// cannot be created.
    pub fn new(tree_root: &Path, quarantine_root: &Path, index: Index) -> Result<Self> {
        let tree_root = canonicalize(tree_root)?;
        fs::create_dir_all(quarantine_root).map_err(|e| Error::from_io(quarantine_root, e))?;
        let quarantine_root = canonicalize(quarantine_root)?;
        Ok(Self {
            tree_root,
            quarantine_root,
            index,
            move_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn tree_root(&self) -> &Path {
        &self.tree_root
    }

    #[must_use]
    pub fn quarantine_root(&self) -> &Path {
        &self.quarantine_root
    }

    /// Whether a canonical path lies inside the quarantine area.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.quarantine_root)
    }

    /// Where `source` would go, before collision handling.
    fn target_for(&self, source: &Path) -> PathBuf {
        reroot(source, &self.tree_root, &self.quarantine_root).unwrap_or_else(|| {
            log::debug!(
                "{} is outside {}, quarantining by file name",
                source.display(),
                self.tree_root.display()
            );
            let name = source.file_name().unwrap_or(source.as_os_str());
            self.quarantine_root.join(name)
        })
    }

    /// Move `source` into quarantine and record where it came from.
    ///
    /// Returns the canonical path of the file inside the quarantine area.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `source` does not exist
    /// - [`Error::AlreadyQuarantined`] if `source` is already inside the quarantine area
    pub fn quarantine(&self, source: &Path) -> Result<PathBuf> {
        let source = canonicalize(source)?;
        if self.contains(&source) {
            return Err(Error::AlreadyQuarantined(source));
        }
        if !source.is_file() {
            return Err(Error::Io {
                path: source,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        let target = self.target_for(&source);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::from_io(parent, e))?;
        }

        let target = {
            let _guard = self.move_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let target = first_free_path(&target);
            move_file(&source, &target)?;
            target
        };
        let target = canonicalize(&target)?;

        self.index.ledger().insert(&RelocationRecord {
            quarantine_path: target.clone(),
            original_path: source.clone(),
            relocated_at: now_secs(),
        })?;
        log::info!("Quarantined {} -> {}", source.display(), target.display());
        Ok(target)
    }

    /// Move a tracked file back to where it came from.
    ///
    /// If another file now occupies the original location, the restored
    /// file gets a numeric suffix instead of overwriting it. Returns the path
    /// the file was restored to.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the ledger has no record for the path (even if
    /// the file exists) or if the file is gone from disk.
    pub fn restore(&self, quarantine_path: &Path) -> Result<PathBuf> {
        let quarantine_path = resolve_lenient(quarantine_path);
        let record = self
            .index
            .ledger()
            .get(&quarantine_path)?
            .ok_or_else(|| Error::NotFound(quarantine_path.clone()))?;
        if fs::symlink_metadata(&quarantine_path).is_err() {
            return Err(Error::NotFound(quarantine_path));
        }

        let original = record.original_path;
        if let Some(parent) = original.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::from_io(parent, e))?;
        }

        let destination = {
            let _guard = self.move_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let destination = first_free_path(&original);
            if destination != original {
                log::warn!(
                    "{} is occupied, restoring to {}",
                    original.display(),
                    destination.display()
                );
            }
            move_file(&quarantine_path, &destination)?;
            destination
        };

        self.index.forget(&quarantine_path)?;
        if let Some(parent) = quarantine_path.parent() {
            prune_empty_ancestors(parent, &self.quarantine_root);
        }
        log::info!(
            "Restored {} -> {}",
            quarantine_path.display(),
            destination.display()
        );
        Ok(destination)
    }

    /// Permanently delete every tracked quarantined file.
    ///
    /// Index entries for each path are removed from all tables and empty
    /// directories under the quarantine root are pruned. Files that cannot be
    /// deleted are logged and keep their record. Returns the number purged.
    pub fn purge_all(&self) -> Result<usize> {
        let records = self.index.ledger().list()?;
        let mut purged = 0;
        for record in &records {
            let path = &record.quarantine_path;
            match fs::remove_file(path) {
                Ok(()) => log::debug!("Deleted {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("Already gone: {}", path.display());
                }
                Err(e) => {
                    log::warn!("Failed to delete {}: {}", path.display(), e);
                    continue;
                }
            }
            self.index.forget(path)?;
            purged += 1;
        }

        let removed_dirs = prune_empty_dirs(&self.quarantine_root);
        log::info!(
            "Purged {} quarantined file(s), removed {} empty director{}",
            purged,
            removed_dirs,
            if removed_dirs == 1 { "y" } else { "ies" }
        );
        Ok(purged)
    }

    /// Tracked quarantined files, most recent first.
    pub fn list(&self) -> Result<Vec<RelocationRecord>> {
        self.index.ledger().list()
    }
}

/// Move a file, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!(
                "Rename across devices, copying {} -> {}",
                from.display(),
                to.display()
            );
            copy_then_remove(from, to)
        }
        Err(e) => Err(Error::from_io(from, e)),
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> Result<()> {
    let modified = fs::metadata(from)
        .and_then(|m| m.modified())
        .map_err(|e| Error::from_io(from, e))?;
    fs::copy(from, to).map_err(|e| Error::from_io(to, e))?;
    // Keep the mtime: the reconciler uses it as the relocation time.
    if let Err(e) = fs::File::options()
        .write(true)
        .open(to)
        .and_then(|f| f.set_modified(modified))
    {
        log::debug!("Could not preserve mtime on {}: {}", to.display(), e);
    }
    fs::remove_file(from).map_err(|e| Error::from_io(from, e))
}

/// Remove `start` and its ancestors while they are empty, stopping below `stop`.
pub fn prune_empty_ancestors(start: &Path, stop: &Path) {
    let mut dir = start;
    while dir != stop && dir.starts_with(stop) {
        if fs::remove_dir(dir).is_err() {
            break;
        }
        log::trace!("Removed empty directory {}", dir.display());
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }
}

/// Remove every empty directory below `root` (never `root` itself).
///
/// Returns how many directories were removed.
pub fn prune_empty_dirs(root: &Path) -> usize {
    WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| fs::remove_dir(entry.path()).is_ok())
        .count()
}
