//! Directory walker built on walkdir.
//!
//! # Overview
//!
//! [`Walker`] is the single traversal primitive used by listing and by the
//! reconciler. It is:
//!
//! - iterative (walkdir keeps an explicit stack, no recursion in our code)
//! - lazy (paths are produced as the iterator is advanced)
//! - restartable (every call to [`Walker::walk`] starts a fresh traversal)
//! - pruning (directories in [`WalkerConfig::excluded`] are never entered)
//!
//! Only image files are yielded, as canonical absolute paths.
//!
//! # Example
//!
//! ```no_run
//! use gallery_index::scanner::{Walker, WalkerConfig};
//! use std::path::{Path, PathBuf};
//!
//! let config = WalkerConfig::default().exclude(PathBuf::from("/srv/gallery/trash"));
//! let walker = Walker::new(Path::new("/srv/gallery"), config);
//! let images: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} images", images.len());
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::path_utils::is_image_file;
use super::{ScanError, WalkerConfig};

/// Directory walker yielding canonical image paths.
#[derive(Debug, Clone)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
        }
    }

    /// Whether the walk should descend into / yield this entry.
    fn keep_entry(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        if self.config.skip_hidden
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with('.'))
        {
            return false;
        }
        if entry.file_type().is_dir() && self.is_excluded(entry.path()) {
            log::trace!("Pruning excluded directory: {}", entry.path().display());
            return false;
        }
        true
    }

    fn is_excluded(&self, dir: &Path) -> bool {
        if self.config.excluded.is_empty() {
            return false;
        }
        if self.config.excluded.contains(dir) {
            return true;
        }
        // Excluded dirs are canonical; the walked path may be spelled through a symlink.
        std::fs::canonicalize(dir).is_ok_and(|resolved| self.config.excluded.contains(&resolved))
    }

    /// Walk the directory tree, yielding canonical image paths.
    ///
    /// Errors (unreadable directories, vanished files) are yielded as
    /// [`ScanError`] values rather than stopping iteration. Children are
    /// visited in file-name order so output is deterministic.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        let mut walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();
        if let Some(depth) = self.config.max_depth {
            walk_dir = walk_dir.max_depth(depth);
        }

        walk_dir
            .into_iter()
            .filter_entry(move |entry| self.keep_entry(entry))
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if !entry.file_type().is_file() && !entry.path_is_symlink() {
                        return None;
                    }
                    if !self.config.extensions.is_empty()
                        && !is_image_file(entry.path(), &self.config.extensions)
                    {
                        return None;
                    }
                    match std::fs::canonicalize(entry.path()) {
                        Ok(path) if path.is_file() => Some(Ok(path)),
                        Ok(_) => None,
                        Err(e) => Some(Err(self.io_error(entry.path(), e))),
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
                    Some(Err(self.io_error(&path, source)))
                }
            })
    }

    /// Collect every image into a set, logging and skipping errors.
    #[must_use]
    pub fn collect_set(&self) -> HashSet<PathBuf> {
        self.walk()
            .filter_map(|result| match result {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("Skipping during walk: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Collect every image into a sorted list, logging and skipping errors.
    #[must_use]
    pub fn collect_sorted(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.collect_set().into_iter().collect();
        paths.sort();
        paths
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> ScanError {
        if source.kind() == std::io::ErrorKind::NotFound {
            log::debug!("File vanished during walk: {}", path.display());
            ScanError::NotFound(path.to_path_buf())
        } else {
            log::debug!("Walk error at {}: {}", path.display(), source);
            ScanError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}
