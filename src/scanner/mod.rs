//! Scanner module for directory traversal and path canonicalization.
//!
//! This module provides functionality for:
//! - Lazy, restartable walking of the image tree with an exclusion set
//! - Canonical path resolution used for every index key
//! - Image file detection by extension
//!
//! # Architecture
//!
//! - [`walker`]: the one traversal primitive shared by listing and reconciliation
//! - [`path_utils`]: canonicalization, mtime extraction and re-rooting helpers
//!
//! # Example
//!
//! ```no_run
//! use gallery_index::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::default();
//! let walker = Walker::new(Path::new("/srv/gallery"), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod path_utils;
pub mod walker;

use std::collections::HashSet;
use std::path::PathBuf;

pub use path_utils::{canonicalize, is_image_file, resolve_lenient};
pub use walker::Walker;

/// Extensions recognized as images when no configuration overrides them.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Lower-case extensions (without the dot) that count as images.
    /// Empty means every regular file is yielded.
    pub extensions: Vec<String>,

    /// Canonical directories that are pruned from the walk entirely.
    pub excluded: HashSet<PathBuf>,

    /// Maximum depth below the root (`None` for unlimited, `Some(1)` for
    /// direct children only).
    pub max_depth: Option<usize>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            skip_hidden: false,
            extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            excluded: HashSet::new(),
            max_depth: None,
        }
    }
}

impl WalkerConfig {
    /// Prune `dir` (and everything below it) from the walk.
    #[must_use]
    pub fn exclude(mut self, dir: PathBuf) -> Self {
        self.excluded.insert(dir);
        self
    }

    /// Limit how deep the walk descends.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Replace the recognized image extensions. An empty list matches any file.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file or directory.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
