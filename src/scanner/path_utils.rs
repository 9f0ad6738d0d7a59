//! Canonical path helpers.
//!
//! Every key written to the index is the output of [`canonicalize`]: an
//! absolute path with symlinks and `.`/`..` segments resolved. Two spellings
//! of the same file therefore always map to the same key, and containment
//! checks ("is this file under the gallery root?") compare resolved paths on
//! both sides.
//!
//! # Example
//!
//! ```no_run
//! use gallery_index::scanner::path_utils::{canonicalize, reroot};
//! use std::path::Path;
//!
//! let file = canonicalize(Path::new("./photos/../photos/cat.jpg")).unwrap();
//! let moved = reroot(&file, Path::new("/srv/gallery"), Path::new("/srv/gallery/trash"));
//! ```

use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// Resolve `path` to its canonical absolute form.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the path does not exist.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| Error::from_io(path, e))
}

/// Resolve a path that may not exist yet.
///
/// Existing paths are fully canonicalized. Otherwise the nearest existing
/// ancestor is canonicalized and the remaining components are re-attached,
/// with `.` dropped and `..` applied lexically.
#[must_use]
pub fn resolve_lenient(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut tail: Vec<Component<'_>> = Vec::new();
    let mut cursor = absolute.as_path();
    loop {
        if let Ok(base) = std::fs::canonicalize(cursor) {
            let mut resolved = base;
            for component in tail.iter().rev() {
                match component {
                    Component::CurDir => {}
                    Component::ParentDir => {
                        resolved.pop();
                    }
                    other => resolved.push(other.as_os_str()),
                }
            }
            return resolved;
        }
        match (cursor.parent(), cursor.components().next_back()) {
            (Some(parent), Some(last)) => {
                tail.push(last);
                cursor = parent;
            }
            _ => return absolute,
        }
    }
}

/// Render a canonical path as the string key stored in the index.
#[must_use]
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Check whether `path` has one of the given image extensions (case-insensitive).
#[must_use]
pub fn is_image_file<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    extensions.iter().any(|e| e.as_ref() == ext)
}

/// Move `path` from below `from_root` to the same relative location below `to_root`.
///
/// Returns `None` when `path` is not inside `from_root`.
#[must_use]
pub fn reroot(path: &Path, from_root: &Path, to_root: &Path) -> Option<PathBuf> {
    path.strip_prefix(from_root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(|rel| to_root.join(rel))
}

/// Convert a `SystemTime` to Unix epoch seconds (negative before the epoch).
#[must_use]
pub fn system_time_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Current wall-clock time in Unix epoch seconds.
#[must_use]
pub fn now_secs() -> f64 {
    system_time_secs(SystemTime::now())
}

/// Modification time of a file in Unix epoch seconds.
///
/// # Errors
///
/// Fails if the platform does not report modification times.
pub fn mtime_secs(metadata: &Metadata) -> io::Result<f64> {
    metadata.modified().map(system_time_secs)
}

/// `path`'s name with `_{n}` inserted before the extension (`cat.jpg` → `cat_2.jpg`).
#[must_use]
pub fn with_numeric_suffix(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    path.with_file_name(name)
}

/// First path in `path`, `path_1`, `path_2`, … that does not exist.
///
/// Dangling symlinks count as occupied.
#[must_use]
pub fn first_free_path(path: &Path) -> PathBuf {
    if std::fs::symlink_metadata(path).is_err() {
        return path.to_path_buf();
    }
    let mut n = 1;
    loop {
        let candidate = with_numeric_suffix(path, n);
        if std::fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        n += 1;
    }
}
