//! Mtime-validated thumbnail cache.
//!
//! # Lookup
//!
//! 1. Canonicalize the path and stat it (missing file → [`Error::NotFound`]).
//! 2. If the stored entry's source mtime equals the live mtime, return it.
//! 3. Otherwise generate, store (overwriting any stale entry) and return.
//!
//! Generation failures are returned as [`Error::Decode`] and never stored,
//! so a fixed file is picked up on the next request.
//!
//! # Concurrency
//!
//! Misses are single-flight per path: the first caller generates while
//! later callers for the same path wait on a per-key lock and then read the
//! freshly stored entry. Different paths generate in parallel. The database
//! is never held open while the generator runs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;

use super::{Dimensions, ThumbnailConfig, ThumbnailGenerator};
use crate::error::{Error, Result};
use crate::index::{CacheEntry, CacheStats, Index};
use crate::scanner::path_utils::{canonicalize, mtime_secs, now_secs};

/// How a single request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Served {
    Hit,
    Generated,
}

/// Outcome of [`ThumbnailCache::warm`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    /// Thumbnails that were already cached and valid.
    pub hits: usize,
    /// Thumbnails generated by this call.
    pub generated: usize,
    /// Files that could not be read or decoded.
    pub failed: usize,
}

/// Thumbnail cache backed by the index database.
pub struct ThumbnailCache {
    index: Index,
    generator: Arc<dyn ThumbnailGenerator>,
    default_size: Dimensions,
    in_flight: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("index", &self.index)
            .field("default_size", &self.default_size)
            .finish_non_exhaustive()
    }
}

impl ThumbnailCache {
    /// Create a cache that fills misses from `generator`.
    #[must_use]
    pub fn new(
        index: Index,
        generator: Arc<dyn ThumbnailGenerator>,
        config: &ThumbnailConfig,
    ) -> Self {
        Self {
            index,
            generator,
            default_size: config.dimensions(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Thumbnail for `path` at the configured default size.
    pub fn thumbnail(&self, path: &Path) -> Result<Vec<u8>> {
        self.get_or_create(path, self.default_size)
    }

    /// Cached thumbnail for `path`, generating it on a miss.
    ///
    /// Entries are keyed by path alone; `max` only applies when a thumbnail
    /// is (re)generated.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the file cannot be stat'd
    /// - [`Error::Decode`] if generation fails (nothing is cached)
    pub fn get_or_create(&self, path: &Path, max: Dimensions) -> Result<Vec<u8>> {
        self.fetch(path, max).map(|(bytes, _)| bytes)
    }

    /// Generate thumbnails for every path not already cached, in parallel.
    ///
    /// Failures are logged and counted, never returned.
    pub fn warm(&self, paths: &[PathBuf]) -> WarmReport {
        let outcomes: Vec<Option<Served>> = paths
            .par_iter()
            .map(|path| match self.fetch(path, self.default_size) {
                Ok((_, served)) => Some(served),
                Err(e) => {
                    log::warn!("Could not warm thumbnail for {}: {}", path.display(), e);
                    None
                }
            })
            .collect();

        let mut report = WarmReport::default();
        for outcome in outcomes {
            match outcome {
                Some(Served::Hit) => report.hits += 1,
                Some(Served::Generated) => report.generated += 1,
                None => report.failed += 1,
            }
        }
        log::info!(
            "Warmed thumbnails: {} generated, {} already cached, {} failed",
            report.generated,
            report.hits,
            report.failed
        );
        report
    }

    /// Entry count and total stored bytes.
    pub fn stats(&self) -> Result<CacheStats> {
        self.index.thumbnails().stats()
    }

    fn fetch(&self, path: &Path, max: Dimensions) -> Result<(Vec<u8>, Served)> {
        let path = canonicalize(path)?;
        let metadata = fs::metadata(&path).map_err(|e| Error::from_io(&path, e))?;
        let mtime = mtime_secs(&metadata).map_err(|e| Error::from_io(&path, e))?;

        if let Some(bytes) = self.lookup(&path, mtime)? {
            return Ok((bytes, Served::Hit));
        }

        let slot = self.slot(&path);
        let result = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            self.fill(&path, mtime, metadata.len(), max)
        };
        self.release(&path, slot);
        result
    }

    /// Called with the per-key lock held.
    fn fill(
        &self,
        path: &Path,
        mtime: f64,
        size: u64,
        max: Dimensions,
    ) -> Result<(Vec<u8>, Served)> {
        // Another caller may have generated it while we waited for the lock.
        if let Some(bytes) = self.lookup(path, mtime)? {
            return Ok((bytes, Served::Hit));
        }

        log::debug!("Generating {} thumbnail for {}", max, path.display());
        let data = self.generator.generate(path, max)?;

        let entry = CacheEntry {
            path: path.to_path_buf(),
            data,
            created_at: now_secs(),
            source_mtime: mtime,
            source_size: size,
        };
        self.index.thumbnails().put(&entry)?;
        Ok((entry.data, Served::Generated))
    }

    fn lookup(&self, path: &Path, mtime: f64) -> Result<Option<Vec<u8>>> {
        match self.index.thumbnails().get(path)? {
            Some(entry) if entry.is_valid_for(mtime) => {
                log::trace!("Thumbnail cache hit: {}", path.display());
                Ok(Some(entry.data))
            }
            Some(_) => {
                log::trace!("Thumbnail stale (mtime changed): {}", path.display());
                Ok(None)
            }
            None => {
                log::trace!("Thumbnail cache miss: {}", path.display());
                Ok(None)
            }
        }
    }

    fn slot(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(path.to_path_buf()).or_default())
    }

    fn release(&self, path: &Path, slot: Arc<Mutex<()>>) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map and this caller hold it: nobody else is waiting.
        let last = Arc::strong_count(&slot) == 2;
        drop(slot);
        if last {
            in_flight.remove(path);
        }
    }
}
