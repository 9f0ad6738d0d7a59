//! High-level gallery handle.
//!
//! [`Gallery`] wires the index, thumbnail cache, quarantine and reconciler
//! together for one image tree, resolved from a [`Config`]. It is what the
//! CLI drives, and what an embedding service would hold behind an `Arc`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::actions::Quarantine;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::{CacheStats, Index, RelocationRecord};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::scanner::path_utils::{canonicalize, is_image_file};
use crate::scanner::{Walker, WalkerConfig};
use crate::thumbnail::{
    Dimensions, ImageThumbnailer, ThumbnailCache, ThumbnailGenerator, WarmReport,
};

/// Contents of a single gallery directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryListing {
    /// Visible subdirectories, quarantine excluded, sorted.
    pub directories: Vec<PathBuf>,
    /// Images directly inside the directory, sorted.
    pub images: Vec<PathBuf>,
}

impl DirectoryListing {
    /// One page of images (1-indexed) and the total page count.
    ///
    /// Out-of-range pages return an empty slice.
    #[must_use]
    pub fn page(&self, page: usize, per_page: usize) -> (&[PathBuf], usize) {
        if self.images.is_empty() || per_page == 0 {
            return (&[], 0);
        }
        let total_pages = self.images.len().div_ceil(per_page);
        if page == 0 || page > total_pages {
            return (&[], total_pages);
        }
        let start = (page - 1) * per_page;
        let end = (start + per_page).min(self.images.len());
        (&self.images[start..end], total_pages)
    }
}

/// Summary counts for `stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GalleryStats {
    pub images: usize,
    pub quarantined: usize,
    pub cached_thumbnails: u64,
    pub cached_bytes: u64,
    pub viewed: u64,
    pub ledger_records: u64,
}

/// One image tree with its index.
#[derive(Debug)]
pub struct Gallery {
    config: Config,
    root: PathBuf,
    walker_config: WalkerConfig,
    index: Index,
    cache: ThumbnailCache,
    quarantine: Quarantine,
    reconciler: Arc<Reconciler>,
}

impl Gallery {
    /// Open the gallery described by `config` with the default `image` generator.
    ///
    /// Creates the quarantine directory and index database if needed, and
    /// reconciles once when `reconcile_on_open` is set. A failed startup
    /// reconciliation is logged, not returned.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the gallery root does not exist.
    pub fn open(config: Config) -> Result<Self> {
        let generator = Arc::new(ImageThumbnailer::new(config.thumbnail.clone()));
        Self::open_with_generator(config, generator)
    }

    /// Open with a custom thumbnail generator.
    pub fn open_with_generator(
        mut config: Config,
        generator: Arc<dyn ThumbnailGenerator>,
    ) -> Result<Self> {
        config.gallery_root = canonicalize(&config.gallery_root)?;
        let root = config.gallery_root.clone();
        let index = Index::open_with_timeout(&config.database_path(), config.busy_timeout())?;
        let quarantine = Quarantine::new(&root, &config.quarantine_root(), index.clone())?;
        let walker_config = config.walker_config();
        let reconciler = Arc::new(Reconciler::new(
            &root,
            quarantine.quarantine_root(),
            index.clone(),
            walker_config.clone(),
        )?);
        let cache = ThumbnailCache::new(index.clone(), generator, &config.thumbnail);

        let gallery = Self {
            config,
            root,
            walker_config,
            index,
            cache,
            quarantine,
            reconciler,
        };
        log::debug!(
            "Opened gallery at {} (index {})",
            gallery.root.display(),
            gallery.index.path().display()
        );

        if gallery.config.reconcile_on_open {
            match gallery.reconciler.run() {
                Ok(report) => log::debug!("Startup reconciliation: {:?}", report),
                Err(e) => log::warn!("Startup reconciliation failed: {}", e),
            }
        }
        Ok(gallery)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Canonical gallery root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical quarantine root.
    #[must_use]
    pub fn quarantine_root(&self) -> &Path {
        self.quarantine.quarantine_root()
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Shared reconciler, e.g. for [`Reconciler::spawn_periodic`].
    #[must_use]
    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::clone(&self.reconciler)
    }

    /// Every image in the tree (quarantine excluded), sorted.
    #[must_use]
    pub fn images(&self) -> Vec<PathBuf> {
        let config = self
            .walker_config
            .clone()
            .exclude(self.quarantine_root().to_path_buf());
        Walker::new(&self.root, config).collect_sorted()
    }

    /// Every file in the quarantine area, sorted. Non-images are included
    /// because anything can be quarantined.
    #[must_use]
    pub fn quarantined_images(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.reconciler.quarantined_files().into_iter().collect();
        files.sort();
        files
    }

    /// Images and visible subdirectories directly inside `dir`.
    ///
    /// Hidden entries and the quarantine directory are skipped.
    pub fn list_directory(&self, dir: &Path) -> Result<DirectoryListing> {
        let dir = canonicalize(dir)?;
        let entries = fs::read_dir(&dir).map_err(|e| Error::from_io(&dir, e))?;

        let mut listing = DirectoryListing::default();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let Ok(path) = fs::canonicalize(entry.path()) else {
                continue;
            };
            if path.is_dir() {
                if path != self.quarantine_root() {
                    listing.directories.push(path);
                }
            } else if path.is_file() && is_image_file(&path, &self.walker_config.extensions) {
                listing.images.push(path);
            }
        }
        listing.directories.sort();
        listing.images.sort();
        Ok(listing)
    }

    /// Least recently viewed image in the whole tree, marked as viewed.
    ///
    /// `None` if the gallery has no images.
    pub fn next_in_slideshow(&self) -> Result<Option<PathBuf>> {
        let images = self.images();
        let recency = self.index.recency();
        let Some(next) = recency.least_recently_accessed(&images)? else {
            return Ok(None);
        };
        recency.record_access(&next)?;
        Ok(Some(next))
    }

    /// A random image from the whole tree, marked as viewed.
    ///
    /// `None` if the gallery has no images.
    pub fn next_random(&self) -> Result<Option<PathBuf>> {
        self.next_random_with(&mut rand::thread_rng())
    }

    /// [`Self::next_random`] drawing from `rng`.
    pub fn next_random_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Option<PathBuf>> {
        let images = self.images();
        let Some(next) = images.choose(rng).cloned() else {
            return Ok(None);
        };
        self.index.recency().record_access(&next)?;
        Ok(Some(next))
    }

    /// Record that `path` was viewed. Returns its canonical path.
    pub fn view(&self, path: &Path) -> Result<PathBuf> {
        let path = canonicalize(path)?;
        if !path.is_file() {
            return Err(Error::NotFound(path));
        }
        self.index.recency().record_access(&path)?;
        Ok(path)
    }

    /// Thumbnail bytes at the configured size.
    pub fn thumbnail(&self, path: &Path) -> Result<Vec<u8>> {
        self.cache.thumbnail(path)
    }

    /// Thumbnail bytes, generating at `max` on a miss.
    pub fn thumbnail_sized(&self, path: &Path, max: Dimensions) -> Result<Vec<u8>> {
        self.cache.get_or_create(path, max)
    }

    /// Generate thumbnails for every tree image not already cached.
    #[must_use]
    pub fn warm(&self) -> WarmReport {
        self.cache.warm(&self.images())
    }

    pub fn quarantine(&self, path: &Path) -> Result<PathBuf> {
        self.quarantine.quarantine(path)
    }

    pub fn restore(&self, quarantine_path: &Path) -> Result<PathBuf> {
        self.quarantine.restore(quarantine_path)
    }

    pub fn purge_all(&self) -> Result<usize> {
        self.quarantine.purge_all()
    }

    /// Tracked quarantined files, most recent first.
    pub fn ledger(&self) -> Result<Vec<RelocationRecord>> {
        self.quarantine.list()
    }

    /// Run one full reconciliation.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        self.reconciler.run()
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }

    pub fn stats(&self) -> Result<GalleryStats> {
        let cache = self.cache.stats()?;
        Ok(GalleryStats {
            images: self.images().len(),
            quarantined: self.quarantined_images().len(),
            cached_thumbnails: cache.entries,
            cached_bytes: cache.total_bytes,
            viewed: self.index.recency().len()?,
            ledger_records: self.index.ledger().len()?,
        })
    }
}
