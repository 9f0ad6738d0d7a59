//! Application configuration management.
//!
//! Settings are layered with `figment`, lowest precedence first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file (platform config dir, or `--config FILE`)
//! 3. Environment variables prefixed with `GALLERY_INDEX_`; nested keys use
//!    `__`, e.g. `GALLERY_INDEX_THUMBNAIL__MAX_WIDTH=200`
//! 4. CLI flags ([`Config::merge_cli`])
//!
//! ```toml
//! gallery_root = "/srv/gallery"
//! quarantine_dir = "trash"
//! reconcile_interval_secs = 600
//!
//! [thumbnail]
//! max_width = 256
//! max_height = 256
//! format = "png"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Cli;
use crate::scanner::{WalkerConfig, DEFAULT_IMAGE_EXTENSIONS};
use crate::thumbnail::ThumbnailConfig;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "GALLERY_INDEX_";

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("thumbnail quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("thumbnail dimensions must be positive, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },

    #[error("quarantine_dir must name a directory")]
    EmptyQuarantineDir,

    #[error("image_extensions must not be empty")]
    NoExtensions,

    #[error("reconcile_interval_secs must be positive")]
    ZeroInterval,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the image tree.
    pub gallery_root: PathBuf,

    /// Quarantine directory, relative to the gallery root unless absolute.
    pub quarantine_dir: PathBuf,

    /// Index database file, relative to the gallery root unless absolute.
    pub database_file: PathBuf,

    /// Extensions (without the dot, case-insensitive) that count as images.
    pub image_extensions: Vec<String>,

    /// Follow symbolic links while walking the tree.
    pub follow_symlinks: bool,

    /// Thumbnail size and encoding.
    pub thumbnail: ThumbnailConfig,

    /// Seconds between periodic reconciliations.
    pub reconcile_interval_secs: u64,

    /// How long a store operation waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Reconcile once when the gallery is opened.
    pub reconcile_on_open: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gallery_root: PathBuf::from("."),
            quarantine_dir: PathBuf::from("trash"),
            database_file: PathBuf::from(".igallery.db"),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            follow_symlinks: false,
            thumbnail: ThumbnailConfig::default(),
            reconcile_interval_secs: 300,
            busy_timeout_ms: 5000,
            reconcile_on_open: true,
        }
    }
}

impl Config {
    /// Load the configuration from the default platform-specific path.
    ///
    /// Falls back to defaults (plus environment overrides) if the file is
    /// missing, and to plain defaults if it cannot be parsed.
    #[must_use]
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from_path(path),
            None => {
                log::debug!("No platform config directory, using defaults");
                Self::extract_or_default(Self::figment(None))
            }
        }
    }

    /// Load the configuration from a specific TOML file.
    #[must_use]
    pub fn load_from_path(path: PathBuf) -> Self {
        log::debug!("Loading configuration from {}", path.display());
        Self::extract_or_default(Self::figment(Some(&path)))
    }

    /// The layered provider chain without CLI overrides.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn extract_or_default(figment: Figment) -> Self {
        match figment.extract() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Write this configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        log::debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Get the default platform-specific configuration path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "gallery-index", "gallery-index")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply CLI flags on top of the loaded layers.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(root) = &cli.root {
            self.gallery_root = root.clone();
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thumb = &self.thumbnail;
        if !(1..=100).contains(&thumb.quality) {
            return Err(ConfigError::InvalidQuality(thumb.quality));
        }
        if thumb.max_width == 0 || thumb.max_height == 0 {
            return Err(ConfigError::ZeroDimension {
                width: thumb.max_width,
                height: thumb.max_height,
            });
        }
        if self.quarantine_dir.as_os_str().is_empty() || self.quarantine_dir == Path::new(".") {
            return Err(ConfigError::EmptyQuarantineDir);
        }
        if self.image_extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        if self.reconcile_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// Quarantine directory resolved against the gallery root.
    #[must_use]
    pub fn quarantine_root(&self) -> PathBuf {
        self.gallery_root.join(&self.quarantine_dir)
    }

    /// Database file resolved against the gallery root.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.gallery_root.join(&self.database_file)
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    #[must_use]
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// Walker settings derived from this configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            extensions: self
                .image_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            ..WalkerConfig::default()
        }
    }
}
