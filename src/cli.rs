//! Command-line interface definitions for gallery-index.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, config file, gallery root) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Reconcile the index with the filesystem once
//! gallery-index --root ~/Pictures reconcile
//!
//! # Keep reconciling every minute until Ctrl+C
//! gallery-index --root ~/Pictures watch --interval 60
//!
//! # Write a 200x200 thumbnail to a file
//! gallery-index thumbnail ~/Pictures/cat.jpg --size 200x200 --output cat_thumb.jpg
//!
//! # Quarantine an image, then bring it back
//! gallery-index quarantine ~/Pictures/blurry.jpg
//! gallery-index restore ~/Pictures/trash/blurry.jpg
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::thumbnail::Dimensions;

/// Rebuildable thumbnail, recency and quarantine index for an image directory.
///
/// gallery-index caches thumbnails, remembers which images were viewed last,
/// and moves unwanted images into a recoverable quarantine directory. The
/// index can be deleted at any time and is rebuilt from the filesystem.
#[derive(Debug, Parser)]
#[command(name = "gallery-index")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file to use instead of the platform default
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Gallery root directory (overrides the configuration file)
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    /// Print errors as JSON objects on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile the index with the filesystem once
    Reconcile,
    /// Reconcile periodically until interrupted
    Watch(WatchArgs),
    /// Print or write the thumbnail for an image
    Thumbnail(ThumbnailArgs),
    /// Generate missing thumbnails for every image in the gallery
    Warm,
    /// Print the next image to show and mark it viewed
    Next(NextArgs),
    /// Mark an image as viewed
    View(PathArg),
    /// Move an image into the quarantine directory
    Quarantine(PathArg),
    /// Move a quarantined image back to where it came from
    Restore(PathArg),
    /// Permanently delete every quarantined image
    Purge(PurgeArgs),
    /// List quarantined images, most recent first
    Ledger(JsonArg),
    /// Show index statistics
    Stats(JsonArg),
}

/// A single image path.
#[derive(Debug, Args)]
pub struct PathArg {
    /// Image file
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

/// Arguments for the watch subcommand.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between reconciliations (default from configuration)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

/// Arguments for the thumbnail subcommand.
#[derive(Debug, Args)]
pub struct ThumbnailArgs {
    /// Source image
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Write the thumbnail bytes to this file instead of printing a summary
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Bounding box used when the thumbnail has to be generated (e.g. 200x200)
    #[arg(long, value_name = "WxH", value_parser = parse_dimensions)]
    pub size: Option<Dimensions>,
}

/// Arguments for the next subcommand.
#[derive(Debug, Args)]
pub struct NextArgs {
    /// Pick a random image instead of the least recently viewed one
    #[arg(long)]
    pub random: bool,
}

/// Arguments for the purge subcommand.
#[derive(Debug, Args)]
pub struct PurgeArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Output selection for listing subcommands.
#[derive(Debug, Args)]
pub struct JsonArg {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Parse a `WIDTHxHEIGHT` bounding box.
///
/// # Examples
///
/// ```
/// use gallery_index::cli::parse_dimensions;
///
/// let dims = parse_dimensions("320x240").unwrap();
/// assert_eq!((dims.width, dims.height), (320, 240));
/// assert!(parse_dimensions("0x10").is_err());
/// ```
///
/// # Errors
///
/// Returns an error if the string is not two positive integers separated by `x`.
pub fn parse_dimensions(s: &str) -> Result<Dimensions, String> {
    let s = s.trim();
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Expected WIDTHxHEIGHT, got '{s}'"))?;

    let width: u32 = w
        .trim()
        .parse()
        .map_err(|_| format!("Invalid width: '{w}'"))?;
    let height: u32 = h
        .trim()
        .parse()
        .map_err(|_| format!("Invalid height: '{h}'"))?;

    if width == 0 || height == 0 {
        return Err("Width and height must be positive".to_string());
    }
    Ok(Dimensions::new(width, height))
}
