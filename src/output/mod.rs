//! Output formatters for CLI results.
//!
//! - [`ledger`]: quarantined files as JSON or an aligned text table
//! - [`stats`]: index statistics with human-readable sizes
//!
//! # Example
//!
//! ```no_run
//! use gallery_index::config::Config;
//! use gallery_index::gallery::Gallery;
//! use gallery_index::output::LedgerOutput;
//!
//! let gallery = Gallery::open(Config::default()).unwrap();
//! let output = LedgerOutput::new(&gallery.ledger().unwrap());
//! output.write_to(&mut std::io::stdout(), true).unwrap();
//! ```

pub mod ledger;
pub mod stats;

pub use ledger::{JsonLedgerEntry, LedgerOutput};
pub use stats::StatsOutput;

use chrono::{DateTime, Local, Utc};

/// Errors that can occur while writing output.
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error while writing output: {0}")]
    Io(#[from] std::io::Error),
}

/// Epoch seconds as an RFC 3339 UTC timestamp.
pub(crate) fn rfc3339(epoch_secs: f64) -> String {
    to_utc(epoch_secs).to_rfc3339()
}

/// Epoch seconds in local time for human-readable tables.
pub(crate) fn local_time(epoch_secs: f64) -> String {
    let local: DateTime<Local> = to_utc(epoch_secs).into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn to_utc(epoch_secs: f64) -> DateTime<Utc> {
    let secs = epoch_secs.floor();
    let nanos = ((epoch_secs - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999)).unwrap_or_default()
}
