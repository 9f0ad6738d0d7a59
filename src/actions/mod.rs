//! File actions module.
//!
//! This module provides the operations that physically move gallery files:
//! - Quarantine (mirrored into a recoverable quarantine directory)
//! - Restore (back to the original location, never overwriting)
//! - Purge (permanent deletion of everything quarantined)
//!
//! ```no_run
//! use gallery_index::actions::Quarantine;
//! use gallery_index::index::Index;
//! use std::path::Path;
//!
//! let index = Index::open(Path::new("/srv/gallery/.igallery.db")).unwrap();
//! let root = Path::new("/srv/gallery");
//! let quarantine = Quarantine::new(root, &root.join("trash"), index).unwrap();
//! let purged = quarantine.purge_all().unwrap();
//! println!("Purged {} file(s)", purged);
//! ```

pub mod quarantine;

pub use quarantine::{prune_empty_ancestors, prune_empty_dirs, Quarantine};
