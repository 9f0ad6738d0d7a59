//! Index statistics output.

use std::io::Write;
use std::path::Path;

use bytesize::ByteSize;
use serde::Serialize;

use super::OutputError;
use crate::gallery::GalleryStats;

/// Statistics for one gallery.
#[derive(Debug, Clone, Serialize)]
pub struct StatsOutput {
    pub root: String,
    pub index: String,
    #[serde(flatten)]
    pub stats: GalleryStats,
}

impl StatsOutput {
    #[must_use]
    pub fn new(root: &Path, index: &Path, stats: GalleryStats) -> Self {
        Self {
            root: root.to_string_lossy().into_owned(),
            index: index.to_string_lossy().into_owned(),
            stats,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W, json: bool) -> Result<(), OutputError> {
        if json {
            serde_json::to_writer_pretty(&mut *writer, self)?;
            writer.write_all(b"\n")?;
            return Ok(());
        }
        let s = &self.stats;
        writeln!(writer, "Gallery:      {}", self.root)?;
        writeln!(writer, "Index:        {}", self.index)?;
        writeln!(writer, "Images:       {}", s.images)?;
        writeln!(
            writer,
            "Quarantined:  {} ({} tracked)",
            s.quarantined, s.ledger_records
        )?;
        writeln!(
            writer,
            "Thumbnails:   {} ({})",
            s.cached_thumbnails,
            ByteSize::b(s.cached_bytes)
        )?;
        writeln!(writer, "Viewed:       {}", s.viewed)?;
        Ok(())
    }
}
