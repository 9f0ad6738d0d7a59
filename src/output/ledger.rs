//! Quarantine ledger output.
//!
//! # JSON schema
//!
//! ```json
//! {
//!   "quarantined": [
//!     {
//!       "quarantine_path": "/srv/gallery/trash/album/cat.jpg",
//!       "original_path": "/srv/gallery/album/cat.jpg",
//!       "relocated_at": "2024-05-01T10:00:00+00:00"
//!     }
//!   ],
//!   "total": 1
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use super::{local_time, rfc3339, OutputError};
use crate::index::RelocationRecord;

/// A single ledger record in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonLedgerEntry {
    pub quarantine_path: String,
    pub original_path: String,
    /// Relocation time (RFC 3339, UTC)
    pub relocated_at: String,
}

impl From<&RelocationRecord> for JsonLedgerEntry {
    fn from(record: &RelocationRecord) -> Self {
        Self {
            quarantine_path: record.quarantine_path.to_string_lossy().into_owned(),
            original_path: record.original_path.to_string_lossy().into_owned(),
            relocated_at: rfc3339(record.relocated_at),
        }
    }
}

/// Ledger listing, newest first (the order records are given in).
#[derive(Debug, Clone, Serialize)]
pub struct LedgerOutput {
    pub quarantined: Vec<JsonLedgerEntry>,
    pub total: usize,
    #[serde(skip)]
    records: Vec<RelocationRecord>,
}

impl LedgerOutput {
    #[must_use]
    pub fn new(records: &[RelocationRecord]) -> Self {
        Self {
            quarantined: records.iter().map(JsonLedgerEntry::from).collect(),
            total: records.len(),
            records: records.to_vec(),
        }
    }

    /// Write as JSON (`json = true`) or as a text table.
    pub fn write_to<W: Write>(&self, writer: &mut W, json: bool) -> Result<(), OutputError> {
        if json {
            serde_json::to_writer_pretty(&mut *writer, self)?;
            writer.write_all(b"\n")?;
            return Ok(());
        }

        if self.records.is_empty() {
            writeln!(writer, "Quarantine is empty.")?;
            return Ok(());
        }
        for record in &self.records {
            writeln!(
                writer,
                "{}  {}\n                     <- {}",
                local_time(record.relocated_at),
                record.quarantine_path.display(),
                record.original_path.display()
            )?;
        }
        writeln!(writer, "{} quarantined file(s)", self.total)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record() -> RelocationRecord {
        RelocationRecord {
            quarantine_path: PathBuf::from("/g/trash/cat.jpg"),
            original_path: PathBuf::from("/g/cat.jpg"),
            relocated_at: 0.0,
        }
    }

    #[test]
    fn test_json_output() {
        let output = LedgerOutput::new(&[record()]);
        let mut buf = Vec::new();
        output.write_to(&mut buf, true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["quarantined"][0]["original_path"], "/g/cat.jpg");
        assert_eq!(
            value["quarantined"][0]["relocated_at"],
            "1970-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_text_output() {
        let mut buf = Vec::new();
        LedgerOutput::new(&[record()]).write_to(&mut buf, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("/g/trash/cat.jpg"));
        assert!(text.contains("<- /g/cat.jpg"));
        assert!(text.ends_with("1 quarantined file(s)\n"));
    }

    #[test]
    fn test_empty_text_output() {
        let mut buf = Vec::new();
        LedgerOutput::new(&[]).write_to(&mut buf, false).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Quarantine is empty.\n");
    }
}
