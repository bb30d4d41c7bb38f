//! Timestamped record of a run.
//!
//! The engine appends an entry for every write, matched delivery and
//! violation, and for the start and end of the run. Deliveries after the run
//! stopped are not recorded. After (or during) a run, [`Tester::transcript`](crate::Tester::transcript) returns a copy.
//!
//! ## Querying a saved transcript
//!
//! ```bash
//! # What was written, in order
//! jq -r 'select(.kind == "write") | .detail' run.jsonl
//!
//! # Why the run failed
//! jq 'select(.kind == "violation")' run.jsonl
//! ```

pub mod entry;

pub use entry::{EntryKind, TranscriptEntry};

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Ordered list of transcript entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, kind: EntryKind, position: usize, detail: impl Into<String>) {
        self.entries.push(TranscriptEntry::new(kind, position, detail));
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Details of every entry of `kind`, in order
    pub fn details(&self, kind: EntryKind) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.detail.as_str())
            .collect()
    }

    /// Render as JSONL, one entry per line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_json_line()?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse JSONL produced by [`Transcript::to_jsonl`]. Blank lines are skipped.
    pub fn from_jsonl(text: &str) -> Result<Self, serde_json::Error> {
        let entries = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(TranscriptEntry::from_json_line)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Write as JSONL to `path`, replacing any existing file
    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for entry in &self.entries {
            let json = entry
                .to_json_line()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()
    }
}
