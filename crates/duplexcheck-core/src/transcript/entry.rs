//! Transcript entry types.
//!
//! Each entry is a self-contained JSON object, so a transcript can be
//! written as JSONL and filtered with `jq` afterwards.

use serde::{Deserialize, Serialize};

/// What happened at one point of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// The run started
    Started,
    /// A value was written to the stream
    Write,
    /// Output was delivered and matched the script
    Matched,
    /// The run stopped because of a violation
    Violation,
    /// The script ran to completion
    Finished,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// ISO 8601 timestamp (e.g., "2026-01-21T14:30:45.123Z")
    pub ts: String,

    pub kind: EntryKind,

    /// Script position at the time of the entry
    pub position: usize,

    /// Rendered value or message
    pub detail: String,
}

impl TranscriptEntry {
    /// Create a new entry with the current timestamp.
    pub fn new(kind: EntryKind, position: usize, detail: impl Into<String>) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            kind,
            position,
            detail: detail.into(),
        }
    }

    /// Serialize to a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a JSON line.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
