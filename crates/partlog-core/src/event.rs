//! Part lifecycle event records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The structural transition a [`PartLogElement`] describes
///
/// Codes are stable: they are what ends up in the `event_type` column and
/// must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PartEventType {
    /// A part was written by an insert
    NewPart = 1,
    /// Several parts were merged into one
    MergeParts = 2,
    /// A part was fetched from a replica
    DownloadPart = 3,
    /// A part was removed from the working set
    RemovePart = 4,
    /// A part was rewritten by a mutation
    MutatePart = 5,
    /// A part was moved to another disk or volume
    MovePart = 6,
}

impl PartEventType {
    /// All event types in code order
    pub const ALL: [PartEventType; 6] = [
        Self::NewPart,
        Self::MergeParts,
        Self::DownloadPart,
        Self::RemovePart,
        Self::MutatePart,
        Self::MovePart,
    ];

    /// Stable numeric code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Name as it appears in the destination table
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewPart => "NEW_PART",
            Self::MergeParts => "MERGE_PARTS",
            Self::DownloadPart => "DOWNLOAD_PART",
            Self::RemovePart => "REMOVE_PART",
            Self::MutatePart => "MUTATE_PART",
            Self::MovePart => "MOVE_PART",
        }
    }
}

impl fmt::Display for PartEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for PartEventType {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or(CoreError::UnknownEventCode(code))
    }
}

impl FromStr for PartEventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownEventName(s.to_string()))
    }
}

/// Error attached to a part operation that did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartLogError {
    /// Engine error code
    pub code: i32,
    /// Human-readable message
    pub message: String,
}

impl PartLogError {
    /// Create a new error description
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for PartLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code: {}. {}", self.code, self.message)
    }
}

/// One part lifecycle transition
///
/// Records are built with the constructors and `with_*` methods below and
/// then handed to the flush engine by value. Once emitted a record is never
/// touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartLogElement {
    pub event_type: PartEventType,
    /// Wall-clock time the record was created
    pub event_time: DateTime<Utc>,
    /// Time spent on the operation, 0 for instantaneous events
    pub duration_ms: u64,
    pub database: String,
    pub table: String,
    pub part_name: String,
    pub partition_id: String,
    pub path_on_disk: String,
    pub rows: u64,
    pub bytes_on_disk: u64,
    pub bytes_uncompressed: u64,
    pub read_rows: u64,
    pub read_bytes: u64,
    /// Source parts, in order, for merges and mutations
    pub merged_from: Vec<String>,
    pub error: Option<PartLogError>,
}

impl PartLogElement {
    /// Create a record stamped with the current time
    pub fn new(
        event_type: PartEventType,
        database: impl Into<String>,
        table: impl Into<String>,
        part_name: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            event_time: Utc::now(),
            duration_ms: 0,
            database: database.into(),
            table: table.into(),
            part_name: part_name.into(),
            partition_id: String::new(),
            path_on_disk: String::new(),
            rows: 0,
            bytes_on_disk: 0,
            bytes_uncompressed: 0,
            read_rows: 0,
            read_bytes: 0,
            merged_from: Vec::new(),
            error: None,
        }
    }

    /// A part written by an insert
    pub fn new_part(
        database: impl Into<String>,
        table: impl Into<String>,
        part_name: impl Into<String>,
    ) -> Self {
        Self::new(PartEventType::NewPart, database, table, part_name)
    }

    /// A part produced by merging `sources`
    pub fn merge_parts(
        database: impl Into<String>,
        table: impl Into<String>,
        part_name: impl Into<String>,
        sources: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(PartEventType::MergeParts, database, table, part_name).with_merged_from(sources)
    }

    pub fn with_event_time(mut self, event_time: DateTime<Utc>) -> Self {
        self.event_time = event_time;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_partition_id(mut self, partition_id: impl Into<String>) -> Self {
        self.partition_id = partition_id.into();
        self
    }

    pub fn with_path_on_disk(mut self, path: impl Into<String>) -> Self {
        self.path_on_disk = path.into();
        self
    }

    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_bytes_on_disk(mut self, bytes: u64) -> Self {
        self.bytes_on_disk = bytes;
        self
    }

    /// Set merge/mutation read statistics
    pub fn with_read_stats(mut self, read_rows: u64, read_bytes: u64, bytes_uncompressed: u64) -> Self {
        self.read_rows = read_rows;
        self.read_bytes = read_bytes;
        self.bytes_uncompressed = bytes_uncompressed;
        self
    }

    pub fn with_merged_from(mut self, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.merged_from = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_error(mut self, error: PartLogError) -> Self {
        self.error = Some(error);
        self
    }

    /// Calendar date of `event_time`
    pub fn event_date(&self) -> NaiveDate {
        self.event_time.date_naive()
    }

    /// Whether the operation succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
