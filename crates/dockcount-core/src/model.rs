//! Shared record types for manifests, working sets, and persisted conferences.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{Status, classify};

/// Store-assigned conference identifier.
pub type ConferenceId = i64;

/// Description given to counted codes that the manifest does not list.
pub const UNREGISTERED_DESCRIPTION: &str = "UNREGISTERED";

/// Trip labels found in the manifest preamble.
///
/// `trip_date` is the raw label text; see [`TripMetadata::parsed_trip_date`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripMetadata {
    pub trip_id: Option<String>,
    pub store_id: Option<String>,
    pub trip_date: Option<String>,
}

impl TripMetadata {
    /// Parse `trip_date` with the first matching format.
    ///
    /// Unparsable or missing dates yield `None`.
    pub fn parsed_trip_date<S: AsRef<str>>(&self, formats: &[S]) -> Option<NaiveDate> {
        let text = self.trip_date.as_deref()?.trim();
        if text.is_empty() {
            return None;
        }
        formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt.as_ref()).ok())
    }
}

/// Natural key of a live conference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConferenceIdentity {
    pub trip_id: Option<String>,
    pub store_id: Option<String>,
    pub trip_date: Option<NaiveDate>,
}

impl ConferenceIdentity {
    pub fn from_metadata<S: AsRef<str>>(metadata: &TripMetadata, date_formats: &[S]) -> Self {
        Self {
            trip_id: metadata.trip_id.clone(),
            store_id: metadata.store_id.clone(),
            trip_date: metadata.parsed_trip_date(date_formats),
        }
    }
}

/// One cleaned manifest row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedItem {
    /// Code as printed in the manifest, kept for display.
    pub raw_code: String,
    /// Join key for all matching.
    pub normalized_code: String,
    pub description: String,
    pub expected_qty: i64,
}

/// A working-set row: one per distinct normalized code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountLine {
    pub normalized_code: String,
    pub raw_code: String,
    pub description: String,
    pub expected_qty: i64,
    pub counted_qty: i64,
}

impl CountLine {
    pub fn from_expected(item: &ExpectedItem) -> Self {
        Self {
            normalized_code: item.normalized_code.clone(),
            raw_code: item.raw_code.clone(),
            description: item.description.clone(),
            expected_qty: item.expected_qty,
            counted_qty: 0,
        }
    }

    /// A line for a code the manifest does not list.
    pub fn unregistered(normalized_code: String, raw_code: String, counted_qty: i64) -> Self {
        Self {
            normalized_code,
            raw_code,
            description: UNREGISTERED_DESCRIPTION.to_string(),
            expected_qty: 0,
            counted_qty,
        }
    }

    pub fn difference(&self) -> i64 {
        self.counted_qty - self.expected_qty
    }

    pub fn status(&self) -> Status {
        classify(self.expected_qty, self.counted_qty)
    }
}

impl From<&PersistedLine> for CountLine {
    fn from(line: &PersistedLine) -> Self {
        Self {
            normalized_code: line.normalized_code.clone(),
            raw_code: line.normalized_code.clone(),
            description: line.description.clone(),
            expected_qty: line.expected_qty,
            counted_qty: line.counted_qty,
        }
    }
}

/// A stored conference line.
///
/// `difference` and `status` are computed at write time and stored
/// alongside the quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedLine {
    pub conference_id: ConferenceId,
    pub normalized_code: String,
    pub description: String,
    pub expected_qty: i64,
    pub counted_qty: i64,
    pub difference: i64,
    pub status: Status,
}

impl PersistedLine {
    pub fn from_count_line(conference_id: ConferenceId, line: &CountLine) -> Self {
        Self {
            conference_id,
            normalized_code: line.normalized_code.clone(),
            description: line.description.clone(),
            expected_qty: line.expected_qty,
            counted_qty: line.counted_qty,
            difference: line.difference(),
            status: line.status(),
        }
    }
}

/// Conference header as listed by the history surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceHeader {
    pub id: ConferenceId,
    pub trip_id: Option<String>,
    pub store_id: Option<String>,
    pub trip_date: Option<NaiveDate>,
    pub source_file: Option<String>,
    /// Snapshot written by an explicit finalize; never reused as a live record.
    pub finalized: bool,
    pub created_at: DateTime<Utc>,
}

/// History listing filter. `None` fields do not constrain.
///
/// `created_from` and `created_to` bound the calendar day of `created_at`
/// (UTC), both inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConferenceFilter {
    pub store_id: Option<String>,
    pub trip_id: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}
