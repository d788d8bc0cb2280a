//! Durable store seam for conferences.
//!
//! Each method is its own transaction. Nothing spans an in-memory update and
//! its durable mirror; see [`Session::submit_count`](crate::Session::submit_count).

use crate::model::{
    ConferenceFilter, ConferenceHeader, ConferenceId, ConferenceIdentity, CountLine,
    PersistedLine,
};

pub trait ConferenceGateway {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return the most recent conference with exactly this identity (a
    /// `None` field matches only `None`), creating one if there is none.
    fn get_or_create_live_conference(
        &mut self,
        identity: &ConferenceIdentity,
        source_file: Option<&str>,
    ) -> Result<ConferenceId, Self::Error>;

    /// All lines of a conference; empty when it has none.
    fn load_persisted_lines(
        &mut self,
        conference_id: ConferenceId,
    ) -> Result<Vec<PersistedLine>, Self::Error>;

    /// Add `qty_delta` to the `(conference_id, normalized_code)` line,
    /// inserting it if absent. `expected_qty` from the caller replaces the
    /// stored value; difference and status are recomputed.
    fn upsert_add_count(
        &mut self,
        conference_id: ConferenceId,
        normalized_code: &str,
        description: &str,
        expected_qty: i64,
        qty_delta: i64,
    ) -> Result<(), Self::Error>;

    /// Write a brand-new conference holding `lines`. Never reuses an id.
    fn insert_snapshot(
        &mut self,
        identity: &ConferenceIdentity,
        source_file: Option<&str>,
        lines: &[CountLine],
    ) -> Result<ConferenceId, Self::Error>;

    /// Conference headers matching `filter`, newest first.
    fn list_conferences(
        &mut self,
        filter: &ConferenceFilter,
    ) -> Result<Vec<ConferenceHeader>, Self::Error>;

    /// Lines of one conference sorted by description.
    fn fetch_lines(
        &mut self,
        conference_id: ConferenceId,
    ) -> Result<Vec<PersistedLine>, Self::Error>;
}
