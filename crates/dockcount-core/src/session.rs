//! One counting session: a manifest, its working set, and the gateway the
//! working set mirrors into.
//!
//! Writes are optimistic. A count lands in memory first and is then mirrored
//! with [`ConferenceGateway::upsert_add_count`]. If the mirror fails the
//! count stays in memory and the caller gets [`ConferenceError::Unsynced`];
//! memory and store then disagree until [`Session::resync`] or a fresh
//! upload re-initializes from the store. Counting is never blocked by the
//! store being down.

use std::io::Read;

use tracing::{info, warn};

use crate::engine::{AppliedCount, ReconciliationEngine};
use crate::error::ConferenceError;
use crate::gateway::ConferenceGateway;
use crate::manifest::{ParsedManifest, read_manifest};
use crate::model::{ConferenceId, ConferenceIdentity, ExpectedItem, TripMetadata};
use crate::rules::ManifestRules;

struct Loaded {
    metadata: TripMetadata,
    items: Vec<ExpectedItem>,
    source_file: Option<String>,
    engine: ReconciliationEngine,
}

pub struct Session<G: ConferenceGateway> {
    gateway: G,
    rules: ManifestRules,
    loaded: Option<Loaded>,
}

impl<G: ConferenceGateway> Session<G> {
    pub fn new(gateway: G, rules: ManifestRules) -> Self {
        Self {
            gateway,
            rules,
            loaded: None,
        }
    }

    /// Parse a manifest workbook and open (or resume) its live conference.
    ///
    /// On any error the previously loaded manifest, if any, stays in place.
    pub fn upload_manifest<R: Read>(
        &mut self,
        reader: R,
        source_file: Option<&str>,
    ) -> Result<&TripMetadata, ConferenceError> {
        let parsed = read_manifest(reader, &self.rules)?;
        self.load_parsed(parsed, source_file)
    }

    /// Like [`upload_manifest`](Self::upload_manifest) for an already-parsed manifest.
    pub fn load_parsed(
        &mut self,
        parsed: ParsedManifest,
        source_file: Option<&str>,
    ) -> Result<&TripMetadata, ConferenceError> {
        let identity = ConferenceIdentity::from_metadata(&parsed.metadata, &self.rules.date_formats);
        let conference_id = self
            .gateway
            .get_or_create_live_conference(&identity, source_file)
            .map_err(ConferenceError::persistence)?;
        let persisted = self
            .gateway
            .load_persisted_lines(conference_id)
            .map_err(ConferenceError::persistence)?;

        let mut engine = ReconciliationEngine::new(identity);
        engine.initialize(&parsed.items, &persisted);
        engine.bind_conference(conference_id);
        info!(
            conference_id,
            items = parsed.items.len(),
            resumed_lines = persisted.len(),
            "manifest loaded"
        );

        let loaded = self.loaded.insert(Loaded {
            metadata: parsed.metadata,
            items: parsed.items,
            source_file: source_file.map(String::from),
            engine,
        });
        Ok(&loaded.metadata)
    }

    /// Apply one confirmed count and mirror it to the live conference.
    pub fn submit_count(&mut self, code: &str, qty: i64) -> Result<AppliedCount, ConferenceError> {
        let loaded = self.loaded.as_mut().ok_or(ConferenceError::NoManifest)?;
        let applied = loaded.engine.apply_count(code, qty)?;
        let Some(conference_id) = loaded.engine.conference_id() else {
            return Err(ConferenceError::NoManifest);
        };

        let line = &applied.line;
        if let Err(err) = self.gateway.upsert_add_count(
            conference_id,
            &line.normalized_code,
            &line.description,
            line.expected_qty,
            qty,
        ) {
            warn!(
                conference_id,
                code = %line.normalized_code,
                qty,
                error = %err,
                "count kept in memory but not persisted"
            );
            return Err(ConferenceError::Unsynced {
                applied: Box::new(applied),
                source: Box::new(err),
            });
        }
        Ok(applied)
    }

    /// Snapshot the working set into a new, immutable conference.
    pub fn finalize(&mut self) -> Result<ConferenceId, ConferenceError> {
        let loaded = self.loaded.as_ref().ok_or(ConferenceError::NoManifest)?;
        let lines = loaded.engine.snapshot();
        let id = self
            .gateway
            .insert_snapshot(
                loaded.engine.identity(),
                loaded.source_file.as_deref(),
                &lines,
            )
            .map_err(ConferenceError::persistence)?;
        info!(conference_id = id, lines = lines.len(), "conference finalized");
        Ok(id)
    }

    /// Re-initialize the working set from the store, which becomes
    /// authoritative. Counts that never reached the store are discarded.
    pub fn resync(&mut self) -> Result<(), ConferenceError> {
        let loaded = self.loaded.as_mut().ok_or(ConferenceError::NoManifest)?;
        let Some(conference_id) = loaded.engine.conference_id() else {
            return Err(ConferenceError::NoManifest);
        };
        let persisted = self
            .gateway
            .load_persisted_lines(conference_id)
            .map_err(ConferenceError::persistence)?;
        loaded.engine.initialize(&loaded.items, &persisted);
        info!(conference_id, "working set resynced from store");
        Ok(())
    }

    pub fn metadata(&self) -> Option<&TripMetadata> {
        self.loaded.as_ref().map(|l| &l.metadata)
    }

    pub fn engine(&self) -> Option<&ReconciliationEngine> {
        self.loaded.as_ref().map(|l| &l.engine)
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn into_gateway(self) -> G {
        self.gateway
    }
}
