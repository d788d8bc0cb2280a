//! Shipment manifest reconciliation: parse the expected quantities, apply
//! count events, classify every line, and hand the result to a store.

pub mod code;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod manifest;
pub mod model;
pub mod report;
pub mod rules;
pub mod session;
pub mod status;

pub use code::normalize;
pub use engine::{AppliedCount, CountOutcome, Progress, ReconciliationEngine};
pub use error::{BoxError, ConferenceError, CountError, ParseError, RulesError};
pub use gateway::ConferenceGateway;
pub use manifest::{Cell, Grid, ParsedManifest, parse_grid, read_manifest};
pub use model::{
    ConferenceFilter, ConferenceHeader, ConferenceId, ConferenceIdentity, CountLine, ExpectedItem,
    PersistedLine, TripMetadata, UNREGISTERED_DESCRIPTION,
};
pub use rules::ManifestRules;
pub use session::Session;
pub use status::{Status, StatusCounts, classify};
