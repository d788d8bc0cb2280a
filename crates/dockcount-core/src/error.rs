use thiserror::Error;

use crate::engine::AppliedCount;

/// Boxed error from a persistence backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The manifest could not be turned into expected items.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("header row not found: no cell contains {marker:?}")]
    HeaderNotFound { marker: String },

    #[error(
        "could not resolve manifest columns (code={code:?}, description={description:?}, quantity={quantity:?})"
    )]
    MissingColumns {
        code: Option<String>,
        description: Option<String>,
        quantity: Option<String>,
    },

    #[error("workbook has no worksheet")]
    EmptyWorkbook,

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A count event rejected before it touched any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountError {
    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(i64),

    #[error("code {0:?} is empty after normalisation")]
    InvalidCode(String),

    #[error("adding {qty} to code {code} would overflow the counted quantity")]
    QuantityOverflow { code: String, qty: i64 },
}

#[derive(Debug, Error)]
#[error("invalid manifest rules: {0}")]
pub struct RulesError(#[from] toml::de::Error);

/// Errors surfaced by a [`Session`](crate::Session).
#[derive(Debug, Error)]
pub enum ConferenceError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Count(#[from] CountError),

    #[error("no manifest loaded")]
    NoManifest,

    #[error("persistence error: {0}")]
    Persistence(#[source] BoxError),

    /// The count is in the working set but its durable mirror failed.
    #[error("count for {} applied in memory but not persisted: {source}", .applied.line.normalized_code)]
    Unsynced {
        applied: Box<AppliedCount>,
        #[source]
        source: BoxError,
    },
}

impl ConferenceError {
    pub(crate) fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ConferenceError::Persistence(Box::new(err))
    }
}
