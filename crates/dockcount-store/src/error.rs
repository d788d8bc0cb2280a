use dockcount_core::status::UnknownStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("quantity delta must be at least 1, got {0}")]
    InvalidQuantity(i64),

    #[error("adding {delta} to code {code} would overflow its counted quantity")]
    QuantityOverflow { code: String, delta: i64 },

    #[error("stored timestamp or date {0:?} could not be parsed")]
    InvalidDate(String),

    #[error("stored line has {0}")]
    InvalidStatus(#[from] UnknownStatus),
}
