//! Error taxonomy for the acquisition pipeline.
//!
//! Every kind maps to one recovery decision at its call site:
//! - [`TransportError`]: roll back a day, or try the next transport
//! - [`LookupMiss`] / [`DerivationError`]: skip that symbol
//! - [`AcquisitionFailure`]: abort the run with a single advisory
//! - [`StoreError`]: report for that symbol, keep going

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Dataset;

/// A single fetch attempt did not yield a usable payload.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("response truncated ({len} bytes)")]
    Truncated { len: usize },

    #[error("received markup instead of {expected}")]
    Markup { expected: &'static str },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("marker {0:?} not found in payload")]
    MissingMarker(&'static str),

    #[error("exchange returned its no-data placeholder")]
    Placeholder,

    #[error("payload has no data rows")]
    Empty,

    #[error("feed holds no records for {0}")]
    StaleFeed(NaiveDate),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Request(format!("timed out: {e}"))
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// No candidate day inside the lookback window had both datasets.
#[derive(Debug, Error)]
#[error("no trading session with both datasets between {earliest} and {start} ({attempts} days tried)")]
pub struct AcquisitionFailure {
    pub start: NaiveDate,
    pub earliest: NaiveDate,
    pub attempts: u32,
}

/// Checked arithmetic on extracted figures overflowed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("arithmetic overflow computing {0}")]
pub struct DerivationError(pub &'static str);

/// The session is valid but a symbol's figures could not be resolved.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupMiss {
    #[error("no {dataset} rows match {symbol:?}")]
    SymbolNotFound { symbol: String, dataset: Dataset },

    #[error("no {row} row for {symbol:?}")]
    RowMissing { symbol: String, row: &'static str },

    #[error("column {0:?} resolves neither by header nor by position")]
    Column(&'static str),

    #[error("column {column:?} holds non-numeric value {value:?}")]
    NotNumeric { column: &'static str, value: String },

    #[error(transparent)]
    Derivation(#[from] DerivationError),
}

/// Reading or rewriting the history file failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("history file flush failed: {0}")]
    Flush(String),
}
