//! Error kinds surfaced by the batch pipeline.
//!
//! Every variant is fatal to the current batch run. Collaborators (HTTP
//! provider, reference table, sinks) report `anyhow::Error`s which get wrapped
//! into the matching variant at the core boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input header is missing an expected column or carries an unknown one.
    #[error("schema error: {0}")]
    Schema(String),

    /// A data row could not be turned into a transaction.
    #[error("parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[source] regex::Error),

    /// Extraction or aggregation found nothing to work with.
    #[error("{0}")]
    EmptyInput(String),

    #[error("failed to load symbol lookup table: {0:#}")]
    LookupTable(#[source] anyhow::Error),

    #[error("failed to get price for {symbol}: {source:#}")]
    PriceLookup {
        symbol: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("aggregation error: {0}")]
    Aggregation(String),

    #[error("failed to write aggregates: {0:#}")]
    Sink(#[source] anyhow::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl PipelineError {
    pub(crate) fn parse(row: usize, message: impl Into<String>) -> Self {
        PipelineError::Parse {
            row,
            message: message.into(),
        }
    }

    pub(crate) fn price_lookup(symbol: &str, source: anyhow::Error) -> Self {
        PipelineError::PriceLookup {
            symbol: symbol.to_string(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(_: tokio::task::JoinError) -> Self {
        PipelineError::Cancelled
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
