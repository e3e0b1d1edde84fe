//! Extraction, price resolution and aggregation of a transaction batch.

pub mod aggregate;
pub mod extract;
pub mod resolve;

pub use aggregate::aggregate_transactions;
pub use extract::{ExtractPatterns, Extractor};
pub use resolve::PriceResolver;
