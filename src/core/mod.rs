//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod fanout;
pub mod log;
pub mod lookup;
pub mod price;
pub mod sink;
pub mod transaction;

// Re-export main types for cleaner imports
pub use error::PipelineError;
pub use lookup::{SymbolIdLookup, SymbolLookupSource};
pub use price::{PriceProvider, PriceQuote};
pub use sink::AggregateSink;
pub use transaction::{Amount, MarketplaceAggregate, Transaction};
