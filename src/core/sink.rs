//! Output sink abstraction

use crate::core::transaction::MarketplaceAggregate;
use anyhow::Result;
use async_trait::async_trait;

/// Append-only destination for aggregate rows.
#[async_trait]
pub trait AggregateSink: Send + Sync {
    async fn write_batch(&self, rows: &[MarketplaceAggregate]) -> Result<()>;
}
