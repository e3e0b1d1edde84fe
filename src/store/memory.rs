use crate::core::{AggregateSink, MarketplaceAggregate};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory sink that keeps every written batch.
#[derive(Clone, Default)]
pub struct MemorySink {
    batches: Arc<Mutex<Vec<Vec<MarketplaceAggregate>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn batches(&self) -> Vec<Vec<MarketplaceAggregate>> {
        self.batches.lock().await.clone()
    }

    /// All rows written so far, across batches.
    pub async fn rows(&self) -> Vec<MarketplaceAggregate> {
        self.batches.lock().await.concat()
    }
}

#[async_trait]
impl AggregateSink for MemorySink {
    async fn write_batch(&self, rows: &[MarketplaceAggregate]) -> Result<()> {
        let mut batches = self.batches.lock().await;
        debug!(rows = rows.len(), "Memory sink PUT");
        batches.push(rows.to_vec());
        Ok(())
    }
}
