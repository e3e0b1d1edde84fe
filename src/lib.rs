pub mod cli;
pub mod core;
pub mod pipeline;
pub mod providers;
pub mod source;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::{AggregateSink, MarketplaceAggregate, PipelineError};
use crate::pipeline::{Extractor, PriceResolver, aggregate_transactions};
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub enum AppCommand {
    Run,
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    cancel: CancellationToken,
) -> Result<()> {
    info!("chainvol starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Run => cli::run::run(&config, &cancel).await.map(|_| ()),
    }
}

/// Extracts, prices and aggregates one batch, then hands the rows to `sink`.
///
/// Every stage is fatal on error; nothing is written unless all of them
/// succeed.
pub async fn run_pipeline(
    input: &[u8],
    resolver: &PriceResolver,
    sink: Option<&dyn AggregateSink>,
    cancel: &CancellationToken,
) -> Result<Vec<MarketplaceAggregate>, PipelineError> {
    let transactions = Extractor::global()?.extract(input)?;
    let quote = resolver.resolve(&transactions, cancel).await?;
    info!(symbols = quote.len(), "Prices resolved");

    let aggregates = aggregate_transactions(&transactions, &quote)?;

    if let Some(sink) = sink {
        sink.write_batch(&aggregates)
            .await
            .map_err(PipelineError::Sink)?;
    }
    Ok(aggregates)
}
