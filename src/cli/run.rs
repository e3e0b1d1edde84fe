use super::ui;
use crate::core::config::AppConfig;
use crate::core::{AggregateSink, MarketplaceAggregate};
use crate::pipeline::PriceResolver;
use crate::providers::{CoinGeckoProvider, CsvSymbolTable};
use crate::store::ClickHouseSink;
use crate::{run_pipeline, source};
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs one batch described by `config` and prints the resulting volumes.
pub async fn run(
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<Vec<MarketplaceAggregate>> {
    info!("Processing batch {}", config.input.location);

    let lookup = Arc::new(CsvSymbolTable::new(
        &config.reference_table.path,
        config.reference_table.has_headers,
    ));
    let gecko = &config.providers.coingecko;
    let provider = Arc::new(
        CoinGeckoProvider::new(&gecko.base_url)?
            .with_api_key(gecko.api_key.clone())
            .with_retries(gecko.retries),
    );
    let resolver = PriceResolver::new(lookup, provider);

    let sink = match &config.sink.clickhouse {
        Some(clickhouse) => Some(ClickHouseSink::connect(clickhouse).await?),
        None => {
            warn!("No sink configured, aggregates will only be displayed");
            None
        }
    };

    let input = source::read_input(&config.input.location).await?;

    let pb = ui::new_spinner("Aggregating transactions...");
    let result = run_pipeline(
        &input,
        &resolver,
        sink.as_ref().map(|s| s as &dyn AggregateSink),
        cancel,
    )
    .await;
    pb.finish_and_clear();

    let aggregates = result?;
    println!("{}", display_as_table(&aggregates));
    Ok(aggregates)
}

/// Renders aggregates sorted by day then project, with a total line.
pub fn display_as_table(aggregates: &[MarketplaceAggregate]) -> String {
    let mut rows: Vec<&MarketplaceAggregate> = aggregates.iter().collect();
    rows.sort_by(|a, b| (&a.day, &a.project_id).cmp(&(&b.day, &b.project_id)));

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Project"),
        ui::header_cell("Transactions"),
        ui::header_cell("Volume (USD)"),
    ]);

    for row in &rows {
        table.add_row(vec![
            comfy_table::Cell::new(&row.day),
            comfy_table::Cell::new(&row.project_id),
            ui::number_cell(row.transaction_count.to_string()),
            ui::number_cell(format!("{:.2}", row.total_volume_usd)),
        ]);
    }

    let total_count: u64 = rows.iter().map(|r| r.transaction_count).sum();
    let total_volume: f64 = rows.iter().map(|r| r.total_volume_usd).sum();

    format!(
        "{}\n\n{}\n\n{} {}",
        ui::style_text("Marketplace volume", ui::StyleType::Title),
        table,
        ui::style_text(
            &format!("Total ({total_count} transactions):"),
            ui::StyleType::TotalLabel
        ),
        ui::style_text(&format!("{total_volume:.2} USD"), ui::StyleType::TotalValue),
    )
}
