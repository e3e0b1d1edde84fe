//! Resolves every distinct currency symbol of a batch to a USD unit price.

use crate::core::error::{PipelineError, Result};
use crate::core::fanout::try_join_keyed;
use crate::core::lookup::SymbolLookupSource;
use crate::core::price::{PriceProvider, PriceQuote, canonical_symbol};
use crate::core::transaction::Transaction;
use anyhow::anyhow;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One provider query: canonical symbol, provider token id, and date.
type PriceQuery = (String, String, NaiveDate);

pub struct PriceResolver {
    lookup_source: Arc<dyn SymbolLookupSource>,
    provider: Arc<dyn PriceProvider>,
}

impl PriceResolver {
    pub fn new(
        lookup_source: Arc<dyn SymbolLookupSource>,
        provider: Arc<dyn PriceProvider>,
    ) -> Self {
        Self {
            lookup_source,
            provider,
        }
    }

    /// Builds a quote covering every symbol in `transactions`.
    ///
    /// One provider query is issued per distinct symbol, all of them
    /// concurrently. Any failed query fails the whole resolution.
    pub async fn resolve(
        &self,
        transactions: &[Transaction],
        cancel: &CancellationToken,
    ) -> Result<PriceQuote> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let lookup = self
            .lookup_source
            .load()
            .map_err(PipelineError::LookupTable)?;
        debug!(entries = lookup.len(), "Loaded symbol lookup table");

        let queries = distinct_symbols(transactions)
            .into_iter()
            .map(|(symbol, date)| match lookup.token_id(&symbol) {
                Some(token_id) if !token_id.is_empty() => {
                    Ok((symbol, token_id.to_string(), date))
                }
                _ => Err(PipelineError::price_lookup(
                    &symbol,
                    anyhow!("no provider token id for symbol"),
                )),
            })
            .collect::<Result<Vec<PriceQuery>>>()?;
        info!(symbols = queries.len(), "Resolving USD prices");

        let prices = try_join_keyed(queries, |(symbol, token_id, date): PriceQuery| {
            let provider = Arc::clone(&self.provider);
            let cancel = cancel.clone();
            async move {
                let fetched = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    res = provider.fetch_price(&token_id, date) => res,
                };
                let price = fetched.map_err(|e| PipelineError::price_lookup(&symbol, e))?;
                if !price.is_finite() || price <= 0.0 {
                    return Err(PipelineError::price_lookup(
                        &symbol,
                        anyhow!("invalid USD price {price} for {token_id} on {date}"),
                    ));
                }
                debug!(%symbol, %token_id, %date, price, "Resolved price");
                Ok::<_, PipelineError>(price)
            }
        })
        .await?;

        Ok(prices
            .into_iter()
            .map(|((symbol, _, _), price)| (symbol, price))
            .collect())
    }
}

/// Distinct canonical symbols paired with the date of their first occurrence.
pub fn distinct_symbols(transactions: &[Transaction]) -> Vec<(String, NaiveDate)> {
    let mut seen = HashSet::new();
    transactions
        .iter()
        .filter_map(|txn| {
            let symbol = canonical_symbol(&txn.currency_symbol);
            seen.insert(symbol.clone()).then(|| (symbol, txn.day()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lookup::SymbolIdLookup;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockProvider {
        calls: Mutex<Vec<(String, NaiveDate)>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl PriceProvider for MockProvider {
        async fn fetch_price(&self, token_id: &str, date: NaiveDate) -> anyhow::Result<f64> {
            self.calls.lock().unwrap().push((token_id.to_string(), date));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match token_id {
                "ethereum" => Ok(1500.0),
                "bitcoin" => Ok(60000.0),
                "worthless" => Ok(0.0),
                _ => Err(anyhow!("request failed with status: 404 Not Found")),
            }
        }
    }

    struct FailingSource;

    impl SymbolLookupSource for FailingSource {
        fn load(&self) -> anyhow::Result<SymbolIdLookup> {
            Err(anyhow!("reference table unavailable"))
        }
    }

    fn lookup() -> Arc<SymbolIdLookup> {
        Arc::new(SymbolIdLookup::from_pairs([
            ("ethereum", "eth"),
            ("bitcoin", "btc"),
            ("worthless", "zero"),
            ("delisted", "gone"),
        ]))
    }

    fn txn(day: u32, symbol: &str) -> Transaction {
        Transaction {
            date: NaiveDate::from_ymd_opt(2024, 4, day)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            project_id: "project_1".to_string(),
            currency_symbol: symbol.to_string(),
            amount: dec!(1).into(),
        }
    }

    #[tokio::test]
    async fn test_one_query_per_distinct_symbol() {
        let provider = Arc::new(MockProvider::default());
        let resolver = PriceResolver::new(lookup(), provider.clone());
        let transactions = vec![
            txn(1, "ETH"),
            txn(1, "BTC"),
            txn(2, "ETH"),
            txn(3, "eth"),
            txn(4, "BTC"),
        ];

        let quote = resolver
            .resolve(&transactions, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(quote.len(), 2);
        assert_eq!(quote.get("ETH"), Some(1500.0));
        assert_eq!(quote.get("btc"), Some(60000.0));
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let first_eth = ("ethereum".to_string(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert!(calls.contains(&first_eth));
    }

    #[tokio::test]
    async fn test_unmapped_symbol_fails_without_query() {
        let provider = Arc::new(MockProvider::default());
        let resolver = PriceResolver::new(lookup(), provider.clone());

        let err = resolver
            .resolve(&[txn(1, "ETH"), txn(1, "SFL")], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::PriceLookup { ref symbol, .. } if symbol == "SFL"));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_fails_resolution() {
        let resolver = PriceResolver::new(lookup(), Arc::new(MockProvider::default()));

        let err = resolver
            .resolve(&[txn(1, "ETH"), txn(1, "GONE")], &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            PipelineError::PriceLookup { symbol, source } => {
                assert_eq!(symbol, "GONE");
                assert!(source.to_string().contains("request failed with status"));
            }
            other => panic!("expected price lookup error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_price_is_rejected() {
        let resolver = PriceResolver::new(lookup(), Arc::new(MockProvider::default()));

        let err = resolver
            .resolve(&[txn(1, "ZERO")], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PriceLookup { ref symbol, .. } if symbol == "ZERO"));
    }

    #[tokio::test]
    async fn test_lookup_load_failure() {
        let resolver =
            PriceResolver::new(Arc::new(FailingSource), Arc::new(MockProvider::default()));

        let err = resolver
            .resolve(&[txn(1, "ETH")], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::LookupTable(_)));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_queries() {
        let provider = Arc::new(MockProvider {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        let resolver = PriceResolver::new(lookup(), provider);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let transactions = [txn(1, "ETH"), txn(1, "BTC")];
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            resolver.resolve(&transactions, &cancel),
        )
        .await
        .expect("resolution should stop promptly");
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[test]
    fn test_distinct_symbols_keeps_first_occurrence() {
        let symbols = distinct_symbols(&[txn(3, "eth"), txn(1, "ETH"), txn(2, "BTC")]);
        assert_eq!(
            symbols,
            vec![
                ("ETH".to_string(), NaiveDate::from_ymd_opt(2024, 4, 3).unwrap()),
                ("BTC".to_string(), NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()),
            ]
        );
    }
}
