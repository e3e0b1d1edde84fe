use super::util::with_retry;
use crate::core::PriceProvider;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Date layout of the `/history` endpoint.
const GECKO_DATE_FORMAT: &str = "%d-%m-%Y";
const RETRY_DELAY_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct CoinGeckoHistoryResponse {
    market_data: Option<MarketData>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    #[serde(default)]
    current_price: HashMap<String, f64>,
}

/// Historical USD prices from the CoinGecko `/coins/{id}/history` API.
pub struct CoinGeckoProvider {
    base_url: String,
    api_key: Option<String>,
    retries: usize,
    client: reqwest::Client,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("chainvol/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(CoinGeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            retries: 0,
            client,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    fn history_url(&self, token_id: &str, date: NaiveDate) -> String {
        format!(
            "{}/coins/{}/history?date={}&localization=false",
            self.base_url,
            token_id,
            date.format(GECKO_DATE_FORMAT)
        )
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    #[instrument(name = "CoinGeckoPriceFetch", skip(self), fields(token_id = %token_id, date = %date))]
    async fn fetch_price(&self, token_id: &str, date: NaiveDate) -> Result<f64> {
        if token_id.is_empty() {
            return Err(anyhow!("empty token id"));
        }

        let url = self.history_url(token_id, date);
        debug!("Requesting price history from {}", url);

        let response = with_retry(
            || {
                let mut request = self.client.get(&url);
                if let Some(key) = &self.api_key {
                    request = request.header("x-cg-demo-api-key", key);
                }
                request.send()
            },
            self.retries,
            RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Request error for token: {token_id}"))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(anyhow!("request failed with status: {}", response.status()));
        }

        let text = response.text().await?;
        let data: CoinGeckoHistoryResponse = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON response for {token_id}"))?;

        let price = data
            .market_data
            .and_then(|m| m.current_price.get("usd").copied())
            .unwrap_or_default();
        if price == 0.0 {
            return Err(anyhow!("price not found in response"));
        }
        Ok(price)
    }
}
