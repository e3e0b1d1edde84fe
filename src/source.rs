//! Fetches the raw bytes of an input batch.

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Reads a local file, or downloads `http://` and `https://` locations.
pub async fn read_input(location: &str) -> Result<Vec<u8>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        debug!("Downloading input batch from {}", location);
        let response = reqwest::get(location)
            .await
            .with_context(|| format!("Failed to fetch input batch: {location}"))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for input batch: {}",
                response.status(),
                location
            ));
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read input batch body: {location}"))?;
        Ok(bytes.to_vec())
    } else {
        debug!("Reading input batch from {}", location);
        tokio::fs::read(location)
            .await
            .with_context(|| format!("Failed to read input batch: {location}"))
    }
}
