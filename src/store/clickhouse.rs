use crate::core::config::ClickHouseSinkConfig;
use crate::core::{AggregateSink, MarketplaceAggregate};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, info};

/// Appends aggregate rows to a ClickHouse table over the HTTP interface.
pub struct ClickHouseSink {
    url: String,
    database: String,
    table: String,
    user: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl ClickHouseSink {
    pub fn new(config: &ClickHouseSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("chainvol/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            table: config.table.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            client,
        })
    }

    /// Connects and pings the server so a bad DSN fails before any work.
    pub async fn connect(config: &ClickHouseSinkConfig) -> Result<Self> {
        let sink = Self::new(config)?;
        sink.ping().await?;
        Ok(sink)
    }

    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to ping ClickHouse at {}", self.url))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to ping ClickHouse at {}: HTTP {}",
                self.url,
                response.status()
            ));
        }
        debug!("ClickHouse ping OK");
        Ok(())
    }

    fn insert_query(&self) -> String {
        format!(
            "INSERT INTO {}.{} (date, project_id, num_transactions, total_volume_usd) FORMAT JSONEachRow",
            self.database, self.table
        )
    }

    fn encode_rows(rows: &[MarketplaceAggregate]) -> Result<String> {
        let mut body = String::new();
        for row in rows {
            body.push_str(&serde_json::to_string(row)?);
            body.push('\n');
        }
        Ok(body)
    }
}

#[async_trait]
impl AggregateSink for ClickHouseSink {
    async fn write_batch(&self, rows: &[MarketplaceAggregate]) -> Result<()> {
        if rows.is_empty() {
            debug!("No rows to write");
            return Ok(());
        }

        let url = reqwest::Url::parse_with_params(
            &format!("{}/", self.url),
            &[("query", self.insert_query())],
        )
        .with_context(|| format!("Invalid ClickHouse URL: {}", self.url))?;
        let mut request = self.client.post(url).body(Self::encode_rows(rows)?);
        if let Some(user) = &self.user {
            request = request.header("X-ClickHouse-User", user);
        }
        if let Some(password) = &self.password {
            request = request.header("X-ClickHouse-Key", password);
        }

        let response = request
            .send()
            .await
            .context("Failed to execute insert statement")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Failed to execute insert statement: HTTP {}: {}",
                status,
                text.trim()
            ));
        }

        info!(rows = rows.len(), table = %self.table, "Inserted aggregates into ClickHouse");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> ClickHouseSinkConfig {
        ClickHouseSinkConfig {
            url: url.to_string(),
            database: "analytics".to_string(),
            table: "marketplace_data".to_string(),
            user: Some("loader".to_string()),
            password: None,
        }
    }

    fn rows() -> Vec<MarketplaceAggregate> {
        vec![
            MarketplaceAggregate {
                day: "2024-04-01".to_string(),
                project_id: "P1".to_string(),
                transaction_count: 2,
                total_volume_usd: 7500.0,
            },
            MarketplaceAggregate {
                day: "2024-04-02".to_string(),
                project_id: "P2".to_string(),
                transaction_count: 1,
                total_volume_usd: 30000.5,
            },
        ]
    }

    #[tokio::test]
    async fn test_write_batch_posts_json_each_row() {
        let mock_server = MockServer::start().await;
        let expected_body = concat!(
            r#"{"date":"2024-04-01","project_id":"P1","num_transactions":2,"total_volume_usd":7500.0}"#,
            "\n",
            r#"{"date":"2024-04-02","project_id":"P2","num_transactions":1,"total_volume_usd":30000.5}"#,
            "\n"
        );

        Mock::given(method("POST"))
            .and(path("/"))
            .and(query_param(
                "query",
                "INSERT INTO analytics.marketplace_data (date, project_id, num_transactions, total_volume_usd) FORMAT JSONEachRow",
            ))
            .and(header("X-ClickHouse-User", "loader"))
            .and(body_string(expected_body))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sink = ClickHouseSink::new(&config(&mock_server.uri())).unwrap();
        sink.write_batch(&rows()).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_batch_surfaces_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string("Code: 60. Table does not exist"),
            )
            .mount(&mock_server)
            .await;

        let sink = ClickHouseSink::new(&config(&mock_server.uri())).unwrap();
        let err = sink.write_batch(&rows()).await.unwrap_err();
        assert!(err.to_string().contains("Table does not exist"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let sink = ClickHouseSink::new(&config(&mock_server.uri())).unwrap();
        sink.write_batch(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_pings_server() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Ok.\n"))
            .expect(1)
            .mount(&mock_server)
            .await;

        ClickHouseSink::connect(&config(&mock_server.uri()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_fails_fast() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let result = ClickHouseSink::connect(&config(&mock_server.uri())).await;
        assert!(result.is_err());
    }
}
