//! InfluxDB 1.x HTTP client and connection driver

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use conflux_common::ConnectionConfig;

use crate::connection::Driver;
use crate::error::ConnectorError;

/// A live connection to one InfluxDB server.
pub struct InfluxClient {
    /// Base URL
    base_url: String,
    /// HTTP client
    http: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

impl InfluxClient {
    /// Build a client from connection parameters. Does not touch the network.
    pub fn new(config: &ConnectionConfig) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url(),
            http,
            username: config.username.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /ping`; InfluxDB answers 204 when it is up
    pub async fn ping(&self) -> Result<(), ConnectorError> {
        let url = format!("{}/ping", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            status => Err(ConnectorError::Connection(format!(
                "InfluxDB ping to {} failed: {}",
                self.base_url, status
            ))),
        }
    }

    /// Run an InfluxQL query through `POST /query` and return the raw body.
    ///
    /// A non-JSON body is an execution error. A JSON body is returned even for
    /// error statuses, since InfluxDB reports query errors inside it.
    pub async fn query(&self, query: &str) -> Result<serde_json::Value, ConnectorError> {
        let url = format!("{}/query", self.base_url);

        let mut form = vec![("q", query)];
        if let Some(ref db) = self.database {
            form.push(("db", db.as_str()));
        }

        let mut request = self.http.post(&url).form(&form);
        if let Some(ref username) = self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(ConnectorError::from)?;

        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(body) if status.is_success() || body.get("error").is_some() => Ok(body),
            Ok(_) | Err(_) => Err(ConnectorError::Execution(format!(
                "InfluxDB returned {}: {}",
                status,
                text.trim()
            ))),
        }
    }
}

/// Opens [`InfluxClient`] connections: build the client, then ping.
pub struct InfluxDriver {
    config: ConnectionConfig,
}

impl InfluxDriver {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl Driver for InfluxDriver {
    type Handle = InfluxClient;

    fn engine(&self) -> &'static str {
        super::ENGINE
    }

    async fn open(&self) -> Result<InfluxClient, ConnectorError> {
        let client = InfluxClient::new(&self.config)?;
        client.ping().await?;
        debug!("InfluxDB reachable at {}", client.base_url());
        Ok(client)
    }

    async fn close(&self, client: InfluxClient) -> Result<(), ConnectorError> {
        // HTTP has no session to tear down; dropping the client frees its pool
        debug!("Closing InfluxDB client for {}", client.base_url());
        drop(client);
        Ok(())
    }
}
