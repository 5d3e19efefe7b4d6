//! HTTP client for the operator's health endpoints

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use scheduler_lib::{HealthResponse, ReadinessResponse};
use serde::de::DeserializeOwned;
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// GET `path`, accepting 503 as well: probes report failure in the body
    async fn probe<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach the operator")?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.probe("/healthz").await
    }

    pub async fn readiness(&self) -> Result<ReadinessResponse> {
        self.probe("/readyz").await
    }
}
