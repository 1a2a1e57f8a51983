//! Agent API HTTP client.

use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;

use tether_protocol::{RunError, RunId, RunSnapshot};

use crate::error::{ClientError, ClientResult};
use crate::transport::SseTransport;

/// Timeout for unary (non-streaming) calls. Run streams are unbounded and
/// carry no timeout at all.
const UNARY_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the agent run API.
///
/// Cheap to clone behind an `Arc`; all runs of all conversations share its
/// connection pool.
#[derive(Debug, Clone)]
pub struct RunClient {
    /// HTTP client.
    http: reqwest::Client,
    /// Base URL of the agent API (e.g. "http://localhost:8333/api/v1").
    base_url: String,
}

impl RunClient {
    /// Create a new client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self::with_client(http, base_url)
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The streaming transport for `POST {base}/runs`.
    pub fn transport(&self) -> SseTransport {
        SseTransport::new(self.http.clone(), format!("{}/runs", self.base_url))
    }

    /// Best-effort remote cancellation of a run. Idempotent on the server
    /// side; repeated calls after completion are a no-op there.
    pub async fn cancel_run(&self, run_id: &RunId) -> ClientResult<()> {
        let url = format!("{}/runs/{}/cancel", self.base_url, run_id);
        debug!("requesting remote cancel for run {run_id}");

        let response = self
            .http
            .post(&url)
            .timeout(UNARY_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(api_error(status, response).await)
        }
    }

    /// One-shot read of a run's current state.
    pub async fn read_run(&self, run_id: &RunId) -> ClientResult<RunSnapshot> {
        let url = format!("{}/runs/{}", self.base_url, run_id);
        let response = self.http.get(&url).timeout(UNARY_TIMEOUT).send().await?;

        self.handle_response(response).await
    }

    /// Parse a unary response as JSON or map it to an API error.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ClientError::Parse(e.to_string()))
        } else {
            Err(api_error(status, response).await)
        }
    }
}

async fn api_error(status: reqwest::StatusCode, response: reqwest::Response) -> ClientError {
    let body = response.text().await.unwrap_or_default();

    // Error bodies carry a {code, message} record when the server produced
    // the failure itself; anything else is reported under the HTTP status.
    match serde_json::from_str::<RunError>(&body) {
        Ok(error) => ClientError::Api {
            code: error.code,
            message: error.message,
        },
        Err(_) => ClientError::Api {
            code: status.as_u16().to_string(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        },
    }
}
