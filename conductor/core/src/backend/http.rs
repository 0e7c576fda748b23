//! HTTP plumbing shared by both backend variants

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, warn};

use super::error::BackendError;
use super::traits::{BackendHealth, BackendSettings};

/// Thin wrapper over `reqwest::Client` bound to one backend address
#[derive(Clone, Debug)]
pub(crate) struct HttpCore {
    pub(crate) settings: BackendSettings,
    client: reqwest::Client,
}

impl HttpCore {
    pub(crate) fn new(settings: BackendSettings) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.probe_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { settings, client }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url(), path)
    }

    /// GET a JSON document; non-200 is an error
    pub(crate) async fn get_json(&self, path: &str, timeout: Duration) -> Result<Value, BackendError> {
        let response = self
            .client
            .get(self.url(path))
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| BackendError::Malformed(e.to_string()))
    }

    /// Status code of a GET, or None when no response arrived
    pub(crate) async fn probe(&self, path: &str) -> Option<u16> {
        match self
            .client
            .get(self.url(path))
            .timeout(self.settings.probe_timeout)
            .send()
            .await
        {
            Ok(response) => Some(response.status().as_u16()),
            Err(e) => {
                error!(url = %self.url(path), error = %e, "Connection test failed");
                None
            }
        }
    }

    /// POST a JSON payload and parse a JSON body from a 200 response
    pub(crate) async fn post_json(
        &self,
        path: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .json(payload)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        debug!(bytes = text.len(), "Response body received");
        serde_json::from_str(&text).map_err(|e| BackendError::Malformed(e.to_string()))
    }

    /// POST a JSON payload and hand back the raw response for streaming.
    ///
    /// Only the wait for response headers is bounded here. The body is read
    /// chunk by chunk with its own idle bound (see `stream::fragments`).
    pub(crate) async fn post_stream(
        &self,
        path: &str,
        payload: &Value,
    ) -> Result<reqwest::Response, BackendError> {
        let request = self.client.post(self.url(path)).json(payload).send();
        let response = tokio::time::timeout(self.settings.generation_timeout, request)
            .await
            .map_err(|_| BackendError::Timeout)??;

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Health snapshot from a models endpoint, using `extract` to list names
    pub(crate) async fn health(&self, path: &str, extract: fn(&Value) -> Vec<String>) -> BackendHealth {
        let start = Instant::now();
        let response = self
            .client
            .get(self.url(path))
            .timeout(self.settings.probe_timeout)
            .send()
            .await;

        match response {
            Ok(response) => {
                let elapsed = start.elapsed();
                let status = response.status().as_u16();
                if status != 200 {
                    return BackendHealth {
                        healthy: false,
                        models: Vec::new(),
                        error: Some(format!("HTTP {status}")),
                        response_time: Some(elapsed),
                    };
                }
                let models = response
                    .json::<Value>()
                    .await
                    .map(|data| extract(&data))
                    .unwrap_or_default();
                BackendHealth {
                    healthy: true,
                    models,
                    error: None,
                    response_time: Some(elapsed),
                }
            }
            Err(e) => BackendHealth {
                healthy: false,
                models: Vec::new(),
                error: Some(e.to_string()),
                response_time: None,
            },
        }
    }
}
