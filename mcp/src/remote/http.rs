//! HTTP implementation of the remote façade

use super::{ApiRequest, RemoteApi};
use crate::auth::CredentialProvider;
use crate::error::{McpError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Remote API client over HTTPS with bearer authentication
pub struct HttpRemote {
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpRemote {
    /// Create a client with the given per-request timeout
    pub fn new(credentials: Arc<dyn CredentialProvider>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gtools/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| McpError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
        })
    }

    async fn send(&self, request: &ApiRequest) -> Result<Response> {
        let url = build_url(request)?;
        let token = self.credentials.access_token().await?;

        debug!(request = %request, "Calling remote API");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .bearer_auth(token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(McpError::transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

        warn!(request = %request, status = status.as_u16(), message = %message, "Remote API call failed");
        Err(McpError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn call(&self, request: ApiRequest) -> Result<Value> {
        let response = self.send(&request).await?;
        let bytes = response.bytes().await.map_err(McpError::transport)?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn download(&self, request: ApiRequest) -> Result<Vec<u8>> {
        let response = self.send(&request).await?;
        let bytes = response.bytes().await.map_err(McpError::transport)?;
        Ok(bytes.to_vec())
    }
}

/// Full URL of a request; each path segment is percent-encoded
pub fn build_url(request: &ApiRequest) -> Result<Url> {
    let mut url = Url::parse(request.backend.base_url())
        .map_err(|e| McpError::Internal(format!("Invalid base URL: {}", e)))?;

    url.path_segments_mut()
        .map_err(|_| McpError::Internal("Base URL cannot have a path".to_string()))?
        .extend(request.segments.iter().map(String::as_str));

    if !request.query.is_empty() {
        url.query_pairs_mut().extend_pairs(
            request
                .query
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
    }

    Ok(url)
}

/// `error.message` of a Google API error body
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        error => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
