//! HTTP plumbing: one POST that returns either a JSON document or a byte
//! stream of event-stream frames.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use riverbed_eventstream::FrameSource;
use serde_json::Value;
use tracing::debug;

use crate::error::BedrockError;

/// A fully prepared request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_json(&self, request: &HttpRequest) -> Result<Value, BedrockError>;

    /// Send a request whose response body is an event stream.
    async fn send_stream(&self, request: &HttpRequest) -> Result<FrameSource, BedrockError>;
}

/// [`Transport`] over `reqwest`. Authenticates with a bearer token when one
/// is configured; request signing is left to a proxy or custom transport.
pub struct HttpTransport {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl HttpTransport {
    pub fn new(timeout: Duration, bearer_token: Option<String>) -> Result<Self, BedrockError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bearer_token,
        })
    }

    async fn post(&self, request: &HttpRequest) -> Result<reqwest::Response, BedrockError> {
        debug!(url = %request.url, "POST");
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v["message"]
                    .as_str()
                    .or(v["Message"].as_str())
                    .map(String::from)
            })
            .unwrap_or(body);
        Err(BedrockError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_json(&self, request: &HttpRequest) -> Result<Value, BedrockError> {
        let response = self.post(request).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| BedrockError::InvalidResponse(format!("response is not JSON: {e}")))
    }

    async fn send_stream(&self, request: &HttpRequest) -> Result<FrameSource, BedrockError> {
        let response = self.post(request).await?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(io::Error::other))
            .boxed();
        Ok(FrameSource::Streaming(body))
    }
}
