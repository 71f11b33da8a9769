//! HTTP transport implementation backed by reqwest.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{Method, Request, Response, StatusCode, Transport};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::trace;

/// HTTP-based transport.
///
/// Query parameters are form-encoded here, so filters may contain any
/// character. The transport never retries.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with the given request timeout.
    pub fn new(timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Creates a transport using the configured timeout.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(config.timeout)
    }

    /// Wraps an existing reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Builds the full, encoded URL of a request.
pub(crate) fn build_url(request: &Request) -> ClientResult<Url> {
    let endpoint = request.endpoint();
    let mut url = Url::parse(&endpoint).map_err(|e| ClientError::InvalidUrl {
        url: endpoint.clone(),
        message: e.to_string(),
    })?;

    if !request.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &request.query {
            match value {
                Some(value) => pairs.append_pair(key, value),
                None => pairs.append_key_only(key),
            };
        }
    }

    Ok(url)
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> ClientResult<Response> {
        let url = build_url(&request)?;
        trace!(method = %request.method, %url, "sending request");

        let mut builder = self.client.request(to_reqwest(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::transport(e.to_string()))?;

        let status = StatusCode::from_u16(response.status().as_u16());
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::transport(format!("failed to read body: {e}")))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
