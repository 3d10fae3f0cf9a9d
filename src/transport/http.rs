//! Streaming POST over reqwest.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

use super::{StreamingResponse, TransportError};

const JSON: &str = "application/json";
const EVENT_STREAM: &str = "text/event-stream";

/// A JSON body posted to an SSE endpoint.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Path relative to the transport's base URL.
    pub path: String,
    /// Extra headers (credentials, caller headers).
    pub headers: HashMap<String, String>,
    /// Serialized JSON body.
    pub body: Bytes,
}

impl StreamRequest {
    /// Creates a request posting `body` to `path`.
    pub fn new(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header, replacing any earlier value.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Opens SSE response streams.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Posts the request and returns once the response head is in.
    async fn open_stream(&self, request: StreamRequest)
        -> Result<StreamingResponse, TransportError>;
}

/// [`HttpTransport`] backed by a pooled reqwest client.
///
/// Only connection setup is time-limited. Once the head arrives the body is
/// read for as long as the upstream keeps it open.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    connect_timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport for `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| TransportError::Connect {
                message: format!("HTTP client setup failed: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            connect_timeout,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Without a total timeout, a timed-out send can only be the connect.
    fn send_error(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::ConnectTimeout {
                timeout: self.connect_timeout,
            }
        } else if err.is_connect() {
            TransportError::Connect {
                message: err.to_string(),
            }
        } else {
            TransportError::Request {
                message: err.to_string(),
            }
        }
    }
}

fn body_error(err: reqwest::Error) -> TransportError {
    TransportError::BodyRead {
        message: err.to_string(),
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip_all, fields(path = %request.path, body_len = request.body.len()))]
    async fn open_stream(
        &self,
        request: StreamRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let mut builder = self
            .client
            .post(self.url_for(&request.path))
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, EVENT_STREAM);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| self.send_error(&e))?;

        let status = response.status().as_u16();
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
        tracing::debug!(status, "Response head received");

        Ok(StreamingResponse {
            status,
            headers,
            stream: Box::pin(response.bytes_stream().map(|read| read.map_err(body_error))),
        })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
