//! OpenAI-compatible chat completions upstream.

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use super::{ChunkStream, UpstreamModel, UpstreamRequest};
use crate::config::UpstreamConfig;
use crate::errors::{ApiErrorResponse, PlanStreamError, PlanStreamResult};
use crate::transport::{
    ChatChunkStream, HttpTransport, ReqwestTransport, StreamRequest, StreamingResponse,
};
use crate::types::chat::ChatRequest;
use crate::types::chunk::UpstreamChunk;

const COMPLETIONS_PATH: &str = "chat/completions";

/// Error bodies longer than this are cut before parsing.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Streams completions from `POST {base_url}/chat/completions`.
pub struct OpenAiUpstream {
    config: UpstreamConfig,
    transport: Arc<dyn HttpTransport>,
}

impl OpenAiUpstream {
    /// Creates an upstream over the default reqwest transport.
    pub fn new(config: UpstreamConfig) -> PlanStreamResult<Self> {
        let transport = ReqwestTransport::new(config.base_url.clone(), config.timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates an upstream over a caller-supplied transport.
    pub fn with_transport(config: UpstreamConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Caller headers are applied after the bearer token and may replace it.
    fn build_request(&self, request: UpstreamRequest) -> PlanStreamResult<StreamRequest> {
        let body = ChatRequest::streaming(self.config.model.clone(), request.messages, request.tools);
        body.validate()?;

        let bearer = format!("Bearer {}", self.config.api_key().expose_secret());
        let request = self
            .config
            .custom_headers
            .iter()
            .fold(
                StreamRequest::new(COMPLETIONS_PATH, serde_json::to_vec(&body)?)
                    .header("Authorization", bearer),
                |request, (name, value)| request.header(name.clone(), value.clone()),
            );

        Ok(request)
    }
}

#[async_trait]
impl UpstreamModel for OpenAiUpstream {
    #[instrument(skip_all, fields(messages = request.messages.len()))]
    async fn stream(&self, request: UpstreamRequest) -> PlanStreamResult<ChunkStream> {
        tracing::debug!(model = %self.config.model, "Opening completion stream");
        let stream_request = self.build_request(request)?;
        let response = self.transport.open_stream(stream_request).await?;

        if !(200..300).contains(&response.status) {
            let error = error_from_response(response).await;
            tracing::warn!(error = %error, "Upstream rejected completion request");
            return Err(error);
        }

        let chunks = ChatChunkStream::new(response.stream)
            .map(|item| item.map(UpstreamChunk::from));

        Ok(Box::pin(chunks))
    }
}

impl std::fmt::Debug for OpenAiUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiUpstream")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Reads the error body and maps the status to an error variant.
async fn error_from_response(response: StreamingResponse) -> PlanStreamError {
    let StreamingResponse {
        status,
        headers,
        mut stream,
    } = response;

    let mut body = Vec::new();
    while let Some(Ok(bytes)) = stream.next().await {
        body.extend_from_slice(&bytes);
        if body.len() >= MAX_ERROR_BODY {
            body.truncate(MAX_ERROR_BODY);
            break;
        }
    }

    let message = serde_json::from_slice::<ApiErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            let text = String::from_utf8_lossy(&body).trim().to_string();
            if text.is_empty() {
                format!("HTTP {status}")
            } else {
                text
            }
        });

    let header = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    };

    match status {
        401 | 403 => PlanStreamError::Authentication { message },
        429 => PlanStreamError::RateLimit {
            message,
            retry_after: header("retry-after")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        _ => PlanStreamError::Server {
            message,
            status_code: status,
            request_id: header("x-request-id"),
        },
    }
}
