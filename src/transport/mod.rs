//! HTTP transport layer for the upstream model call.
//!
//! A streaming POST goes out, the response head comes back, and the body is
//! handed over as raw bytes for SSE decoding. Failures are classified by the
//! phase they happen in, because a broken body leaves a partial run behind
//! while a failed connect leaves nothing.

mod http;
mod streaming;

pub use http::{HttpTransport, ReqwestTransport, StreamRequest};
pub use streaming::{ChatChunkStream, SseEvent, SseParser, StreamingResponse};

use std::time::Duration;

/// Transport failure, by the phase it happened in.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// No connection could be established.
    #[error("Connection failed: {message}")]
    Connect {
        /// Error message.
        message: String,
    },

    /// Connection setup did not finish in time.
    #[error("Connection not established within {timeout:?}")]
    ConnectTimeout {
        /// The configured connect timeout.
        timeout: Duration,
    },

    /// Connected, but no response head arrived.
    #[error("Request failed: {message}")]
    Request {
        /// Error message.
        message: String,
    },

    /// The response body broke off while streaming.
    #[error("Response body interrupted: {message}")]
    BodyRead {
        /// Error message.
        message: String,
    },
}
