//! Error types for the plan stream.
//!
//! Covers configuration, upstream transport and protocol failures, and the
//! mid-stream failures that end a run early. Tool-argument parse failures
//! are not errors; they are reported inside the finalized message.

use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for plan stream operations.
pub type PlanStreamResult<T> = Result<T, PlanStreamError>;

/// Error type for plan stream operations.
#[derive(Debug, Clone, Error)]
pub enum PlanStreamError {
    /// Configuration error (missing API key, bad base URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// Validation error (request or tool arguments do not fit their schema).
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation issue.
        message: String,
        /// The parameter that caused the error.
        param: Option<String>,
    },

    /// Authentication rejected by the upstream model API.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message from the API.
        message: String,
    },

    /// Rate limit reported by the upstream model API.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        /// Error message.
        message: String,
        /// Duration the upstream asked us to wait.
        retry_after: Option<Duration>,
    },

    /// Upstream returned a non-success status.
    #[error("Server error (HTTP {status_code}): {message}")]
    Server {
        /// Error message.
        message: String,
        /// HTTP status code.
        status_code: u16,
        /// Request ID for debugging.
        request_id: Option<String>,
    },

    /// Network/connection error.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// Timeout enforced by the transport.
    #[error("Request timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
    },

    /// The chunk stream broke or produced something that is not a chunk.
    ///
    /// What arrived before the break is kept by the accumulator, not here.
    #[error("Stream error: {message}")]
    Stream {
        /// Error message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl PlanStreamError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        PlanStreamError::Validation {
            message: message.into(),
            param: None,
        }
    }

    /// Creates a validation error with parameter.
    pub fn validation_param(message: impl Into<String>, param: impl Into<String>) -> Self {
        PlanStreamError::Validation {
            message: message.into(),
            param: Some(param.into()),
        }
    }

    /// Creates a stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        PlanStreamError::Stream {
            message: message.into(),
        }
    }

    /// Creates a server error.
    pub fn server(status_code: u16, message: impl Into<String>) -> Self {
        PlanStreamError::Server {
            message: message.into(),
            status_code,
            request_id: None,
        }
    }
}

/// API error response body from an OpenAI-compatible API.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// The error details.
    pub error: ApiErrorDetail,
}

/// Detailed API error information.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorDetail {
    /// The error type.
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    /// The error message.
    pub message: String,
    /// The error code.
    pub code: Option<String>,
}

impl From<TransportError> for PlanStreamError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectTimeout { timeout } => PlanStreamError::Timeout {
                message: format!("could not connect within {timeout:?}"),
            },
            TransportError::Connect { message } | TransportError::Request { message } => {
                PlanStreamError::Network { message }
            }
            TransportError::BodyRead { message } => PlanStreamError::Stream { message },
        }
    }
}

impl From<reqwest::Error> for PlanStreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlanStreamError::Timeout {
                message: err.to_string(),
            }
        } else if err.is_connect() {
            PlanStreamError::Network {
                message: err.to_string(),
            }
        } else {
            PlanStreamError::Server {
                status_code: err.status().map_or(0, |s| s.as_u16()),
                message: err.to_string(),
                request_id: None,
            }
        }
    }
}

impl From<serde_json::Error> for PlanStreamError {
    fn from(err: serde_json::Error) -> Self {
        PlanStreamError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for PlanStreamError {
    fn from(err: url::ParseError) -> Self {
        PlanStreamError::Configuration {
            message: format!("Invalid URL: {err}"),
        }
    }
}
