//! Conversation and chat request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tools::Tool;
use crate::errors::PlanStreamError;

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message.
    System,
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

/// A message as stored in a chat session.
///
/// Sessions keep bookkeeping fields next to `role` and `content` (a
/// timestamp, client ids and so on). They are carried here so a stored
/// session round-trips, but never reach the upstream model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Message role.
    pub role: Role,

    /// Message content.
    pub content: String,

    /// When the message was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Any other fields the session layer attached.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl HistoryMessage {
    /// Creates a history entry without timestamp or extra fields.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Creates a user entry.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant entry.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Attaches an extra session field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A message in the shape the upstream model accepts: role and content only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    /// Message role.
    pub role: Role,

    /// Message content.
    pub content: String,
}

impl UpstreamMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&HistoryMessage> for UpstreamMessage {
    fn from(message: &HistoryMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Streaming chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model ID.
    pub model: String,

    /// Messages array.
    pub messages: Vec<UpstreamMessage>,

    /// Tools the model may call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,

    /// Always true; this crate only consumes streamed completions.
    pub stream: bool,
}

impl ChatRequest {
    /// Creates a streaming request.
    pub fn streaming(model: impl Into<String>, messages: Vec<UpstreamMessage>, tools: Vec<Tool>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools,
            stream: true,
        }
    }

    /// Validates the request.
    pub fn validate(&self) -> Result<(), PlanStreamError> {
        if self.model.is_empty() {
            return Err(PlanStreamError::validation_param(
                "Model is required",
                "model",
            ));
        }

        if self.messages.is_empty() {
            return Err(PlanStreamError::validation_param(
                "At least one message is required",
                "messages",
            ));
        }

        for (i, tool) in self.tools.iter().enumerate() {
            if let Err(e) = tool.validate() {
                return Err(PlanStreamError::validation_param(
                    format!("Tool {i}: {e}"),
                    format!("tools[{i}]"),
                ));
            }
        }

        Ok(())
    }
}
