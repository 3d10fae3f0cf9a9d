//! Upstream chunk types.
//!
//! [`ChatChunk`] is the OpenAI-compatible wire shape of one streamed
//! completion delta. [`UpstreamChunk`] is the normalized form every
//! [`UpstreamModel`](crate::upstream::UpstreamModel) yields and the decoder
//! consumes.

use serde::{Deserialize, Serialize};

use super::tools::ToolCallDelta;

/// Streaming chunk as sent by the upstream API.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatChunk {
    /// Chunk ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Model used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Choice deltas.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// Choice delta in a streaming chunk.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChunkChoice {
    /// Choice index.
    #[serde(default)]
    pub index: u32,

    /// Delta content.
    #[serde(default)]
    pub delta: Delta,

    /// Finish reason (in last chunk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Delta content in streaming.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Delta {
    /// Role (only in first chunk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Content delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A fragment of a tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFragment {
    /// Partial argument text, if this fragment carries any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolFragment {
    /// Creates a fragment carrying argument text.
    pub fn arguments(text: impl Into<String>) -> Self {
        Self {
            arguments: Some(text.into()),
        }
    }
}

/// One chunk of the upstream model's stream.
///
/// Either field may be missing; a chunk with neither is legal and carries
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamChunk {
    /// Plain-text delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool invocation fragments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_fragments: Option<Vec<ToolFragment>>,
}

impl UpstreamChunk {
    /// A chunk carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_fragments: None,
        }
    }

    /// A chunk carrying a single tool-argument fragment.
    pub fn tool(arguments: impl Into<String>) -> Self {
        Self {
            content: None,
            tool_fragments: Some(vec![ToolFragment::arguments(arguments)]),
        }
    }

    /// A chunk carrying nothing, like role-only or finish chunks.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl From<ChatChunk> for UpstreamChunk {
    fn from(chunk: ChatChunk) -> Self {
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Self::empty();
        };

        let tool_fragments = choice.delta.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|call| ToolFragment {
                    arguments: call.function.and_then(|f| f.arguments),
                })
                .collect()
        });

        Self {
            content: choice.delta.content,
            tool_fragments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_chunk() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"id":"c1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#,
        )
        .unwrap();

        assert_eq!(UpstreamChunk::from(chunk), UpstreamChunk::text("Hi"));
    }

    #[test]
    fn test_normalize_tool_chunk() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"manage_plan","arguments":""}}]}}]}"#,
        )
        .unwrap();

        let normalized = UpstreamChunk::from(chunk);

        assert!(normalized.content.is_none());
        assert_eq!(
            normalized.tool_fragments,
            Some(vec![ToolFragment::arguments("")])
        );
    }

    #[test]
    fn test_normalize_without_choices() {
        let chunk: ChatChunk = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(UpstreamChunk::from(chunk), UpstreamChunk::empty());
    }

    #[test]
    fn test_normalize_uses_first_choice_only() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"choices":[{"index":0,"delta":{"content":"a"}},{"index":1,"delta":{"content":"b"}}]}"#,
        )
        .unwrap();

        assert_eq!(UpstreamChunk::from(chunk), UpstreamChunk::text("a"));
    }
}
