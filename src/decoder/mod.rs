//! Chunk classification.
//!
//! Turns each upstream chunk into zero or more [`ChunkEvent`]s. Tool
//! fragments win over text: a chunk that carries a fragment list is treated
//! as tool output even if it also has content.

use serde::{Deserialize, Serialize};

use crate::types::chunk::UpstreamChunk;

/// A normalized event forwarded to the live consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum ChunkEvent {
    /// Plain assistant text.
    #[serde(rename = "text")]
    Text(String),
    /// A piece of the tool call's argument JSON.
    #[serde(rename = "tool_chunk")]
    ToolFragment(String),
}

impl ChunkEvent {
    /// The event's text payload.
    pub fn content(&self) -> &str {
        match self {
            ChunkEvent::Text(content) | ChunkEvent::ToolFragment(content) => content,
        }
    }

    /// Returns true for tool fragments.
    pub fn is_tool_fragment(&self) -> bool {
        matches!(self, ChunkEvent::ToolFragment(_))
    }
}

/// Stateless chunk classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkDecoder;

impl ChunkDecoder {
    /// Creates a decoder.
    pub fn new() -> Self {
        Self
    }

    /// Classifies one chunk.
    ///
    /// Fragments without argument text and empty content produce nothing.
    /// Missing fields are never an error.
    pub fn classify(&self, chunk: &UpstreamChunk) -> Vec<ChunkEvent> {
        match (&chunk.tool_fragments, &chunk.content) {
            (Some(fragments), _) if !fragments.is_empty() => fragments
                .iter()
                .filter_map(|fragment| fragment.arguments.as_deref())
                .filter(|arguments| !arguments.is_empty())
                .map(|arguments| ChunkEvent::ToolFragment(arguments.to_string()))
                .collect(),
            (_, Some(content)) if !content.is_empty() => vec![ChunkEvent::Text(content.clone())],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::chunk::ToolFragment;

    #[test]
    fn test_text_chunk() {
        let events = ChunkDecoder::new().classify(&UpstreamChunk::text("Hello"));
        assert_eq!(events, vec![ChunkEvent::Text("Hello".to_string())]);
    }

    #[test]
    fn test_fragments_take_precedence() {
        let chunk = UpstreamChunk {
            content: Some("ignored".to_string()),
            tool_fragments: Some(vec![ToolFragment::arguments("{\"a\":")]),
        };

        let events = ChunkDecoder::new().classify(&chunk);
        assert_eq!(events, vec![ChunkEvent::ToolFragment("{\"a\":".to_string())]);
    }

    #[test]
    fn test_fragments_without_arguments_emit_nothing() {
        let chunk = UpstreamChunk {
            content: Some("also ignored".to_string()),
            tool_fragments: Some(vec![ToolFragment::default(), ToolFragment::arguments("")]),
        };

        assert!(ChunkDecoder::new().classify(&chunk).is_empty());
    }

    #[test]
    fn test_empty_fragment_list_falls_back_to_text() {
        let chunk = UpstreamChunk {
            content: Some("hi".to_string()),
            tool_fragments: Some(vec![]),
        };

        assert_eq!(
            ChunkDecoder::new().classify(&chunk),
            vec![ChunkEvent::Text("hi".to_string())]
        );
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&ChunkEvent::ToolFragment("{".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"tool_chunk","content":"{"}"#);
    }
}
