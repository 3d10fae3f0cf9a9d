//! Per-run buffers and the finalized message they turn into.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::decoder::ChunkEvent;
use crate::errors::{PlanStreamError, PlanStreamResult};
use crate::observability::RunStats;
use crate::types::chat::{HistoryMessage, Role};
use crate::types::plan::Plan;

/// Buffers owned by one run.
#[derive(Debug, Default)]
pub struct StreamState {
    text_buffer: String,
    tool_arg_buffer: String,
    stats: RunStats,
}

impl StreamState {
    /// Creates empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text_buffer
    }

    /// Tool arguments accumulated so far.
    pub fn tool_arguments(&self) -> &str {
        &self.tool_arg_buffer
    }

    /// Counters so far.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Notes that a chunk was pulled and what it classified to.
    pub fn record_chunk(&mut self, events: &[ChunkEvent]) {
        self.stats.record_chunk(events);
    }

    /// Appends an event to its buffer.
    pub fn absorb(&mut self, event: &ChunkEvent) {
        match event {
            ChunkEvent::Text(content) => self.text_buffer.push_str(content),
            ChunkEvent::ToolFragment(content) => self.tool_arg_buffer.push_str(content),
        }
        self.stats.record_event(event);
    }

    /// Consumes the buffers into the finalized message.
    pub fn finalize(
        self,
        tool_name: &str,
        completion: Completion,
        elapsed: Duration,
    ) -> FinalizedMessage {
        let tool_call = if self.tool_arg_buffer.is_empty() {
            None
        } else {
            Some(ToolCallRecord::from_raw(tool_name, self.tool_arg_buffer))
        };

        FinalizedMessage {
            role: Role::Assistant,
            text: self.text_buffer,
            tool_call,
            completion,
            stats: RunStats {
                duration: elapsed,
                ..self.stats
            },
        }
    }
}

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completion {
    /// The upstream stream ended normally.
    Complete,
    /// The upstream failed; buffers hold what arrived before the failure.
    Partial {
        /// The failure, rendered.
        error: String,
    },
}

/// Marker for tool arguments that are not a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    /// Parser message.
    pub message: String,
}

/// Result of parsing the accumulated tool arguments.
///
/// Serialized externally tagged (`{"object": {..}}` or
/// `{"failed": {"message": ..}}`) so the outcome never depends on the keys
/// the model put in its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsedArguments {
    /// The arguments parsed to a JSON object.
    Object(Map<String, Value>),
    /// The arguments did not parse to a JSON object.
    Failed(ParseFailure),
}

impl ParsedArguments {
    /// Parses raw argument text. Anything but a JSON object is a failure.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => ParsedArguments::Object(object),
            Ok(other) => ParsedArguments::Failed(ParseFailure {
                message: format!("expected a JSON object, found {}", json_kind(&other)),
            }),
            Err(e) => ParsedArguments::Failed(ParseFailure {
                message: e.to_string(),
            }),
        }
    }

    /// The parsed object, if any.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            ParsedArguments::Object(object) => Some(object),
            ParsedArguments::Failed(_) => None,
        }
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<&ParseFailure> {
        match self {
            ParsedArguments::Object(_) => None,
            ParsedArguments::Failed(failure) => Some(failure),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The reconstructed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name.
    pub name: String,
    /// Exact concatenation of every forwarded fragment.
    pub raw_arguments: String,
    /// Parse result of `raw_arguments`.
    pub parsed: ParsedArguments,
}

impl ToolCallRecord {
    /// Builds the record, parsing the raw arguments.
    pub fn from_raw(name: impl Into<String>, raw_arguments: String) -> Self {
        let parsed = ParsedArguments::parse(&raw_arguments);
        if let Some(failure) = parsed.failure() {
            tracing::warn!(
                raw_len = raw_arguments.len(),
                error = %failure.message,
                "Tool arguments did not parse"
            );
        }

        Self {
            name: name.into(),
            raw_arguments,
            parsed,
        }
    }

    /// Returns true if the arguments parsed to an object.
    pub fn is_parsed(&self) -> bool {
        self.parsed.as_object().is_some()
    }

    /// Reads the arguments as a typed plan.
    pub fn plan(&self) -> PlanStreamResult<Plan> {
        match &self.parsed {
            ParsedArguments::Object(object) => {
                serde_json::from_value(Value::Object(object.clone())).map_err(|e| {
                    PlanStreamError::validation_param(
                        format!("Tool arguments are not a valid plan: {e}"),
                        "arguments",
                    )
                })
            }
            ParsedArguments::Failed(failure) => Err(PlanStreamError::validation_param(
                format!("Tool arguments did not parse: {}", failure.message),
                "arguments",
            )),
        }
    }
}

/// The persistable result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedMessage {
    /// Always [`Role::Assistant`].
    pub role: Role,
    /// Concatenated text.
    pub text: String,
    /// Present iff any tool fragment arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRecord>,
    /// Whether the stream ran to its end.
    pub completion: Completion,
    /// Run counters.
    pub stats: RunStats,
}

impl FinalizedMessage {
    /// Returns true if the upstream failed before the end.
    pub fn is_partial(&self) -> bool {
        matches!(self.completion, Completion::Partial { .. })
    }

    /// The history entry to append to the session, stamped now.
    ///
    /// The raw tool arguments are kept under `tool_call` so a reloaded
    /// session still shows the plan the model produced.
    pub fn to_history_message(&self) -> HistoryMessage {
        let mut message = HistoryMessage::assistant(self.text.clone()).with_timestamp(Utc::now());

        if let Some(tool_call) = &self.tool_call {
            message = message.with_extra(
                "tool_call",
                serde_json::json!({
                    "name": tool_call.name,
                    "arguments": tool_call.raw_arguments,
                }),
            );
        }

        if let Completion::Partial { error } = &self.completion {
            message = message.with_extra("partial", Value::Bool(true)).with_extra(
                "error",
                Value::String(error.clone()),
            );
        }

        message
    }
}
