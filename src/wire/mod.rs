//! Newline-delimited JSON records for the live event feed.
//!
//! Every record is one JSON object with a `type` field followed by `\n`.
//! The decoder only ever produces `text` and `tool_chunk`; the session layer
//! may put a `meta` record first, and a failed stream ends with an `error`
//! record. Consumers must pass through any other type untouched.

use serde_json::{Map, Value};

use crate::decoder::ChunkEvent;
use crate::errors::{PlanStreamError, PlanStreamResult};

/// Media type of the live feed.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// One record of the live feed.
#[derive(Debug, Clone, PartialEq)]
pub enum WireRecord {
    /// `{"type":"text","content":...}`
    Text(String),
    /// `{"type":"tool_chunk","content":...}`
    ToolChunk(String),
    /// `{"type":"meta", ...}` with every other field kept as is.
    Meta(Map<String, Value>),
    /// `{"type":"error","message":...}`
    Error {
        /// Failure description.
        message: String,
    },
    /// Any other record, kept raw.
    Unknown(Value),
}

impl WireRecord {
    /// Builds the error record for a failed stream.
    pub fn error(err: &PlanStreamError) -> Self {
        WireRecord::Error {
            message: err.to_string(),
        }
    }

    /// Converts the record to a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            WireRecord::Text(content) => serde_json::json!({"type": "text", "content": content}),
            WireRecord::ToolChunk(content) => {
                serde_json::json!({"type": "tool_chunk", "content": content})
            }
            WireRecord::Meta(fields) => {
                let mut object = fields.clone();
                object.insert("type".to_string(), Value::from("meta"));
                Value::Object(object)
            }
            WireRecord::Error { message } => {
                serde_json::json!({"type": "error", "message": message})
            }
            WireRecord::Unknown(value) => value.clone(),
        }
    }

    /// Serializes the record as one newline-terminated line.
    ///
    /// `type` is always the first key.
    pub fn to_line(&self) -> String {
        let mut line = match self {
            WireRecord::Text(content) => tagged_line("text", "content", content),
            WireRecord::ToolChunk(content) => tagged_line("tool_chunk", "content", content),
            WireRecord::Error { message } => tagged_line("error", "message", message),
            WireRecord::Meta(fields) => {
                let mut line = String::from("{\"type\":\"meta\"");
                for (key, value) in fields.iter().filter(|(key, _)| key.as_str() != "type") {
                    line.push(',');
                    line.push_str(&Value::from(key.as_str()).to_string());
                    line.push(':');
                    line.push_str(&value.to_string());
                }
                line.push('}');
                line
            }
            WireRecord::Unknown(value) => value.to_string(),
        };
        line.push('\n');
        line
    }

    /// Parses one line of the feed.
    ///
    /// Unrecognized `type` values become [`WireRecord::Unknown`]. A known
    /// type with a missing payload field is a validation error.
    pub fn parse_line(line: &str) -> PlanStreamResult<Self> {
        let value: Value = serde_json::from_str(line.trim_end_matches(['\n', '\r']))?;

        let Value::Object(mut object) = value else {
            return Err(PlanStreamError::validation("Record is not a JSON object"));
        };

        let record_type = object
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);

        match record_type.as_deref() {
            Some("text") => Ok(WireRecord::Text(take_string(&mut object, "content")?)),
            Some("tool_chunk") => Ok(WireRecord::ToolChunk(take_string(&mut object, "content")?)),
            Some("error") => Ok(WireRecord::Error {
                message: take_string(&mut object, "message")?,
            }),
            Some("meta") => {
                object.remove("type");
                Ok(WireRecord::Meta(object))
            }
            _ => Ok(WireRecord::Unknown(Value::Object(object))),
        }
    }
}

fn tagged_line(record_type: &str, field: &str, payload: &str) -> String {
    format!(
        "{{\"type\":{},{}:{}}}",
        Value::from(record_type),
        Value::from(field),
        Value::from(payload)
    )
}

fn take_string(object: &mut Map<String, Value>, field: &str) -> PlanStreamResult<String> {
    match object.remove(field) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(PlanStreamError::validation_param(
            format!("Record is missing string field '{field}'"),
            field,
        )),
    }
}

impl From<ChunkEvent> for WireRecord {
    fn from(event: ChunkEvent) -> Self {
        match event {
            ChunkEvent::Text(content) => WireRecord::Text(content),
            ChunkEvent::ToolFragment(content) => WireRecord::ToolChunk(content),
        }
    }
}

/// Encodes one event as a newline-terminated record.
pub fn encode_line(event: &ChunkEvent) -> String {
    WireRecord::from(event.clone()).to_line()
}
