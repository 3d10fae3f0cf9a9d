//! Plan Stream
//!
//! Incremental decoder for streamed chat completions that may carry a single
//! plan tool call. Text and tool-argument deltas are forwarded to the client
//! as they arrive, and the same deltas are accumulated into a message that
//! can be persisted once the stream ends.
//!
//! # Features
//!
//! - **Live forwarding**: each upstream chunk is classified and forwarded
//!   before the next one is read
//! - **Reconstruction**: full text plus the raw and parsed tool arguments,
//!   with parse failures reported instead of raised
//! - **Partial results**: an upstream failure still yields what arrived
//! - **Cancellation**: dropping the live stream stops the upstream read and
//!   skips finalization
//! - **NDJSON**: the `text` / `tool_chunk` line format clients consume
//! - **OpenAI-compatible upstream** over SSE, replaceable through the
//!   [`UpstreamModel`] trait
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use plan_stream::{OpenAiUpstream, StreamAccumulator, UpstreamConfig};
//! use plan_stream::types::chat::HistoryMessage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let upstream = OpenAiUpstream::new(UpstreamConfig::from_env()?)?;
//!     let accumulator = StreamAccumulator::new(Arc::new(upstream));
//!
//!     let history = vec![HistoryMessage::user("Help me plan a product launch")];
//!     let (events, finalized) = accumulator.run(&history, None).into_parts();
//!
//!     let mut body = events.into_ndjson();
//!     while let Some(line) = body.next().await {
//!         print!("{}", String::from_utf8_lossy(&line));
//!     }
//!
//!     if let Some(message) = finalized.wait().await.into_message() {
//!         if let Some(tool_call) = &message.tool_call {
//!             println!("plan: {:?}", tool_call.plan());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod accumulator;
pub mod config;
pub mod decoder;
pub mod errors;
pub mod observability;
pub mod transport;
pub mod types;
pub mod upstream;
pub mod wire;

// Re-exports for convenience
pub use accumulator::{
    Completion, FinalizeHandle, FinalizedMessage, LiveEvents, ParseFailure, ParsedArguments,
    RunOutcome, StreamAccumulator, StreamRun, ToolCallRecord,
};
pub use config::{AccumulatorConfig, UpstreamConfig};
pub use decoder::{ChunkDecoder, ChunkEvent};
pub use errors::{PlanStreamError, PlanStreamResult};
pub use upstream::{ChunkStream, OpenAiUpstream, UpstreamModel, UpstreamRequest};
pub use wire::{encode_line, WireRecord, NDJSON_CONTENT_TYPE};

// Type re-exports
pub use types::chat::{HistoryMessage, Role, UpstreamMessage};
pub use types::chunk::{ToolFragment, UpstreamChunk};
pub use types::plan::{Plan, Step, StepStatus};
pub use types::tools::{manage_plan_tool, Tool};

/// Test doubles for the upstream model.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
