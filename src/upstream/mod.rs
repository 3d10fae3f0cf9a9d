//! The upstream model seam.
//!
//! The accumulator only sees [`UpstreamModel`]: give it messages and tool
//! definitions, get back an ordered stream of [`UpstreamChunk`]s. The
//! production implementation is [`OpenAiUpstream`]; tests substitute a
//! scripted double.

mod openai;

pub use openai::OpenAiUpstream;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::errors::PlanStreamResult;
use crate::types::chat::UpstreamMessage;
use crate::types::chunk::UpstreamChunk;
use crate::types::tools::Tool;

/// Ordered chunk stream returned by an upstream model.
///
/// An `Err` item means the upstream failed; nothing after it is read.
pub type ChunkStream = Pin<Box<dyn Stream<Item = PlanStreamResult<UpstreamChunk>> + Send>>;

/// What is sent to the upstream model for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    /// Preamble followed by the stripped conversation history.
    pub messages: Vec<UpstreamMessage>,
    /// Tools offered to the model.
    pub tools: Vec<Tool>,
}

/// A chat model that streams its answer.
#[async_trait]
pub trait UpstreamModel: Send + Sync {
    /// Opens a completion stream for the request.
    async fn stream(&self, request: UpstreamRequest) -> PlanStreamResult<ChunkStream>;
}
