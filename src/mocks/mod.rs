//! Test doubles for the upstream model.
//!
//! [`ScriptedUpstream`] replays a fixed chunk script, records every request
//! it receives and counts how many chunks were actually pulled, which makes
//! cancellation observable.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::errors::{PlanStreamError, PlanStreamResult};
use crate::types::chunk::UpstreamChunk;
use crate::upstream::{ChunkStream, UpstreamModel, UpstreamRequest};

/// One step of a script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Yield a chunk.
    Chunk(UpstreamChunk),
    /// Yield an error; the stream ends after it.
    Fail(PlanStreamError),
    /// Wait before the next step.
    Delay(Duration),
    /// Never yield again.
    Stall,
}

/// Upstream model that replays a script.
#[derive(Debug, Default)]
pub struct ScriptedUpstream {
    steps: Vec<ScriptStep>,
    open_error: Option<PlanStreamError>,
    requests: Mutex<Vec<UpstreamRequest>>,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedUpstream {
    /// Creates an upstream with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an upstream that yields the given chunks and ends cleanly.
    pub fn with_chunks(chunks: impl IntoIterator<Item = UpstreamChunk>) -> Self {
        Self::new().chunks(chunks)
    }

    /// Text-only script.
    pub fn text<'a>(pieces: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_chunks(pieces.into_iter().map(UpstreamChunk::text))
    }

    /// Tool-fragment-only script.
    pub fn tool<'a>(fragments: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_chunks(fragments.into_iter().map(UpstreamChunk::tool))
    }

    /// Appends a chunk.
    #[must_use]
    pub fn chunk(mut self, chunk: UpstreamChunk) -> Self {
        self.steps.push(ScriptStep::Chunk(chunk));
        self
    }

    /// Appends several chunks.
    #[must_use]
    pub fn chunks(mut self, chunks: impl IntoIterator<Item = UpstreamChunk>) -> Self {
        self.steps.extend(chunks.into_iter().map(ScriptStep::Chunk));
        self
    }

    /// Appends a failure.
    #[must_use]
    pub fn fail(mut self, error: PlanStreamError) -> Self {
        self.steps.push(ScriptStep::Fail(error));
        self
    }

    /// Appends a delay.
    #[must_use]
    pub fn delay(mut self, duration: Duration) -> Self {
        self.steps.push(ScriptStep::Delay(duration));
        self
    }

    /// Appends a stall.
    #[must_use]
    pub fn stall(mut self) -> Self {
        self.steps.push(ScriptStep::Stall);
        self
    }

    /// Makes opening the stream fail.
    #[must_use]
    pub fn fail_on_open(mut self, error: PlanStreamError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<UpstreamRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Number of chunks handed out across all streams.
    pub fn chunks_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamModel for ScriptedUpstream {
    async fn stream(&self, request: UpstreamRequest) -> PlanStreamResult<ChunkStream> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }

        let steps = self.steps.clone();
        let pulled = Arc::clone(&self.pulled);

        let stream = async_stream::stream! {
            for step in steps {
                match step {
                    ScriptStep::Chunk(chunk) => {
                        pulled.fetch_add(1, Ordering::SeqCst);
                        yield Ok(chunk);
                        tokio::task::yield_now().await;
                    }
                    ScriptStep::Fail(error) => {
                        yield Err(error);
                        return;
                    }
                    ScriptStep::Delay(duration) => tokio::time::sleep(duration).await,
                    ScriptStep::Stall => futures::future::pending::<()>().await,
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
