//! Stream accumulation.
//!
//! [`StreamAccumulator::run`] opens one upstream stream per call, forwards
//! every classified event to the live consumer as soon as its chunk arrives
//! and appends the same event to the run's buffers. When the upstream ends,
//! cleanly or with an error, the buffers become a [`FinalizedMessage`]
//! delivered through the run's [`FinalizeHandle`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use plan_stream::{OpenAiUpstream, StreamAccumulator, UpstreamConfig};
//! use plan_stream::types::chat::HistoryMessage;
//!
//! # async fn demo() -> Result<(), plan_stream::PlanStreamError> {
//! let upstream = OpenAiUpstream::new(UpstreamConfig::from_env()?)?;
//! let accumulator = StreamAccumulator::new(Arc::new(upstream));
//!
//! let run = accumulator.run(&[HistoryMessage::user("Plan my launch")], None);
//! let (mut events, finalized) = run.into_parts();
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event?);
//! }
//! if let Some(message) = finalized.wait().await.into_message() {
//!     println!("{}", message.text);
//! }
//! # Ok(())
//! # }
//! ```

mod live;
mod state;

pub use live::{FinalizeHandle, LiveEvents, NdjsonStream, RunOutcome, StreamRun};
pub use state::{
    Completion, FinalizedMessage, ParseFailure, ParsedArguments, StreamState, ToolCallRecord,
};

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::config::AccumulatorConfig;
use crate::decoder::ChunkDecoder;
use crate::observability::RunTimer;
use crate::types::chat::{HistoryMessage, UpstreamMessage};
use crate::types::tools::manage_plan_tool;
use crate::upstream::{UpstreamModel, UpstreamRequest};

/// Drives the upstream model and splits its output into live events and a
/// finalized message.
#[derive(Clone)]
pub struct StreamAccumulator {
    upstream: Arc<dyn UpstreamModel>,
    config: AccumulatorConfig,
    decoder: ChunkDecoder,
}

impl StreamAccumulator {
    /// Creates an accumulator with the default configuration.
    pub fn new(upstream: Arc<dyn UpstreamModel>) -> Self {
        Self::with_config(upstream, AccumulatorConfig::default())
    }

    /// Creates an accumulator with a custom configuration.
    pub fn with_config(upstream: Arc<dyn UpstreamModel>, config: AccumulatorConfig) -> Self {
        Self {
            upstream,
            config,
            decoder: ChunkDecoder::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AccumulatorConfig {
        &self.config
    }

    /// Preamble (with context, if any) followed by the history reduced to
    /// role and content.
    pub fn build_messages(
        &self,
        history: &[HistoryMessage],
        context: Option<&str>,
    ) -> Vec<UpstreamMessage> {
        std::iter::once(UpstreamMessage::system(self.config.system_prompt(context)))
            .chain(history.iter().map(UpstreamMessage::from))
            .collect()
    }

    /// The full upstream request for a run.
    pub fn build_request(&self, history: &[HistoryMessage], context: Option<&str>) -> UpstreamRequest {
        UpstreamRequest {
            messages: self.build_messages(history, context),
            tools: vec![manage_plan_tool(&self.config.tool_name)],
        }
    }

    /// Starts a run.
    ///
    /// The upstream is opened lazily on the first poll of the returned
    /// events. A failure to open it, or a failure mid-stream, is delivered
    /// as the last live item and still finalizes with what was buffered.
    pub fn run(&self, history: &[HistoryMessage], context: Option<&str>) -> StreamRun {
        let id = uuid::Uuid::new_v4();
        let request = self.build_request(history, context);
        let upstream = Arc::clone(&self.upstream);
        let decoder = self.decoder;
        let tool_name = self.config.tool_name.clone();
        let (tx, rx) = oneshot::channel();

        let span = tracing::info_span!("plan_stream_run", run_id = %id, history = history.len());

        let events = async_stream::stream! {
            let timer = RunTimer::start();
            let mut state = StreamState::new();
            let mut failure = None;

            match upstream.stream(request).instrument(span.clone()).await {
                Ok(mut chunks) => {
                    while let Some(item) = chunks.next().await {
                        match item {
                            Ok(chunk) => {
                                let events = decoder.classify(&chunk);
                                state.record_chunk(&events);
                                tracing::trace!(parent: &span, events = events.len(), "Chunk classified");

                                for event in events {
                                    state.absorb(&event);
                                    yield Ok(event);
                                }
                            }
                            Err(error) => {
                                failure = Some(error);
                                break;
                            }
                        }
                    }
                }
                Err(error) => failure = Some(error),
            }

            let completion = match &failure {
                Some(error) => {
                    tracing::warn!(parent: &span, error = %error, "Upstream failed, finalizing partial message");
                    Completion::Partial { error: error.to_string() }
                }
                None => Completion::Complete,
            };

            let message = state.finalize(&tool_name, completion, timer.elapsed());
            tracing::info!(
                parent: &span,
                partial = message.is_partial(),
                chunks = message.stats.chunks_seen,
                events = message.stats.events_forwarded(),
                text_bytes = message.stats.text_bytes,
                tool_bytes = message.stats.tool_bytes,
                tool_call = message.tool_call.is_some(),
                duration_ms = u64::try_from(message.stats.duration.as_millis()).unwrap_or(u64::MAX),
                "Run finalized"
            );

            if tx.send(message).is_err() {
                tracing::debug!(parent: &span, "Finalize handle dropped before the run ended");
            }

            if let Some(error) = failure {
                yield Err(error);
            }
        };

        StreamRun {
            id,
            events: LiveEvents::new(Box::pin(events)),
            finalized: FinalizeHandle::new(rx),
        }
    }
}

impl std::fmt::Debug for StreamAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAccumulator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
