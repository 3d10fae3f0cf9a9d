//! The two halves of a run: the live event stream and the finalize handle.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;
use serde_json::{Map, Value};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use super::state::FinalizedMessage;
use crate::decoder::ChunkEvent;
use crate::errors::PlanStreamResult;
use crate::wire::WireRecord;

/// Boxed stream of live events.
pub(crate) type EventStream = Pin<Box<dyn Stream<Item = PlanStreamResult<ChunkEvent>> + Send>>;

/// NDJSON body produced by [`LiveEvents::into_ndjson`].
pub type NdjsonStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

pin_project! {
    /// Live events of one run, in arrival order.
    ///
    /// Nothing is requested from the upstream until the first poll. An
    /// `Err` item is the last item. Dropping the stream before it ends
    /// cancels the run.
    pub struct LiveEvents {
        #[pin]
        inner: EventStream,
        meta: Option<Map<String, Value>>,
    }
}

impl LiveEvents {
    pub(crate) fn new(inner: EventStream) -> Self {
        Self { inner, meta: None }
    }

    /// Sets a `meta` record to put in front of the NDJSON feed.
    #[must_use]
    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Converts the events into NDJSON lines.
    ///
    /// A failure becomes a trailing `error` record instead of an error item.
    pub fn into_ndjson(self) -> NdjsonStream {
        let leading = self
            .meta
            .map(|meta| Bytes::from(WireRecord::Meta(meta).to_line()));

        let lines = self.inner.map(|item| {
            let record = match item {
                Ok(event) => WireRecord::from(event),
                Err(error) => WireRecord::error(&error),
            };
            Bytes::from(record.to_line())
        });

        Box::pin(futures::stream::iter(leading).chain(lines))
    }
}

impl Stream for LiveEvents {
    type Item = PlanStreamResult<ChunkEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl std::fmt::Debug for LiveEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEvents")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// What a run left behind.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The stream ended, cleanly or not; see [`FinalizedMessage::completion`].
    Finalized(FinalizedMessage),
    /// The live stream was dropped before the end. Nothing to persist.
    Cancelled,
}

impl RunOutcome {
    /// The finalized message, if the run was not cancelled.
    pub fn into_message(self) -> Option<FinalizedMessage> {
        match self {
            RunOutcome::Finalized(message) => Some(message),
            RunOutcome::Cancelled => None,
        }
    }

    /// Returns true for a cancelled run.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }
}

/// Resolves once the run ends or is cancelled.
///
/// Resolution depends on the live stream being driven; awaiting this
/// without polling [`LiveEvents`] (or dropping it) never completes.
#[derive(Debug)]
pub struct FinalizeHandle {
    rx: oneshot::Receiver<FinalizedMessage>,
}

impl FinalizeHandle {
    pub(crate) fn new(rx: oneshot::Receiver<FinalizedMessage>) -> Self {
        Self { rx }
    }

    /// Waits for the run's outcome.
    pub async fn wait(self) -> RunOutcome {
        match self.rx.await {
            Ok(message) => RunOutcome::Finalized(message),
            Err(_) => RunOutcome::Cancelled,
        }
    }

    /// Returns the outcome if it is already known.
    pub fn try_outcome(&mut self) -> Option<RunOutcome> {
        match self.rx.try_recv() {
            Ok(message) => Some(RunOutcome::Finalized(message)),
            Err(oneshot::error::TryRecvError::Closed) => Some(RunOutcome::Cancelled),
            Err(oneshot::error::TryRecvError::Empty) => None,
        }
    }
}

/// One run: events for the client and the handle for storage.
#[derive(Debug)]
pub struct StreamRun {
    /// Run id, also recorded on the run's tracing span.
    pub id: uuid::Uuid,
    /// Live events.
    pub events: LiveEvents,
    /// Finalize handle.
    pub finalized: FinalizeHandle,
}

impl StreamRun {
    /// Splits the run into its halves.
    pub fn into_parts(self) -> (LiveEvents, FinalizeHandle) {
        (self.events, self.finalized)
    }
}
