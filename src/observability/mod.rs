//! Observability for accumulator runs.
//!
//! Logging setup lives in [`LoggingConfig`]. Each run also keeps a small set
//! of counters, [`RunStats`], which are logged when the run ends and attached
//! to the finalized message.

mod logging;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::decoder::ChunkEvent;

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Chunks pulled from the upstream.
    pub chunks_seen: u64,
    /// Chunks that classified to no event.
    pub empty_chunks: u64,
    /// Text events forwarded.
    pub text_events: u64,
    /// Tool fragment events forwarded.
    pub tool_events: u64,
    /// Bytes of text accumulated.
    pub text_bytes: u64,
    /// Bytes of tool arguments accumulated.
    pub tool_bytes: u64,
    /// Time from opening the upstream to the end of the stream.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl RunStats {
    /// Total events forwarded.
    pub fn events_forwarded(&self) -> u64 {
        self.text_events + self.tool_events
    }

    pub(crate) fn record_chunk(&mut self, events: &[ChunkEvent]) {
        self.chunks_seen += 1;
        if events.is_empty() {
            self.empty_chunks += 1;
        }
    }

    pub(crate) fn record_event(&mut self, event: &ChunkEvent) {
        let len = event.content().len() as u64;
        match event {
            ChunkEvent::Text(_) => {
                self.text_events += 1;
                self.text_bytes += len;
            }
            ChunkEvent::ToolFragment(_) => {
                self.tool_events += 1;
                self.tool_bytes += len;
            }
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Timer for measuring a run's duration.
#[derive(Debug)]
pub struct RunTimer {
    start: Instant,
}

impl RunTimer {
    /// Starts a timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
