//! Streaming response handling and SSE parsing.

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};

use super::TransportError;
use crate::errors::PlanStreamError;
use crate::types::chunk::ChatChunk;

/// Streaming HTTP response.
pub struct StreamingResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Byte stream.
    pub stream: Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type.
    pub event: Option<String>,
    /// Event data.
    pub data: String,
    /// Event ID.
    pub id: Option<String>,
}

#[derive(Debug, Default)]
struct SseEventBuilder {
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseEventBuilder {
    fn build(self) -> Option<SseEvent> {
        if self.data.is_empty() {
            return None;
        }

        Some(SseEvent {
            event: self.event,
            data: self.data.join("\n"),
            id: self.id,
        })
    }
}

/// SSE parser that converts text fragments to events.
///
/// Fragments may split lines and events anywhere; incomplete input is held
/// until the next call to [`SseParser::parse`] or [`SseParser::flush`].
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    current_event: SseEventBuilder,
}

impl SseParser {
    /// Creates a new SSE parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a fragment of data and returns any complete events.
    pub fn parse(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');

            if let Some(event) = self.parse_line(line) {
                events.push(event);
            }
        }

        events
    }

    fn parse_line(&mut self, line: &str) -> Option<SseEvent> {
        // Empty line ends the event
        if line.is_empty() {
            return std::mem::take(&mut self.current_event).build();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(colon_pos) => (&line[..colon_pos], line[colon_pos + 1..].trim_start()),
            None => (line, ""),
        };

        match field {
            "event" => self.current_event.event = Some(value.to_string()),
            "data" => self.current_event.data.push(value.to_string()),
            "id" => self.current_event.id = Some(value.to_string()),
            _ => {}
        }

        None
    }

    /// Flush any remaining event at end of input.
    pub fn flush(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            if let Some(event) = self.parse_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        std::mem::take(&mut self.current_event).build()
    }
}

/// Marker the upstream sends as its final SSE payload.
const DONE_MARKER: &str = "[DONE]";

pin_project! {
    /// Stream of decoded chat chunks read from an SSE byte stream.
    ///
    /// Ends on `[DONE]` or when the byte stream ends. A data payload that is
    /// not a chat chunk is reported as a [`PlanStreamError::Stream`] item.
    pub struct ChatChunkStream {
        #[pin]
        inner: Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>,
        parser: SseParser,
        pending: VecDeque<SseEvent>,
        // Bytes of a UTF-8 sequence split across network reads
        carry: Vec<u8>,
        done: bool,
    }
}

impl ChatChunkStream {
    /// Creates a chunk stream over a raw SSE byte stream.
    pub fn new(stream: Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>) -> Self {
        Self {
            inner: stream,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            carry: Vec::new(),
            done: false,
        }
    }
}

fn decode_event(event: &SseEvent) -> Result<ChatChunk, PlanStreamError> {
    serde_json::from_str::<ChatChunk>(&event.data)
        .map_err(|e| PlanStreamError::stream(format!("Undecodable chunk payload: {e}")))
}

impl Stream for ChatChunkStream {
    type Item = Result<ChatChunk, PlanStreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.done {
                return Poll::Ready(None);
            }

            if let Some(event) = this.pending.pop_front() {
                if event.data == DONE_MARKER {
                    *this.done = true;
                    return Poll::Ready(None);
                }
                if event.data.is_empty() {
                    continue;
                }
                return Poll::Ready(Some(decode_event(&event)));
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.carry.extend_from_slice(&bytes);
                    let valid_up_to = match std::str::from_utf8(this.carry.as_slice()) {
                        Ok(_) => this.carry.len(),
                        Err(e) if e.error_len().is_none() => e.valid_up_to(),
                        Err(e) => {
                            *this.done = true;
                            return Poll::Ready(Some(Err(PlanStreamError::stream(format!(
                                "Invalid UTF-8 in stream: {e}"
                            )))));
                        }
                    };
                    let tail = this.carry.split_off(valid_up_to);
                    let text = String::from_utf8_lossy(this.carry.as_slice()).into_owned();
                    *this.carry = tail;

                    this.pending.extend(this.parser.parse(&text));
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(PlanStreamError::from(e))));
                }
                Poll::Ready(None) => {
                    if !this.carry.is_empty() {
                        *this.done = true;
                        return Poll::Ready(Some(Err(PlanStreamError::stream(
                            "truncated UTF-8 at end of stream",
                        ))));
                    }
                    match this.parser.flush() {
                        Some(event) => this.pending.push_back(event),
                        None => {
                            *this.done = true;
                            return Poll::Ready(None);
                        }
                    }
                    // The flushed event is the last one
                    if let Some(event) = this.pending.pop_front() {
                        *this.done = true;
                        if event.data == DONE_MARKER || event.data.is_empty() {
                            return Poll::Ready(None);
                        }
                        return Poll::Ready(Some(decode_event(&event)));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
