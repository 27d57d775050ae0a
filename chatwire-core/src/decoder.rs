//! Chunk decoder: raw response fragments in, `StreamEvent`s out.
//!
//! The residual buffer, not the fragment, is the scanning unit, so an event
//! (or its delimiter, or a multi-byte character) may be split across any
//! number of fragments. Both framing conventions seen on the wire are
//! accepted: `data: {"type":"end"}` and a named `event: end` unit.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use tracing::{debug, trace, warn};

use crate::error::ChatWireError;
use crate::stream::{StreamErrorKind, StreamEvent, WireEvent};

const DELIMITERS: [&[u8]; 3] = [b"\r\n\r\n", b"\n\n", b"\r\r"];
const KNOWN_TYPES: [&str; 5] = ["content", "tool_start", "tool_end", "end", "error"];

/// Incremental SSE decoder.
///
/// Not reentrant: one decoder serves exactly one response body.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    residual: Vec<u8>,
    ended: bool,
    finished: bool,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an `End` (real or synthetic) has been produced.
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Feed one fragment; returns every event completed by it.
    pub fn push(&mut self, fragment: &[u8]) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished || fragment.is_empty() {
            return out;
        }
        self.residual.extend_from_slice(fragment);
        while let Some((start, len)) = find_delimiter(&self.residual) {
            let unit: Vec<u8> = self.residual.drain(..start + len).take(start).collect();
            self.decode_unit(&unit, &mut out);
        }
        out
    }

    pub fn push_str(&mut self, fragment: &str) -> Vec<StreamEvent> {
        self.push(fragment.as_bytes())
    }

    /// Signal end of transport. A trailing undelimited unit is decoded, then a
    /// synthetic `End` is produced unless one was already seen. Idempotent.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.finished = true;
        if !self.residual.is_empty() {
            let unit = std::mem::take(&mut self.residual);
            self.decode_unit(&unit, &mut out);
        }
        if !self.ended {
            trace!("transport closed without end event; synthesizing one");
            self.ended = true;
            out.push(StreamEvent::End);
        }
        out
    }

    /// Signal that the transport failed. Partial data is discarded.
    pub fn fail(&mut self, kind: StreamErrorKind, message: impl Into<String>) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.residual.clear();
        if !self.ended {
            out.push(StreamEvent::error(kind, message));
        }
        out.extend(self.finish());
        out
    }

    fn decode_unit(&mut self, unit: &[u8], out: &mut Vec<StreamEvent>) {
        if self.ended {
            trace!(bytes = unit.len(), "dropping unit after end");
            return;
        }
        let text = String::from_utf8_lossy(unit);
        let mut name: Option<&str> = None;
        let mut data: Vec<&str> = Vec::new();

        for line in text.split(['\r', '\n']).filter(|l| !l.is_empty()) {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line, ""),
            };
            match field {
                "event" => name = Some(value.trim()),
                "data" => data.push(value),
                _ => {}
            }
        }

        let data = (!data.is_empty()).then(|| data.join("\n"));
        let event = match (name, data) {
            (Some("end"), _) => Some(StreamEvent::End),
            (Some("error"), d) => Some(StreamEvent::error(
                StreamErrorKind::Server,
                d.filter(|d| !d.is_empty()).unwrap_or_else(|| "backend reported an error".into()),
            )),
            (_, None) => None,
            (_, Some(d)) => parse_payload(&d),
        };

        if let Some(event) = event {
            if matches!(event, StreamEvent::End) {
                self.ended = true;
            }
            out.push(event);
        }
    }
}

fn find_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    DELIMITERS
        .iter()
        .filter_map(|d| buf.windows(d.len()).position(|w| w == *d).map(|p| (p, d.len())))
        .min_by_key(|(p, _)| *p)
}

fn parse_payload(data: &str) -> Option<StreamEvent> {
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return Some(framing_error(format!("invalid json: {e}"))),
    };
    let Some(ty) = value.get("type").and_then(serde_json::Value::as_str).map(str::to_owned) else {
        return Some(framing_error("payload has no string `type` field".into()));
    };
    if !KNOWN_TYPES.contains(&ty.as_str()) {
        let err = ChatWireError::Protocol(ty.to_string());
        debug!(error = %err, "ignoring event");
        return None;
    }
    match serde_json::from_value::<WireEvent>(value) {
        Ok(ev) => Some(ev.into()),
        Err(e) => Some(framing_error(format!("bad `{ty}` event: {e}"))),
    }
}

fn framing_error(detail: String) -> StreamEvent {
    let err = ChatWireError::Framing(detail);
    warn!(error = %err, "malformed event unit; continuing");
    StreamEvent::error(StreamErrorKind::Framing, err.to_string())
}

/// Decode a complete body delivered as the given fragments.
pub fn decode_all<I, F>(fragments: I) -> Vec<StreamEvent>
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut decoder = ChunkDecoder::new();
    let mut out = Vec::new();
    for f in fragments {
        out.extend(decoder.push(f.as_ref()));
    }
    out.extend(decoder.finish());
    out
}

/// Pull-based adapter: wraps any byte stream (HTTP body, scripted fragments)
/// and yields decoded events lazily. Always ends with exactly one `End`.
pub struct EventStream<S> {
    inner: S,
    decoder: ChunkDecoder,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

impl<S> EventStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: ChunkDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S, E> Stream for EventStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Poll::Ready(Some(ev));
            }
            if self.done {
                return Poll::Ready(None);
            }
            match self.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let events = self.decoder.push(&chunk);
                    self.pending.extend(events);
                    // Stop reading once the backend has said `end`.
                    self.done = self.decoder.has_ended();
                }
                Poll::Ready(Some(Err(e))) => {
                    let events = self
                        .decoder
                        .fail(StreamErrorKind::Transport, format!("stream interrupted: {e}"));
                    self.pending.extend(events);
                    self.done = true;
                }
                Poll::Ready(None) => {
                    let events = self.decoder.finish();
                    self.pending.extend(events);
                    self.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
