use futures_util::stream::{self, Stream, StreamExt};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

use crate::utils::error::{ApiError, ApiResult};

/// Raw body chunks of a streaming response
pub type ByteStream = Pin<Box<dyn Stream<Item = ApiResult<Vec<u8>>> + Send>>;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// One step of a streamed answer
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A decoded JSON object
    Chunk(JsonValue),
    /// Sentinel received or body exhausted
    Done,
}

/// Classification of a single body line
#[derive(Debug, Clone, PartialEq)]
pub enum StreamLine {
    Skip,
    Done,
    Chunk(JsonValue),
}

/// Classify one line of a streamed body
pub fn parse_stream_line(line: &str) -> StreamLine {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return StreamLine::Skip;
    }

    let payload = match line.strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => line,
    };

    if payload.trim() == DONE_SENTINEL {
        return StreamLine::Done;
    }

    match serde_json::from_str::<JsonValue>(payload) {
        Ok(value) => StreamLine::Chunk(value),
        Err(e) => {
            warn!(line = payload, error = %e, "skipping malformed stream line");
            StreamLine::Skip
        }
    }
}

/// Splits arbitrary byte chunks on `\n`
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Any trailing partial line left at end of body
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Forward-only reader over a line-delimited JSON event stream
pub struct EventStream {
    source: ByteStream,
    decoder: LineDecoder,
    pending: VecDeque<String>,
    read_timeout: Option<Duration>,
    source_exhausted: bool,
    finished: bool,
}

impl EventStream {
    pub fn new(source: ByteStream) -> Self {
        Self {
            source,
            decoder: LineDecoder::new(),
            pending: VecDeque::new(),
            read_timeout: None,
            source_exhausted: false,
            finished: false,
        }
    }

    /// Fail with `ApiError::Timeout` when the source stays silent longer than `timeout`
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Stream over an already complete body
    pub fn from_body(body: impl Into<Vec<u8>>) -> Self {
        let chunks: Vec<ApiResult<Vec<u8>>> = vec![Ok(body.into())];
        Self::new(Box::pin(stream::iter(chunks)))
    }

    /// Stream that yields the given chunks, then optionally fails
    pub fn from_chunks(chunks: Vec<ApiResult<Vec<u8>>>) -> Self {
        Self::new(Box::pin(stream::iter(chunks)))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next decoded chunk, or `Done` forever once the stream has ended
    pub async fn next_event(&mut self) -> ApiResult<StreamEvent> {
        loop {
            if self.finished {
                return Ok(StreamEvent::Done);
            }

            if let Some(line) = self.pending.pop_front() {
                match parse_stream_line(&line) {
                    StreamLine::Chunk(value) => return Ok(StreamEvent::Chunk(value)),
                    StreamLine::Done => {
                        debug!("stream sentinel received");
                        self.finished = true;
                        return Ok(StreamEvent::Done);
                    }
                    StreamLine::Skip => continue,
                }
            }

            if self.source_exhausted {
                self.finished = true;
                continue;
            }

            let next = match self.read_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.source.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(timeout_ms = limit.as_millis() as u64, "stream stalled");
                        self.finished = true;
                        return Err(ApiError::Timeout(format!(
                            "No stream data received for {} ms",
                            limit.as_millis()
                        )));
                    }
                },
                None => self.source.next().await,
            };

            match next {
                Some(Ok(bytes)) => {
                    let lines = self.decoder.push(&bytes);
                    self.pending.extend(lines);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Err(e);
                }
                None => {
                    self.source_exhausted = true;
                    if let Some(rest) = self.decoder.finish() {
                        self.pending.push_back(rest);
                    }
                }
            }
        }
    }

    /// Drain the remaining chunks into a vector
    pub async fn collect_chunks(mut self) -> ApiResult<Vec<JsonValue>> {
        let mut chunks = Vec::new();
        while let StreamEvent::Chunk(value) = self.next_event().await? {
            chunks.push(value);
        }
        Ok(chunks)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .finish()
    }
}
