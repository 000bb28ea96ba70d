//! Server-sent event decoding for streamed chat completions.

use crate::error::CompletionError;
use crate::transport::ByteStream;
use futures::StreamExt;
use serde::Deserialize;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Classification of one complete SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A frame carrying non-empty `choices[0].delta.content`.
    Delta(String),
    /// The `[DONE]` sentinel.
    Done,
    /// Anything else: comments, other fields, empty deltas, malformed JSON.
    Skip,
}

#[derive(Deserialize)]
struct ChunkFrame {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Classifies a single line of an event stream.
pub fn parse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix(DATA_PREFIX) else {
        return SseLine::Skip;
    };

    if data == DONE_SENTINEL {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChunkFrame>(data) {
        Ok(frame) => frame
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(SseLine::Delta)
            .unwrap_or(SseLine::Skip),
        Err(e) => {
            tracing::warn!("[SseDecoder] Skipping malformed frame: {}", e);
            SseLine::Skip
        }
    }
}

/// Turns a response body into a sequence of text deltas.
///
/// The body is consumed once; a decoder is not restartable. The underlying
/// stream is dropped as soon as the sequence ends, whether by sentinel, by
/// end of body or by an upstream error.
pub struct SseDecoder {
    body: Option<ByteStream>,
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body: Some(body),
            buffer: Vec::new(),
        }
    }

    /// Returns the next delta, `Ok(None)` at the end of the sequence.
    ///
    /// Lines are split on raw `\n` bytes before UTF-8 decoding, so a
    /// multi-byte character split across chunks is reassembled intact.
    /// A trailing fragment without a newline at end of body is discarded.
    pub async fn next_delta(&mut self) -> Result<Option<String>, CompletionError> {
        loop {
            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };

            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                match parse_line(&String::from_utf8_lossy(&line)) {
                    SseLine::Delta(delta) => return Ok(Some(delta)),
                    SseLine::Done => {
                        self.release();
                        return Ok(None);
                    }
                    SseLine::Skip => continue,
                }
            }

            match body.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.release();
                    return Err(e);
                }
                None => {
                    if !self.buffer.is_empty() {
                        tracing::debug!(
                            "[SseDecoder] Discarding {} trailing bytes without newline",
                            self.buffer.len()
                        );
                    }
                    self.release();
                    return Ok(None);
                }
            }
        }
    }

    /// Whether the body has been released.
    pub fn is_finished(&self) -> bool {
        self.body.is_none()
    }

    fn release(&mut self) {
        self.body = None;
        self.buffer.clear();
    }
}
