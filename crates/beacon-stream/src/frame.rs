//! # Frame decoding
//!
//! The account stream is `text/event-stream`: frames separated by a blank
//! line, each carrying one `data: <json>` line. Chunks from the transport
//! have no relation to frame boundaries, so bytes are buffered until a
//! complete `\n\n`-terminated frame exists.
//!
//! - Comment frames (`:heartbeat`) and frames without `data:` are skipped
//! - `\r\n` line endings are normalized
//! - Multiple `data:` lines in one frame are joined with `\n`
//! - A frame that does not parse as a [`Notification`] is logged and dropped;
//!   the connection carries on
//! - A trailing frame with no terminator when the body ends is discarded

use std::collections::VecDeque;

use beacon_core::Notification;
use beacon_core::text::truncate_str;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::StreamError;

const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Incremental splitter from raw chunks to frame `data` payloads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Bytes already searched for a delimiter without success.
    scanned: usize,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the `data` payloads of every frame it completed,
    /// in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.reserve(chunk.len());
        self.buffer
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(end) = self.find_delimiter() {
            let frame = self.buffer.split_to(end + FRAME_DELIMITER.len());
            self.scanned = 0;

            let body = &frame[..end];
            match std::str::from_utf8(body) {
                Ok(text) => {
                    if let Some(data) = extract_frame_data(text) {
                        payloads.push(data);
                    }
                }
                Err(_) => {
                    warn!(len = body.len(), "dropping frame with invalid UTF-8");
                }
            }
        }
        payloads
    }

    /// Number of bytes waiting for a frame terminator.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn find_delimiter(&mut self) -> Option<usize> {
        // Back up one byte so a delimiter straddling two pushes is found.
        let start = self.scanned.saturating_sub(FRAME_DELIMITER.len() - 1);
        let found = self.buffer[start..]
            .windows(FRAME_DELIMITER.len())
            .position(|w| w == FRAME_DELIMITER)
            .map(|pos| pos + start);
        if found.is_none() {
            self.scanned = self.buffer.len();
        }
        found
    }
}

/// Extract the `data` payload of one frame (without its terminator).
///
/// Returns `None` for comments, empty frames, and frames without data.
fn extract_frame_data(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| {
            let rest = line.strip_prefix("data:")?;
            Some(rest.strip_prefix(' ').unwrap_or(rest))
        })
        .collect();

    if lines.is_empty() {
        return None;
    }
    let data = lines.join("\n");
    let trimmed = data.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Parse one frame payload as a notification.
///
/// Returns `None` on parse failure with a warning log.
pub fn parse_notification(data: &str) -> Option<Notification> {
    match serde_json::from_str(data) {
        Ok(notification) => Some(notification),
        Err(e) => {
            warn!(
                error = %e,
                data_preview = truncate_str(data, 100),
                "dropping malformed notification frame"
            );
            metrics::counter!("beacon_frames_dropped_total", "reason" => "malformed").increment(1);
            None
        }
    }
}

struct DecodeState<S> {
    stream: S,
    decoder: FrameDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn a chunked body into a lazy stream of notifications.
///
/// Items arrive strictly in frame order. A transport error ends the stream
/// with one [`StreamError::Body`]; a clean end of body simply ends it.
pub fn decode_notifications<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<Notification, StreamError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        stream: byte_stream,
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                if let Some(notification) = parse_notification(&data) {
                    return Some((Ok(notification), state));
                }
                continue;
            }
            if state.done {
                return None;
            }

            match state.stream.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.decoder.push(&chunk);
                    state.pending.extend(payloads);
                }
                Some(Err(e)) => {
                    state.done = true;
                    let err = StreamError::Body {
                        message: e.to_string(),
                    };
                    return Some((Err(err), state));
                }
                None => {
                    let leftover = state.decoder.buffered_len();
                    if leftover > 0 {
                        debug!(bytes = leftover, "discarding unterminated trailing frame");
                    }
                    return None;
                }
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
