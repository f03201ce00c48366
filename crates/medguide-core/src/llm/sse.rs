//! Server-sent event decoding for streaming chat endpoints.
//!
//! Both OpenAI-style and Anthropic streaming responses arrive as `data: <json>`
//! lines. This module turns a raw byte stream into a [`TextStream`] of text
//! deltas, handling lines split across network chunks.

use super::provider::TextStream;
use crate::error::{UpstreamError, UpstreamResult};
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;

/// What a single `data:` payload means to the caller.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseEvent {
    /// A chunk of generated text
    Text(String),
    /// The provider signalled the end of the response
    Done,
    /// Keep-alives, role announcements and other non-text events
    Skip,
}

/// Parses one `data:` payload (already stripped of the prefix).
pub(crate) type SseParser = fn(&str) -> UpstreamResult<SseEvent>;

struct DecodeState<S> {
    bytes: std::pin::Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<UpstreamResult<String>>,
    finished: bool,
}

/// Decode a byte stream of server-sent events into text chunks.
pub(crate) fn decode_stream<S, B, E>(bytes: S, provider: &'static str, parse: SseParser) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(state, move |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    st.buffer.extend_from_slice(chunk.as_ref());
                    drain_lines(&mut st, parse);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    st.pending.push_back(Err(UpstreamError::Llm {
                        message: format!("{provider} stream interrupted: {e}"),
                        status_code: None,
                    }));
                }
                None => {
                    // Flush a final line that arrived without a trailing newline
                    if !st.buffer.is_empty() {
                        st.buffer.push(b'\n');
                        drain_lines(&mut st, parse);
                    }
                    st.finished = true;
                }
            }
        }
    }))
}

fn drain_lines<S>(st: &mut DecodeState<S>, parse: SseParser) {
    while let Some(pos) = st.buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = st.buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        match parse(data.trim()) {
            Ok(SseEvent::Text(text)) if !text.is_empty() => st.pending.push_back(Ok(text)),
            Ok(SseEvent::Done) => {
                st.finished = true;
                st.buffer.clear();
                return;
            }
            Ok(_) => {}
            Err(e) => {
                st.finished = true;
                st.buffer.clear();
                st.pending.push_back(Err(e));
                return;
            }
        }
    }
}
