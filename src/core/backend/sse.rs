use std::collections::VecDeque;
use std::fmt::Display;

use futures_util::{stream, Stream, StreamExt};
use memchr::memchr;
use tracing::warn;

use super::{BackendError, EventFrames};

/// Splits a byte stream into trimmed, non-empty text lines.
#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    pub fn finish(&mut self) -> Vec<String> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut search_index = 0;

        while let Some(relative_pos) = memchr(b'\n', &self.buffer[search_index..]) {
            let newline_index = search_index + relative_pos;
            push_line(&mut lines, &self.buffer[search_index..newline_index]);
            search_index = newline_index + 1;
        }

        if flush {
            push_line(&mut lines, &self.buffer[search_index..]);
            self.buffer.clear();
        } else if search_index > 0 {
            self.buffer.drain(..search_index);
        }

        lines
    }
}

fn push_line(lines: &mut Vec<String>, bytes: &[u8]) {
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        Err(err) => warn!("Skipping event-stream line with invalid UTF-8: {err}"),
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

/// Payload of a `data:` line. `event:`, `id:` and `:` keep-alive comment
/// lines carry no payload.
pub fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

struct FrameState<S> {
    bytes: S,
    lines: SseLineBuffer,
    pending: VecDeque<String>,
    done: bool,
}

impl<S> FrameState<S> {
    fn queue_payloads(&mut self, lines: Vec<String>) {
        self.pending.extend(
            lines
                .iter()
                .filter_map(|line| sse_data_payload(line))
                .filter(|payload| !payload.is_empty())
                .map(str::to_string),
        );
    }
}

/// Adapts a chunked SSE body into one item per `data:` payload.
///
/// A chunk error is yielded once as [`BackendError::Transport`] and ends the
/// stream.
pub fn sse_frames<S, B, E>(bytes: S) -> EventFrames
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = FrameState {
        bytes,
        lines: SseLineBuffer::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let lines = state.lines.push(chunk.as_ref());
                    state.queue_payloads(lines);
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(BackendError::Transport(err.to_string())), state));
                }
                None => {
                    state.done = true;
                    let lines = state.lines.finish();
                    state.queue_payloads(lines);
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_buffer_handles_partial_lines() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: one").is_empty());
        assert_eq!(buffer.push(b"\r\n\n"), vec!["data: one"]);
        assert!(buffer.finish().is_empty());
    }

    #[test]
    fn sse_buffer_flushes_trailing_line() {
        let mut buffer = SseLineBuffer::default();
        assert_eq!(buffer.push(b"data: a\ndata: b"), vec!["data: a"]);
        assert_eq!(buffer.finish(), vec!["data: b"]);
    }

    #[test]
    fn detects_event_stream_content_type() {
        assert!(is_event_stream_content_type(
            "text/event-stream; charset=utf-8"
        ));
        assert!(!is_event_stream_content_type("application/json"));
    }

    #[test]
    fn extracts_sse_payload() {
        assert_eq!(sse_data_payload("data: {\"id\":1}"), Some("{\"id\":1}"));
        assert_eq!(sse_data_payload("event: progress"), None);
        assert_eq!(sse_data_payload(": keep-alive"), None);
    }

    #[tokio::test]
    async fn frames_skip_non_data_lines_across_chunks() {
        let chunks: Vec<Result<&'static [u8], String>> = vec![
            Ok(b": keep-alive\nevent: progress\ndata: {\"event\":".as_slice()),
            Ok(b"\"progress\",\"progress\":1}\n\n".as_slice()),
            Ok(b"data: {\"event\":\"result\"}".as_slice()),
        ];
        let frames: Vec<_> = sse_frames(stream::iter(chunks)).collect().await;
        assert_eq!(
            frames,
            vec![
                Ok("{\"event\":\"progress\",\"progress\":1}".to_string()),
                Ok("{\"event\":\"result\"}".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn chunk_error_ends_the_stream() {
        let chunks: Vec<Result<&'static [u8], String>> = vec![
            Ok(b"data: {\"event\":\"started\"}\n".as_slice()),
            Err("connection reset".to_string()),
            Ok(b"data: {\"event\":\"result\"}\n".as_slice()),
        ];
        let frames: Vec<_> = sse_frames(stream::iter(chunks)).collect().await;
        assert_eq!(
            frames,
            vec![
                Ok("{\"event\":\"started\"}".to_string()),
                Err(BackendError::Transport("connection reset".to_string())),
            ]
        );
    }
}
