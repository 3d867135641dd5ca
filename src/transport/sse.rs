//! Incremental SSE frame decoder (Bytes -> frames)
//!
//! Framing only: splits the byte stream into server-sent events, pairing
//! each `data:` payload with its optional `event:` name. Payload JSON is
//! parsed one layer up, in [`super::wire`].

use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};

use crate::BoxStream;

/// Terminal marker some endpoints send instead of just closing the stream.
const DONE_SIGNAL: &str = "[DONE]";

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, when the frame carried one.
    pub event: Option<String>,
    /// Joined `data:` payload.
    pub data: String,
}

/// Decode a byte stream into SSE frames.
///
/// Frames are delimited by a blank line. Within a frame, comment lines
/// (leading `:`) are dropped, multiple `data:` lines are joined with a
/// newline, and a `data: [DONE]` payload ends the stream. Frames without
/// any data (heartbeats) are skipped. A partial frame still buffered at
/// EOF is flushed as a final frame.
///
/// Chunks are buffered as raw bytes and decoded to text one extracted frame
/// at a time; a multi-byte UTF-8 sequence split across chunk boundaries
/// reassembles intact.
pub fn decode_sse(input: BoxStream<'static, Bytes>) -> BoxStream<'static, SseFrame> {
    let frames = stream::unfold(
        (input, BytesMut::new()),
        move |(mut input, mut buf)| async move {
            loop {
                if let Some((idx, delim_len)) = frame_boundary(&buf) {
                    let raw = buf.split_to(idx + delim_len);
                    match parse_frame(&String::from_utf8_lossy(&raw[..idx])) {
                        FrameOutcome::Frame(frame) => return Some((Ok(frame), (input, buf))),
                        FrameOutcome::Done => return None,
                        FrameOutcome::Empty => continue,
                    }
                }

                match input.next().await {
                    Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                    Some(Err(e)) => return Some((Err(e), (input, buf))),
                    None => {
                        // EOF: flush whatever is still buffered
                        return match parse_frame(&String::from_utf8_lossy(&buf)) {
                            FrameOutcome::Frame(frame) => {
                                Some((Ok(frame), (input, BytesMut::new())))
                            }
                            FrameOutcome::Done | FrameOutcome::Empty => None,
                        };
                    }
                }
            }
        },
    );
    Box::pin(frames)
}

enum FrameOutcome {
    Frame(SseFrame),
    Done,
    Empty,
}

/// Position and length of the earliest frame delimiter, LF or CRLF style.
fn frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    match (find(buf, b"\n\n"), find(buf, b"\r\n\r\n")) {
        (Some(lf), Some(crlf)) if crlf < lf => Some((crlf, 4)),
        (Some(lf), _) => Some((lf, 2)),
        (None, Some(crlf)) => Some((crlf, 4)),
        (None, None) => None,
    }
}

fn find(buf: &[u8], needle: &[u8]) -> Option<usize> {
    buf.windows(needle.len()).position(|window| window == needle)
}

fn parse_frame(raw: &str) -> FrameOutcome {
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = field_value(line, "event") {
            event = Some(value.to_string());
        } else if let Some(value) = field_value(line, "data") {
            data_lines.push(value);
        }
    }

    if data_lines.is_empty() {
        return FrameOutcome::Empty;
    }
    let data = data_lines.join("\n");
    if data.trim() == DONE_SIGNAL {
        return FrameOutcome::Done;
    }
    FrameOutcome::Frame(SseFrame { event, data })
}

/// `"data: x"` / `"data:x"` -> `Some("x")` for the named field.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn byte_stream(chunks: Vec<&'static str>) -> BoxStream<'static, Bytes> {
        Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))),
        ))
    }

    async fn collect(chunks: Vec<&'static str>) -> Vec<SseFrame> {
        decode_sse(byte_stream(chunks))
            .map(|f| f.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn frames_split_on_blank_lines() {
        let frames = collect(vec!["data: {\"a\":1}\n\ndata: {\"b\":2}\n\n"]).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "{\"a\":1}");
        assert_eq!(frames[1].data, "{\"b\":2}");
        assert_eq!(frames[0].event, None);
    }

    #[tokio::test]
    async fn frames_reassemble_across_chunk_boundaries() {
        let frames = collect(vec!["data: {\"a\":", "1}\n", "\ndata: {\"b\":2}\n\n"]).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "{\"a\":1}");
    }

    #[tokio::test]
    async fn event_names_pair_with_their_data() {
        let frames = collect(vec![
            "event: thread.run.created\ndata: {\"id\":\"run_1\"}\n\n",
            "event: thread.message.delta\ndata: {\"id\":\"msg_1\"}\n\n",
        ])
        .await;
        assert_eq!(frames[0].event.as_deref(), Some("thread.run.created"));
        assert_eq!(frames[1].event.as_deref(), Some("thread.message.delta"));
    }

    #[tokio::test]
    async fn done_signal_ends_the_stream() {
        let frames = collect(vec![
            "data: {\"a\":1}\n\ndata: [DONE]\n\ndata: {\"never\":true}\n\n",
        ])
        .await;
        assert_eq!(frames.len(), 1);
    }

    #[tokio::test]
    async fn comments_and_heartbeats_are_skipped() {
        let frames = collect(vec![
            ": keep-alive\n\n",
            "event: ping\n\n",
            ": note\ndata: {\"a\":1}\n\n",
        ])
        .await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"a\":1}");
    }

    #[tokio::test]
    async fn crlf_lines_and_partial_eof_frames_decode() {
        let frames = collect(vec!["data: {\"a\":1}\r\n\r\n", "data: {\"tail\":true}"]).await;
        // the second frame has no trailing blank line and flushes at EOF
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].data, "{\"tail\":true}");
    }

    #[tokio::test]
    async fn multi_line_data_joins_with_newline() {
        let frames = collect(vec!["data: line one\ndata: line two\n\n"]).await;
        assert_eq!(frames[0].data, "line one\nline two");
    }

    #[tokio::test]
    async fn multibyte_characters_split_across_chunks_reassemble() {
        // the é of "café" and the ° of "35°C" each straddle a chunk boundary
        let input: BoxStream<'static, Bytes> = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"data: caf\xC3")),
            Ok(Bytes::from_static(b"\xA9\n\ndata: 35\xC2")),
            Ok(Bytes::from_static(b"\xB0C\n\n")),
        ]));
        let frames: Vec<SseFrame> = decode_sse(input).map(|f| f.unwrap()).collect().await;
        assert_eq!(frames[0].data, "café");
        assert_eq!(frames[1].data, "35°C");
    }
}
