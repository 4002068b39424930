//! Server-Sent Events framing.
//!
//! [`SseDecoder`] turns raw bytes into logical event payloads: `data:` lines
//! accumulate until a blank line, multi-line data is joined with `\n`, and a
//! `[DONE]` payload becomes [`SseFrame::Done`]. Once the sentinel has been
//! seen the decoder ignores everything after it, so a transport that closes
//! (cleanly or not) right after `[DONE]` never surfaces as an error.

use futures::{Stream, StreamExt};

use crate::error::PilotError;

const DONE_SENTINEL: &str = "[DONE]";

/// One logical SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Joined `data:` payload of one event.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Incremental, line-oriented SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk of bytes, returning every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    /// Flush trailing lines and the pending event at end of input.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        if self.done {
            return Vec::new();
        }
        let mut frames = self.drain_lines(true);
        if !self.done && !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).into_owned();
            frames.extend(self.handle_line(&line));
        }
        if !self.done {
            frames.extend(self.dispatch());
        }
        frames
    }

    fn drain_lines(&mut self, at_eof: bool) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        while let Some(line) = self.next_line(at_eof) {
            if let Some(frame) = self.handle_line(&line) {
                let is_done = frame == SseFrame::Done;
                frames.push(frame);
                if is_done {
                    self.buffer.clear();
                    break;
                }
            }
        }
        frames
    }

    /// Next complete line. `\n`, `\r\n` and a bare `\r` all end a line.
    fn next_line(&mut self, at_eof: bool) -> Option<String> {
        let pos = self
            .buffer
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')?;
        let terminator = if self.buffer[pos] == b'\r' {
            match self.buffer.get(pos + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                None if at_eof => 1,
                // May be the first half of a CRLF split across chunks.
                None => return None,
            }
        } else {
            1
        };
        let raw: Vec<u8> = self.buffer.drain(..pos + terminator).collect();
        Some(String::from_utf8_lossy(&raw[..pos]).into_owned())
    }

    fn handle_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        // Other fields (event:, id:, retry:) carry nothing we use.
        if let Some(data) = line.strip_prefix("data:") {
            let value = data.strip_prefix(' ').unwrap_or(data);
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.data_lines.is_empty() {
            return None;
        }
        let payload = self.data_lines.join("\n");
        self.data_lines.clear();
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == DONE_SENTINEL {
            self.done = true;
            return Some(SseFrame::Done);
        }
        Some(SseFrame::Data(payload))
    }
}

/// Decode a byte stream into a lazy, finite sequence of frames.
///
/// The sequence ends right after [`SseFrame::Done`] without polling the
/// source again. A source error before the sentinel is yielded once and
/// ends the sequence; a clean end of input just ends it.
pub fn decode_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseFrame, PilotError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<PilotError>,
{
    async_stream::stream! {
        let mut decoder = SseDecoder::new();
        futures::pin_mut!(bytes);

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };
            for frame in decoder.feed(chunk.as_ref()) {
                yield Ok(frame);
            }
            if decoder.is_done() {
                return;
            }
        }

        for frame in decoder.finish() {
            yield Ok(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(input: &str) -> Vec<SseFrame> {
        let mut decoder = SseDecoder::new();
        let mut frames = decoder.feed(input.as_bytes());
        frames.extend(decoder.finish());
        frames
    }

    #[test]
    fn splits_events_on_blank_lines() {
        let frames = feed_all("data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n\n");
        assert_eq!(
            frames,
            vec![
                SseFrame::Data("{\"a\":1}".into()),
                SseFrame::Data("{\"b\":2}".into()),
                SseFrame::Done,
            ]
        );
    }

    #[test]
    fn joins_multi_line_data_with_newline() {
        let frames = feed_all("data: first\ndata: second\n\n");
        assert_eq!(frames, vec![SseFrame::Data("first\nsecond".into())]);
    }

    #[test]
    fn ignores_empty_payloads_comments_and_other_fields() {
        let frames = feed_all(": keep-alive\n\ndata:\n\nevent: chunk\nid: 3\ndata: x\n\n");
        assert_eq!(frames, vec![SseFrame::Data("x".into())]);
    }

    #[test]
    fn handles_crlf_and_split_chunks() {
        let mut decoder = SseDecoder::new();
        let mut frames = decoder.feed(b"da");
        frames.extend(decoder.feed(b"ta: hel"));
        frames.extend(decoder.feed(b"lo\r\n\r"));
        frames.extend(decoder.feed(b"\n"));
        assert_eq!(frames, vec![SseFrame::Data("hello".into())]);
    }

    #[test]
    fn bare_carriage_return_ends_lines() {
        let frames = feed_all("data: one\r\rdata: two\r\r");
        assert_eq!(
            frames,
            vec![SseFrame::Data("one".into()), SseFrame::Data("two".into())]
        );
    }

    #[test]
    fn only_one_leading_space_is_stripped() {
        let frames = feed_all("data:   indented\ndata:tight \n\n");
        assert_eq!(frames, vec![SseFrame::Data("  indented\ntight ".into())]);
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let bytes = "data: 返回\n\n".as_bytes();
        let mut decoder = SseDecoder::new();
        let mut frames = decoder.feed(&bytes[..8]);
        frames.extend(decoder.feed(&bytes[8..]));
        assert_eq!(frames, vec![SseFrame::Data("返回".into())]);
    }

    #[test]
    fn nothing_after_done_is_decoded() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: [DONE]\n\ndata: late\n\n");
        assert_eq!(frames, vec![SseFrame::Done]);
        assert!(decoder.feed(b"data: later\n\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn unterminated_sentinel_is_flushed_at_eof() {
        assert_eq!(feed_all("data: [DONE]"), vec![SseFrame::Done]);
    }

    #[tokio::test]
    async fn error_after_sentinel_is_not_observed() {
        let chunks: Vec<Result<&[u8], PilotError>> = vec![
            Ok(&b"data: {\"x\":1}\n\n"[..]),
            Ok(&b"data: [DONE]\n\n"[..]),
            Err(PilotError::Decode("connection reset".into())),
        ];
        let frames: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[1], Ok(SseFrame::Done)));
    }

    #[tokio::test]
    async fn error_before_sentinel_ends_the_sequence() {
        let chunks: Vec<Result<&[u8], PilotError>> = vec![
            Ok(&b"data: {\"x\":1}\n\n"[..]),
            Err(PilotError::Decode("connection reset".into())),
            Ok(&b"data: [DONE]\n\n"[..]),
        ];
        let frames: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(frames.len(), 2);
        assert!(frames[1].is_err());
    }
}
