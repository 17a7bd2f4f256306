//! Incremental Server-Sent Events decoder
//!
//! Feeds on raw byte chunks as they arrive from an HTTP body and yields
//! complete events. Framing follows the text/event-stream format:
//! `id:`/`event:`/`data:` field lines, a blank line terminates one event,
//! `:`-prefixed lines are comments.

use bytes::Bytes;

/// One decoded SSE event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    /// The last `id:` field of the event, if any
    pub(crate) id: Option<String>,

    /// The `event:` field, if any
    pub(crate) event: Option<String>,

    /// Concatenated `data:` lines, newline-joined
    pub(crate) data: String,
}

/// Incremental decoder over arbitrarily-chunked SSE bytes.
///
/// The buffer stays raw so a chunk boundary inside a multi-byte character
/// cannot corrupt the payload.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    current: SseEvent,
    has_data: bool,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    /// Feeds one chunk and returns every event completed by it.
    pub(crate) fn feed(&mut self, chunk: &Bytes) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if !self.has_data && self.current.id.is_none() && self.current.event.is_none() {
                return None;
            }
            self.has_data = false;
            return Some(std::mem::take(&mut self.current));
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                if self.has_data {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.current.event = Some(value.into()),
            "id" => self.current.id = Some(value.into()),
            _ => (),
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(decoder: &mut SseDecoder, chunk: &str) -> Vec<SseEvent> {
        decoder.feed(&Bytes::copy_from_slice(chunk.as_bytes()))
    }

    #[test]
    fn it_decodes_a_single_event() {
        let mut decoder = SseDecoder::new();

        let events = feed_str(&mut decoder, "id: 1\ndata: {\"x\":1}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_deref(), Some("1"));
        assert_eq!(events[0].data, r#"{"x":1}"#);
    }

    #[test]
    fn it_reassembles_events_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(feed_str(&mut decoder, "id: 2\nda").is_empty());
        assert!(feed_str(&mut decoder, "ta: hello").is_empty());
        let events = feed_str(&mut decoder, "\n\nid: 3\ndata: world\n\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "hello");
        assert_eq!(events[1].id.as_deref(), Some("3"));
        assert_eq!(events[1].data, "world");
    }

    #[test]
    fn it_joins_multiple_data_lines_with_newline() {
        let mut decoder = SseDecoder::new();

        let events = feed_str(&mut decoder, "data: a\ndata: b\n\n");

        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn it_ignores_comments_and_unknown_fields() {
        let mut decoder = SseDecoder::new();

        let events = feed_str(&mut decoder, ": keep-alive\nretry: 500\ndata: x\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn it_skips_blank_lines_between_events() {
        let mut decoder = SseDecoder::new();

        let events = feed_str(&mut decoder, "\n\ndata: x\n\n\n");

        assert_eq!(events.len(), 1);
    }

    #[test]
    fn it_handles_crlf_line_endings() {
        let mut decoder = SseDecoder::new();

        let events = feed_str(&mut decoder, "id: 7\r\ndata: y\r\n\r\n");

        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].data, "y");
    }
}
