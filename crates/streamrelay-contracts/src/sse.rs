//! Incremental Server-Sent Events decoder
//!
//! Network chunks do not line up with SSE lines, events or even UTF-8
//! characters. The decoder keeps raw bytes until a full line is available,
//! so multi-byte characters split across chunks are reassembled before any
//! text is produced.
//!
//! Lines may end in `\n` or `\r\n`. Only `data` and `event` fields are
//! interpreted; `id`, `retry` and unknown fields are dropped.
//!
//! A line still unterminated after [`DEFAULT_MAX_LINE_LEN`] bytes is dropped
//! up to its next newline, so a peer that never ends a line cannot grow the
//! buffer without bound.

/// Longest line the decoder holds while waiting for its terminator
pub const DEFAULT_MAX_LINE_LEN: usize = 1024 * 1024;

/// One decoded SSE block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A dispatched event. Multiple `data:` lines are joined with `\n`.
    Message { event: Option<String>, data: String },
    /// A `:`-prefixed line, typically a keepalive
    Comment(String),
}

impl SseEvent {
    pub fn data(&self) -> Option<&str> {
        match self {
            Self::Message { data, .. } => Some(data),
            Self::Comment(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    max_line_len: usize,
    /// Skipping the tail of an overlong line
    discarding: bool,
    dropped_lines: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event: None,
            data: Vec::new(),
            max_line_len,
            discarding: false,
            dropped_lines: 0,
        }
    }

    /// Feed one chunk and return every event it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        let chunk = if self.discarding {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    &chunk[end + 1..]
                }
                None => return events,
            }
        } else {
            chunk
        };
        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = decode_line(&self.buffer[start..end]);
            self.process_line(&line, &mut events);
            start = end + 1;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > self.max_line_len {
            self.buffer.clear();
            self.discarding = true;
            self.dropped_lines += 1;
        }

        events
    }

    /// Flush whatever is left once the byte stream has ended.
    ///
    /// A trailing line without newline is processed, and a pending event
    /// missing its blank-line terminator is dispatched.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        self.discarding = false;
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = decode_line(&rest);
            self.process_line(&line, &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    /// Bytes held back waiting for a line terminator
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Lines dropped for exceeding the maximum line length
    pub fn dropped_lines(&self) -> usize {
        self.dropped_lines
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }

        if let Some(comment) = line.strip_prefix(':') {
            let comment = comment.strip_prefix(' ').unwrap_or(comment);
            events.push(SseEvent::Comment(comment.to_string()));
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        let event = self.event.take();
        if self.data.is_empty() {
            return;
        }

        let data = self.data.join("\n");
        self.data.clear();
        events.push(SseEvent::Message { event, data });
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(data: &str) -> SseEvent {
        SseEvent::Message {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: hello\n\n");
        assert_eq!(events, vec![message("hello")]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: {\"a\":").is_empty());
        assert!(decoder.push(b"1}\n").is_empty());
        assert_eq!(decoder.push(b"\ndata: next"), vec![message("{\"a\":1}")]);
        assert_eq!(decoder.push(b"\n\n"), vec![message("next")]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let text = "data: héllo 🌍\n\n".as_bytes();
        // Split inside the 4-byte emoji
        let split = text.len() - 4;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&text[..split]).is_empty());
        assert_eq!(decoder.push(&text[split..]), vec![message("héllo 🌍")]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let wire = b"event: error\ndata: {\"message\":\"m\"}\n\ndata: [DONE]\n\n";
        let mut decoder = SseDecoder::new();
        let events: Vec<_> = wire
            .iter()
            .flat_map(|b| decoder.push(std::slice::from_ref(b)))
            .collect();

        assert_eq!(
            events,
            vec![
                SseEvent::Message {
                    event: Some("error".to_string()),
                    data: "{\"message\":\"m\"}".to_string(),
                },
                message("[DONE]"),
            ]
        );
    }

    #[test]
    fn test_crlf_and_no_space_after_colon() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data:compact\r\n\r\n");
        assert_eq!(events, vec![message("compact")]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: one\ndata: two\n\n");
        assert_eq!(events, vec![message("one\ntwo")]);
    }

    #[test]
    fn test_comments_are_reported_and_do_not_dispatch() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keepalive\n\n:\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Comment("keepalive".to_string()),
                SseEvent::Comment(String::new()),
            ]
        );
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"id: 7\nretry: 100\ndata: x\n\n");
        assert_eq!(events, vec![message("x")]);
    }

    #[test]
    fn test_event_name_does_not_leak_into_next_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: error\n\ndata: plain\n\n");
        assert_eq!(events, vec![message("plain")]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), vec![message("tail")]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut decoder = SseDecoder::with_max_line_len(16);

        assert!(decoder.push(b"data: {\"token\":\"aaaaaaaa").is_empty());
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.dropped_lines(), 1);

        // Rest of the overlong line is skipped, the next event decodes
        assert!(decoder.push(b"aaaaaaaaaaaaaaaa\"}").is_empty());
        let events = decoder.push(b"\n\ndata: ok\n\n");
        assert_eq!(events, vec![message("ok")]);
        assert_eq!(decoder.dropped_lines(), 1);
    }

    #[test]
    fn test_pending_stays_bounded_without_newlines() {
        let mut decoder = SseDecoder::with_max_line_len(64);
        for _ in 0..100 {
            decoder.push(&[b'x'; 50]);
            assert!(decoder.pending_len() <= 64);
        }
        assert_eq!(decoder.dropped_lines(), 1);
        assert!(decoder.finish().is_empty());
    }
}
