// Incremental server-sent-events decoder for upstream chat streams.
// Bytes arrive in arbitrary chunks; complete lines are drained from the buffer
// and the remainder is kept for the next chunk.

use bytes::BytesMut;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field, `"message"` when absent
    pub event: String,
    /// `data:` lines joined with `\n`
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: BytesMut,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            let line = strip_line_ending(&line);
            // complete lines never split a multi-byte char
            let line = String::from_utf8_lossy(line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing unterminated line and any pending event at end of stream.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(strip_line_ending(&rest)).into_owned();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id / retry carry nothing the relay uses
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        let event = self.event.take().unwrap_or_else(|| "message".to_string());
        Some(SseEvent { event, data })
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Frame an outgoing SSE event.
pub fn format_sse(event: &str, data: &serde_json::Value) -> String {
    format!(
        "event: {}\ndata: {}\n\n",
        event,
        serde_json::to_string(data).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: {\"a\":1}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "message".into(),
                data: "{\"a\":1}".into()
            }]
        );
    }

    #[test]
    fn test_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"da").is_empty());
        assert!(parser.feed(b"ta: hel").is_empty());
        assert!(parser.feed(b"lo\n").is_empty());
        let events = parser.feed(b"\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keep-alive\r\nevent: update\r\ndata: x\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "update");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_multiline_data() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: 1\n\ndata: 2\n\ndata: [DONE]\n\n");
        let data: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["1", "2", "[DONE]"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: tail").is_empty());
        let event = parser.finish().unwrap();
        assert_eq!(event.data, "tail");
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_multibyte_split_between_chunks() {
        let bytes = "data: 你好\n\n".as_bytes();
        let mut parser = SseParser::new();
        // split inside the first CJK character
        assert!(parser.feed(&bytes[..7]).is_empty());
        let events = parser.feed(&bytes[7..]);
        assert_eq!(events[0].data, "你好");
    }

    #[test]
    fn test_format_sse() {
        let framed = format_sse("finish", &serde_json::json!({"text": "hi"}));
        assert_eq!(framed, "event: finish\ndata: {\"text\":\"hi\"}\n\n");
    }

    proptest! {
        /// Chunk boundaries never change what is decoded.
        #[test]
        fn prop_chunking_is_transparent(
            payloads in proptest::collection::vec("[a-zA-Z0-9 {}\":,]{1,20}", 1..6),
            split in 1usize..16,
        ) {
            let wire: String = payloads.iter().map(|p| format!("data: {}\n\n", p)).collect();
            let mut parser = SseParser::new();
            let mut got = Vec::new();
            for chunk in wire.as_bytes().chunks(split) {
                got.extend(parser.feed(chunk).into_iter().map(|e| e.data));
            }
            prop_assert_eq!(got, payloads);
        }
    }
}
