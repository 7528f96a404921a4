//! Server-Sent Events (SSE) parsing utilities.

/// One complete SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// The `id:` field.
    pub id: Option<String>,
    /// The `event:` field.
    pub event: Option<String>,
    /// The `data:` lines joined with `\n`.
    pub data: String,
}

/// Incremental SSE parser.
///
/// Chunks are pushed as they arrive from the network; complete events
/// (terminated by a blank line) are returned and partial ones stay buffered.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    last_event_id: Option<String>,
}

impl SseParser {
    /// Create an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent event id seen.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Bytes buffered for an incomplete event.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a chunk and return every event it completes.
    pub fn push(&mut self, chunk: &str) -> Vec<SseEvent> {
        // Normalize CRLF so the blank-line delimiter is always "\n\n".
        if chunk.contains('\r') {
            self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(chunk);
        }

        let mut events = Vec::new();
        while let Some(event_end) = self.buffer.find("\n\n") {
            let raw: String = self.buffer.drain(..event_end + 2).collect();
            if let Some(event) = self.parse_event(&raw[..event_end]) {
                events.push(event);
            }
        }
        events
    }

    fn parse_event(&mut self, raw: &str) -> Option<SseEvent> {
        let mut event = SseEvent::default();
        let mut data_lines = Vec::new();

        for line in raw.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "id" => event.id = Some(value.to_string()),
                "event" => event.event = Some(value.to_string()),
                "data" => data_lines.push(value),
                _ => {}
            }
        }

        if let Some(id) = &event.id {
            self.last_event_id = Some(id.clone());
        }
        if data_lines.is_empty() {
            return None;
        }
        event.data = data_lines.join("\n");
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events =
            parser.push("id: evt-001\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_deref(), Some("evt-001"));
        assert_eq!(events[0].data, "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}");
        assert_eq!(parser.last_event_id(), Some("evt-001"));
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_multiple_events_and_multiline_data() {
        let mut parser = SseParser::new();
        let events = parser.push("id: 1\ndata: a\n\nevent: note\ndata: b\ndata: c\n\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event.as_deref(), Some("note"));
        assert_eq!(events[1].data, "b\nc");
        assert_eq!(parser.last_event_id(), Some("1"));
    }

    #[test]
    fn test_incomplete_event_is_buffered() {
        let mut parser = SseParser::new();
        assert!(parser.push("id: evt-001\ndata: {\"jsonrpc\"").is_empty());
        assert!(parser.last_event_id().is_none());
        assert!(parser.buffered() > 0);

        let events = parser.push(":\"2.0\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"jsonrpc\":\"2.0\"}");
    }

    #[test]
    fn test_comments_and_crlf() {
        let mut parser = SseParser::new();
        let events = parser.push(": keep-alive\r\n\r\ndata: x\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }
}
