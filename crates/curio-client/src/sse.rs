//! Incremental Server-Sent Events frame parser.

/// One dispatched SSE frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    /// `event:` field; defaults to `message` when absent.
    pub event: String,
    /// `data:` lines joined with newlines.
    pub data: String,
    /// Optional `id:` field.
    pub id: Option<String>,
}

/// Streaming parser tolerant of arbitrary chunk boundaries.
///
/// Feed raw bytes as they arrive; complete frames come back as soon as their
/// terminating blank line is seen. Comment lines (leading `:`) are ignored.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(line) = self.take_line() {
            if line.is_empty() {
                if let Some(frame) = self.flush() {
                    frames.push(frame);
                }
                continue;
            }
            self.field(&line);
        }
        frames
    }

    /// Pop one complete line from the buffer, stripping the line ending.
    fn take_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|byte| *byte == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn field(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match name {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
    }

    fn flush(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data.is_empty() && self.id.is_none() {
            return None;
        }
        let frame = SseFrame {
            event: self.event.take().unwrap_or_else(|| "message".to_string()),
            data: self.data.join("\n"),
            id: self.id.take(),
        };
        self.data.clear();
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_complete_frame() {
        let mut parser = SseParser::new();
        let frames = parser.push(
            b"event: text_chunk\ndata: {\"content\":\"Hi\",\"partial\":true}\nid: abc\n\n",
        );
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "text_chunk".to_string(),
                data: "{\"content\":\"Hi\",\"partial\":true}".to_string(),
                id: Some("abc".to_string()),
            }]
        );
    }

    #[test]
    fn reassembles_frames_split_across_chunks() {
        let mut parser = SseParser::new();
        assert_eq!(parser.push(b"event: comp"), Vec::new());
        assert_eq!(parser.push(b"letion\ndata: {\"turn"), Vec::new());
        let frames = parser.push(b"_id\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "completion".to_string());
        assert_eq!(frames[0].data, "{\"turn_id\":1}".to_string());
    }

    #[test]
    fn joins_multiple_data_lines_and_skips_comments() {
        let mut parser = SseParser::new();
        let frames = parser.push(b": keepalive\nevent: error\ndata: line1\ndata: line2\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "line1\nline2".to_string());
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut parser = SseParser::new();
        let frames = parser.push(b"event: connection\r\ndata: {}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "connection".to_string());
        assert_eq!(frames[0].data, "{}".to_string());
    }

    #[test]
    fn blank_lines_without_fields_emit_nothing() {
        let mut parser = SseParser::new();
        assert_eq!(parser.push(b"\n\n\n"), Vec::new());
    }
}
