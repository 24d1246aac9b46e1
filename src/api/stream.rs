use crate::types::event::KIND_MESSAGE;
use crate::types::Frame;
use serde_json::{Map, Value};

const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Incremental decoder for `event:`/`data:` records separated by a blank line.
///
/// Bytes are buffered raw so a multi-byte character split across chunks
/// decodes exactly as if it had arrived whole.
#[derive(Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Offset already known to hold no delimiter.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;

        while let Some(end) = find_delimiter(&self.buffer[search_from..]) {
            let block_end = search_from + end;
            let block = String::from_utf8_lossy(&self.buffer[start..block_end]);
            if let Some(frame) = parse_block(&block) {
                frames.push(frame);
            }
            start = block_end + FRAME_DELIMITER.len();
            search_from = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        self.scanned = self
            .buffer
            .len()
            .saturating_sub(FRAME_DELIMITER.len() - 1);

        frames
    }

    /// Discards whatever incomplete record is still buffered and returns
    /// how many bytes were dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.scanned = 0;
        dropped
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(FRAME_DELIMITER.len())
        .position(|window| window == FRAME_DELIMITER)
}

fn parse_block(block: &str) -> Option<Frame> {
    let mut kind = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut saw_field = false;

    for raw_line in block.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.trim().is_empty() || line.starts_with(':') {
            continue;
        }
        saw_field = true;
        if let Some(rest) = line.strip_prefix("event:") {
            kind = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if !saw_field {
        return None;
    }

    let kind = kind
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| KIND_MESSAGE.to_string());
    let payload = parse_payload(&kind, &data_lines);
    Some(Frame { kind, payload })
}

fn parse_payload(kind: &str, data_lines: &[&str]) -> Value {
    if data_lines.is_empty() {
        return empty_payload();
    }
    let data = data_lines.join("\n");
    match serde_json::from_str::<Value>(data.trim()) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(event_type = kind, %error, data = %data, "frame payload is not valid JSON");
            empty_payload()
        }
    }
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}
