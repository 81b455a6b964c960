/*!
 * Parsing of model output.
 *
 * Turns the text returned by the completion API into an `id -> text` mapping,
 * and decodes server-sent-event streams into content deltas. Everything here
 * is pure and does no I/O.
 */

use std::collections::HashMap;

use bytes::BytesMut;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::lines::ID_DELIMITER;

/// Identifier to translated text for one batch
pub type TranslationMapping = HashMap<String, String>;

/// `12. text`, `12) text`, `12 | text`, `12: text`, `12> text`, `12] text`
static NUMBERED_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s*[|:>.)\]]\s*(.*)$").unwrap()
});

/// Sentinel payload ending a stream
const STREAM_DONE: &str = "[DONE]";

/// Parse a whole response payload into a mapping.
///
/// Lines with `:::` are split on the first occurrence. Other lines are tried
/// against the numbered-line fallback. Anything else is ignored. Later
/// duplicates win.
pub fn parse_translation_map(payload: &str) -> TranslationMapping {
    let mut mapping = TranslationMapping::new();

    for line in payload.trim().lines() {
        if let Some((id, text)) = parse_line(line) {
            mapping.insert(id, text);
        }
    }

    mapping
}

fn parse_line(line: &str) -> Option<(String, String)> {
    if let Some((id, text)) = line.split_once(ID_DELIMITER) {
        return Some((id.trim().to_string(), text.trim().to_string()));
    }

    let captures = NUMBERED_LINE_REGEX.captures(line.trim())?;
    Some((captures[1].to_string(), captures[2].trim().to_string()))
}

/// One decoded stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental content
    Delta(String),
    /// The terminal sentinel was received
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkFrame {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Network chunks may end anywhere, including in the middle of a line or of a
/// multi-byte character, so bytes are buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the events completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            if let Some(event) = decode_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that had no newline
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let rest = self.buffer.split();
        decode_line(&String::from_utf8_lossy(&rest)).into_iter().collect()
    }
}

/// Decode one SSE line. Comments, other fields, empty deltas and malformed
/// JSON yield nothing.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
    let data = line.trim().strip_prefix("data:")?.trim();

    if data == STREAM_DONE {
        return Some(StreamEvent::Done);
    }

    let frame: ChunkFrame = serde_json::from_str(data).ok()?;
    let content = frame.choices.into_iter().next()?.delta?.content?;
    if content.is_empty() {
        None
    } else {
        Some(StreamEvent::Delta(content))
    }
}
