//! Genspark event-stream decoding.
//!
//! The ask endpoint answers with newline separated `data: {json}` lines. Each
//! JSON object carries a `type` discriminator; only three of them matter:
//!
//! - `project_start`: opens an upstream project (session) with an `id`
//! - `message_field_delta`: incremental text for a named field
//! - `message_result`: the final answer, ends the stream
//!
//! Anything else (other SSE fields, blank lines, malformed JSON, unknown
//! types) is noise and decodes to [`UpstreamEvent::Other`].

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::fmt::Display;

use crate::error::ProxyError;

pub const DATA_PREFIX: &str = "data: ";
pub const ANSWER_FIELD: &str = "session_state.answer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    SessionStart { id: String },
    FieldDelta { field_name: String, delta: String },
    Result { content: String },
    Other,
}

impl UpstreamEvent {
    /// Decode one line of the upstream body.
    pub fn parse(line: &str) -> Self {
        let Some(data) = line.trim().strip_prefix(DATA_PREFIX) else {
            return Self::Other;
        };
        let Ok(event) = serde_json::from_str::<Value>(data) else {
            return Self::Other;
        };

        match event.get("type").and_then(Value::as_str) {
            Some("project_start") => Self::SessionStart {
                id: string_field(&event, "id").unwrap_or_default(),
            },
            Some("message_field_delta") => {
                let field_name = string_field(&event, "field_name");
                let delta = string_field(&event, "delta");
                match (field_name, delta) {
                    (Some(field_name), Some(delta)) if field_name == ANSWER_FIELD => {
                        Self::FieldDelta { field_name, delta }
                    }
                    _ => Self::Other,
                }
            }
            Some("message_result") => Self::Result {
                content: string_field(&event, "content").unwrap_or_default(),
            },
            _ => Self::Other,
        }
    }

    pub fn is_other(&self) -> bool {
        matches!(self, Self::Other)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. })
    }
}

fn string_field(event: &Value, name: &str) -> Option<String> {
    event.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Decode a streamed upstream body into meaningful events.
///
/// Lines may span chunk boundaries. Decoding stops after the first
/// `Result`; a transport error ends the stream with an `Err` item.
pub fn decode_events<S, E>(body: S) -> impl Stream<Item = Result<UpstreamEvent, ProxyError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut body = Box::pin(body);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(ProxyError::Stream(format!("failed to read upstream body: {}", e)));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let event = UpstreamEvent::parse(&String::from_utf8_lossy(&line));
                if event.is_other() {
                    continue;
                }
                let terminal = event.is_terminal();
                yield Ok(event);
                if terminal {
                    return;
                }
            }
        }

        if !buffer.is_empty() {
            let event = UpstreamEvent::parse(&String::from_utf8_lossy(&buffer));
            if !event.is_other() {
                yield Ok(event);
            }
        }
    }
}

/// Scan a fully buffered body for the first `message_result` content.
pub fn find_result(body: &str) -> Option<String> {
    body.lines().find_map(|line| match UpstreamEvent::parse(line) {
        UpstreamEvent::Result { content } => Some(content),
        _ => None,
    })
}
