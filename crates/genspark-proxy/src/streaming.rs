//! Streaming conversion (SSE).
//!
//! Genspark streams `project_start` / `message_field_delta` /
//! `message_result` events. Clients expect OpenAI `chat.completion.chunk`
//! frames followed by a `[DONE]` marker. [`StreamTranslator`] is the pure
//! state machine; [`translate_stream`] drives it over the decoded upstream
//! body and renders wire frames.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::cleanup::SessionCleanup;
use crate::decoder::UpstreamEvent;
use crate::error::ProxyError;
use crate::types::{completion_id, ChatCompletionChunk};

pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    AwaitStart,
    Streaming,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Chunk(ChatCompletionChunk),
    Done,
}

impl StreamFrame {
    /// Render as an SSE frame: `data: <payload>\n\n`.
    pub fn to_sse(&self) -> Result<String, ProxyError> {
        let payload = match self {
            StreamFrame::Chunk(chunk) => serde_json::to_string(chunk)?,
            StreamFrame::Done => DONE_SENTINEL.to_string(),
        };
        Ok(format!("data: {}\n\n", payload))
    }
}

#[derive(Debug)]
pub struct StreamTranslator {
    response_id: String,
    model: String,
    state: StreamState,
    session_id: Option<String>,
}

impl StreamTranslator {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_id(completion_id(), model)
    }

    pub fn with_id(response_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            response_id: response_id.into(),
            model: model.into(),
            state: StreamState::AwaitStart,
            session_id: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Advance on one event, returning the frames to emit in order.
    pub fn handle(&mut self, event: UpstreamEvent) -> Vec<StreamFrame> {
        if self.state == StreamState::Done {
            return Vec::new();
        }

        match event {
            UpstreamEvent::SessionStart { id } => {
                self.session_id = Some(id);
                self.state = StreamState::Streaming;
                Vec::new()
            }
            UpstreamEvent::FieldDelta { delta, .. } => {
                self.state = StreamState::Streaming;
                vec![StreamFrame::Chunk(ChatCompletionChunk::content(
                    &self.response_id,
                    &self.model,
                    delta,
                ))]
            }
            UpstreamEvent::Result { .. } => {
                self.state = StreamState::Done;
                vec![
                    StreamFrame::Chunk(ChatCompletionChunk::stop(&self.response_id, &self.model)),
                    StreamFrame::Done,
                ]
            }
            UpstreamEvent::Other => Vec::new(),
        }
    }
}

/// Drive `translator` over decoded upstream events, yielding SSE frames.
///
/// `cleanup` fires as soon as the result arrives, ahead of the finish chunk
/// and `[DONE]`; the upstream body is then dropped. If the upstream ends (or
/// fails) before a result arrives, the output simply ends without a finish
/// chunk or `[DONE]`.
pub fn translate_stream<S>(
    events: S,
    mut translator: StreamTranslator,
    cleanup: Option<SessionCleanup>,
) -> impl Stream<Item = Result<Bytes, ProxyError>> + Send
where
    S: Stream<Item = Result<UpstreamEvent, ProxyError>> + Send + 'static,
{
    async_stream::stream! {
        let mut events = Box::pin(events);
        let mut cleanup = cleanup;

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "upstream stream aborted");
                    return;
                }
            };

            let frames = translator.handle(event);
            let done = translator.state() == StreamState::Done;

            // Queued before the final frames go out; the client may drop the
            // body right after reading `[DONE]`.
            if done {
                if let Some(cleanup) = cleanup.take() {
                    cleanup.fire(translator.session_id());
                }
            }

            for frame in frames {
                match frame.to_sse() {
                    Ok(sse) => yield Ok(Bytes::from(sse)),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            if done {
                return;
            }
        }

        debug!(
            session_id = ?translator.session_id(),
            "upstream ended without a result event"
        );
    }
}
