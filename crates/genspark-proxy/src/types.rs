//! OpenAI chat completion wire types.
//!
//! Clients speak (a subset of) OpenAI's `/v1/chat/completions` API. The same
//! message shapes are forwarded to Genspark inside the ask payload, which is
//! why message and part types serialize back to OpenAI's JSON layout.
//!
//! Notes:
//! - `message.content` can be a string shorthand or a list of typed parts.
//!   This is accepted via a `#[serde(untagged)]` enum.
//! - `private_file` parts never come from clients; the attachment resolver
//!   produces them after uploading non-image bytes.

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const FINISH_REASON_STOP: &str = "stop";

/// A message role in the chat completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }
}

/// Either a string shorthand or an ordered list of content parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A content part within `messages[].content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },

    /// Image reference: an http(s) URL, raw base64, or a base64 data URI.
    ImageUrl { image_url: ImageUrl },

    /// A file stored in the upstream's private storage.
    PrivateFile { private_file: PrivateFile },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Descriptor of an uploaded non-image attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: usize,
    pub ext: String,
    pub private_storage_url: String,
}

/// Request body for `/v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

/// Response id in the `chatcmpl-<UTC timestamp>` form.
pub fn completion_id() -> String {
    format!("chatcmpl-{}", Utc::now().format("%Y%m%d%H%M%S"))
}

fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Incremental message content of a streaming chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

/// One `chat.completion.chunk` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    fn new(id: &str, model: &str, delta: Delta, finish_reason: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created: unix_now(),
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }

    /// Assistant content delta.
    pub fn content(id: &str, model: &str, text: impl Into<String>) -> Self {
        let delta = Delta {
            role: Some(Role::Assistant),
            content: Some(text.into()),
        };
        Self::new(id, model, delta, None)
    }

    /// Terminal chunk: empty delta, `finish_reason = "stop"`.
    pub fn stop(id: &str, model: &str) -> Self {
        Self::new(
            id,
            model,
            Delta::default(),
            Some(FINISH_REASON_STOP.to_string()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

/// Response body for non-streaming `/v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
}

impl ChatCompletionResponse {
    pub fn assistant(model: &str, content: impl Into<String>) -> Self {
        Self {
            id: completion_id(),
            object: "chat.completion".to_string(),
            created: unix_now(),
            model: model.to_string(),
            choices: vec![CompletionChoice {
                index: 0,
                message: ResponseMessage {
                    role: Role::Assistant,
                    content: content.into(),
                },
                finish_reason: Some(FINISH_REASON_STOP.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub object: String,
}

/// Response body for `/v1/models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelCard>,
}

impl ModelList {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            object: "list".to_string(),
            data: ids
                .into_iter()
                .map(|id| ModelCard {
                    id: id.into(),
                    object: "model".to_string(),
                })
                .collect(),
        }
    }
}
