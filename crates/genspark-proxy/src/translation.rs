//! OpenAI request -> Genspark ask payload.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::attachment::ResolvedMessage;

pub const CHAT_TYPE: &str = "COPILOT_MOA_CHAT";
pub const CURRENT_QUERY_STRING: &str = "type=chat";

/// Body of `POST /api/copilot/ask`.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub current_query_string: &'static str,
    pub messages: Vec<ResolvedMessage>,
    pub action_params: Map<String, Value>,
    pub extra_data: ExtraData,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtraData {
    pub models: Vec<String>,
    pub run_with_another_model: bool,
    #[serde(rename = "writingContent")]
    pub writing_content: Option<String>,
}

/// Build the ask payload for a single model. No I/O.
pub fn build_ask_request(model: &str, messages: Vec<ResolvedMessage>) -> AskRequest {
    AskRequest {
        kind: CHAT_TYPE,
        current_query_string: CURRENT_QUERY_STRING,
        messages,
        action_params: Map::new(),
        extra_data: ExtraData {
            models: vec![model.to_string()],
            run_with_another_model: false,
            writing_content: None,
        },
    }
}
