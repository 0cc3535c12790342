//! Non-streaming aggregation.

use crate::decoder::find_result;
use crate::error::ProxyError;
use crate::types::ChatCompletionResponse;

/// Build a `chat.completion` from a fully buffered upstream body.
///
/// Only the first `message_result` counts; deltas are ignored since the
/// result already carries the whole answer.
pub fn collect_completion(body: &str, model: &str) -> Result<ChatCompletionResponse, ProxyError> {
    match find_result(body) {
        Some(content) if !content.is_empty() => Ok(ChatCompletionResponse::assistant(model, content)),
        _ => Err(ProxyError::EmptyCompletion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn result_among_noise_becomes_completion() {
        let body = concat!(
            "data: {\"type\":\"project_start\",\"id\":\"p1\"}\n",
            "\n",
            "data: {\"type\":\"message_field_delta\",\"field_name\":\"session_state.answer\",\"delta\":\"hel\"}\n",
            "data: {broken\n",
            "data: {\"type\":\"message_result\",\"content\":\"hello\"}\n",
        );

        let resp = collect_completion(body, "claude-3-5-sonnet").unwrap();
        assert_eq!(resp.object, "chat.completion");
        assert_eq!(resp.model, "claude-3-5-sonnet");
        assert_eq!(resp.choices.len(), 1);
        assert_eq!(resp.choices[0].message.role, Role::Assistant);
        assert_eq!(resp.choices[0].message.content, "hello");
        assert_eq!(resp.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(resp.id.starts_with("chatcmpl-"));
    }

    #[test]
    fn missing_result_is_an_error() {
        let body = "data: {\"type\":\"project_start\",\"id\":\"p1\"}\n";
        let err = collect_completion(body, "gpt-4o").unwrap_err();
        assert!(matches!(err, ProxyError::EmptyCompletion));
        assert_eq!(err.to_string(), "No valid response content");
    }

    #[test]
    fn empty_result_is_an_error() {
        let body = "data: {\"type\":\"message_result\",\"content\":\"\"}\n";
        assert!(matches!(
            collect_completion(body, "gpt-4o"),
            Err(ProxyError::EmptyCompletion)
        ));
    }
}
