//! Proxy error types

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no session cookie configured")]
    NoCredentials,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("No valid response content")]
    EmptyCompletion,
}

impl ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoCredentials => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            ProxyError::InvalidRequest("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::NoCredentials.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ProxyError::UpstreamStatus {
                status: 502,
                body: "down".into()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::EmptyCompletion.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn empty_completion_message_matches_wire_text() {
        assert_eq!(
            ProxyError::EmptyCompletion.to_string(),
            "No valid response content"
        );
    }
}
