use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };

use crate::agent::AgentError;

/// Body sent for every failure that is not the caller's fault.
pub const GENERIC_ERROR_BODY: &str = "Error processing request";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Too many requests")]
    RateLimited,
    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::RateLimited =>
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response(),
            ApiError::Agent(AgentError::EmptyConversation) =>
                (StatusCode::BAD_REQUEST, AgentError::EmptyConversation.to_string()).into_response(),
            // details were already logged with the request id
            ApiError::Agent(_) =>
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_BODY).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failures_hide_details() {
        let resp = ApiError::Agent(AgentError::Completion("key sk-123 rejected".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn empty_conversation_is_the_callers_fault() {
        let resp = ApiError::Agent(AgentError::EmptyConversation).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
