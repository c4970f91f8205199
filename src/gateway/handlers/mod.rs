//! HTTP 请求处理器

pub mod health;
pub mod library;
pub mod provocation;

pub use health::handle_health;
pub use library::{
    handle_provocations, handle_score_vote, handle_tally_vote, handle_thinkers, handle_unvoted,
};
pub use provocation::handle_generate_provocation;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::relay::RelayError;

pub const MISSING_CREDENTIAL_MESSAGE: &str = "Gemini API key not configured on the server.";
pub const RELAY_FAILURE_MESSAGE: &str = "Failed to generate provocation via proxy.";
pub const INVALID_BODY_MESSAGE: &str = "Invalid request body.";

/// 客户端可见的错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

pub fn error_response(
    status: StatusCode,
    error: &'static str,
    details: Option<String>,
) -> axum::response::Response {
    (status, Json(ErrorResponse { error, details })).into_response()
}

impl IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        match self {
            RelayError::MissingCredential => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                MISSING_CREDENTIAL_MESSAGE,
                None,
            ),
            RelayError::Upstream(err) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                RELAY_FAILURE_MESSAGE,
                Some(format!("{:#}", err)),
            ),
        }
    }
}
