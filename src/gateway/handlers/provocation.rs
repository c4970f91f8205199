//! Provocation 处理器

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::gateway::handlers::{error_response, INVALID_BODY_MESSAGE};
use crate::gateway::state::AppState;
use crate::relay::ProvocationRequest;

/// POST /generate-provocation 处理器
///
/// 请求体不检查 Content-Type；成功时原样返回上游响应体。
/// 客户端断开时 future 被丢弃，上游请求随之取消
pub async fn handle_generate_provocation(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match ProvocationRequest::from_body(&body) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "rejected request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                INVALID_BODY_MESSAGE,
                Some(err.to_string()),
            );
        }
    };

    match state.relay().handle(request).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(err) => err.into_response(),
    }
}
