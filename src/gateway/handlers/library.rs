//! Provocation 库浏览和投票接口

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error_response, INVALID_BODY_MESSAGE};
use crate::gateway::state::AppState;
use crate::library::{ScoreEntry, VoteOutcome};
use crate::utils::truncate_for_log;

const MISSING_VOTE_FIELDS_MESSAGE: &str = "Missing id or vote";
const INVALID_ID_MESSAGE: &str = "Invalid provocation id";
const SAVE_FAILURE_MESSAGE: &str = "Failed to save vote.";

pub async fn handle_thinkers(State(state): State<AppState>) -> Json<Value> {
    Json(state.library().thinker_catalog().await)
}

pub async fn handle_provocations(State(state): State<AppState>) -> Response {
    Json(state.library().provocations().await).into_response()
}

pub async fn handle_unvoted(State(state): State<AppState>) -> Response {
    Json(state.library().unvoted().await).into_response()
}

/// `{ "id": <索引>, "vote": 1 | 其它 }`，1 记为赞成
pub async fn handle_tally_vote(State(state): State<AppState>, body: Bytes) -> Response {
    let data: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                INVALID_BODY_MESSAGE,
                Some(err.to_string()),
            )
        }
    };

    let (Some(id), Some(vote)) = (present(&data, "id"), present(&data, "vote")) else {
        return error_response(StatusCode::BAD_REQUEST, MISSING_VOTE_FIELDS_MESSAGE, None);
    };

    let Some(id) = id.as_i64() else {
        return error_response(StatusCode::BAD_REQUEST, INVALID_ID_MESSAGE, None);
    };
    let up = vote.as_f64() == Some(1.0) || vote.as_bool() == Some(true);

    match state.library().vote(id, up).await {
        Ok(VoteOutcome::Recorded) => {
            tracing::info!(id, up, "Vote recorded");
            Json(json!({ "success": true })).into_response()
        }
        Ok(VoteOutcome::UnknownId) => {
            error_response(StatusCode::BAD_REQUEST, INVALID_ID_MESSAGE, None)
        }
        Err(err) => {
            let message = format!("{:#}", err);
            tracing::error!(error = %message, "Failed to save vote");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                SAVE_FAILURE_MESSAGE,
                Some(message),
            )
        }
    }
}

fn present<'a>(data: &'a Value, field: &str) -> Option<&'a Value> {
    data.get(field).filter(|value| !value.is_null())
}

#[derive(Debug, Deserialize)]
struct ScoreRequest {
    setup: String,
    task: String,
    vote: String,
}

/// `{ "setup", "task", "vote": "up" | "down" }` 追加到评分文件
pub async fn handle_score_vote(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ScoreRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                INVALID_BODY_MESSAGE,
                Some(err.to_string()),
            )
        }
    };

    tracing::info!(
        vote = %request.vote,
        task = %truncate_for_log(&request.task, 40),
        "Score received"
    );

    let entry = ScoreEntry {
        setup: request.setup,
        task: request.task,
        vote: request.vote,
    };
    match state.library().record_score(entry).await {
        Ok(()) => Json(json!({ "status": "success", "message": "Vote recorded." })).into_response(),
        Err(err) => {
            let message = format!("{:#}", err);
            tracing::error!(error = %message, "Failed to save score");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                SAVE_FAILURE_MESSAGE,
                Some(message),
            )
        }
    }
}
