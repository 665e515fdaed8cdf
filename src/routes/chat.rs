// src/routes/chat.rs
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use crate::{
    error::AppError,
    message::{ChatRequest, ChatResponse, HistoryResponse},
    services::metrics_manager::MetricsData,
    state::SharedState,
};

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let session_id = match &payload.session_id {
        Some(s) if !s.trim().is_empty() => state.sessions.ensure_session(s.trim()).await,
        _ => state.sessions.create_session().await,
    };

    let turn = match state
        .sessions
        .submit(&session_id, &payload.message, state.gateway.clone())
        .await
    {
        Ok(turn) => turn,
        Err(err) => {
            state.metrics.record_rejected().await;
            return Err(err.into());
        }
    };

    if let Some(outcome) = turn.outcome {
        state.metrics.record_outcome(outcome).await;
    }

    Ok(Json(ChatResponse {
        session_id,
        reply: turn.reply,
        messages: turn.messages,
    }))
}

pub async fn get_history_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let not_found = || AppError::NotFound(format!("Unknown session {}", session_id));
    let chat_state = state.sessions.get_state(&session_id).await.ok_or_else(not_found)?;
    let messages = state
        .sessions
        .get_history(&session_id)
        .await
        .ok_or_else(not_found)?;
    Ok(Json(HistoryResponse {
        session_id,
        state: chat_state,
        messages,
    }))
}

pub async fn reset_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.sessions.reset_session(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Unknown session {}", session_id)))
    }
}

pub async fn remove_session_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove_session(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Unknown session {}", session_id)))
    }
}

pub async fn get_metrics_handler(State(state): State<SharedState>) -> Json<MetricsData> {
    Json(state.metrics.get_metrics().await)
}
