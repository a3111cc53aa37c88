//! HTTP request handlers.
//!
//! Every message endpoint funnels into `run_turn`, which checks readiness,
//! validates the message and then runs the turn on a spawned task holding the
//! conversation's lock.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::session::SessionManager;
use super::types::*;
use crate::chat::{ChatService, ChatSession};
use crate::error::QueryError;
use crate::query::context::ContextSnapshot;
use crate::query::reply::{Reply, ReplyBody};

pub const NO_MESSAGE: &str = "No message provided";

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Application state shared across all handlers
pub struct AppState {
    /// Turn pipeline shared by every conversation
    pub chat: ChatService,
    /// Per-client conversations
    pub session_manager: SessionManager,
    /// The single conversation behind `/send_message`
    pub default_session: Arc<Mutex<ChatSession>>,
    /// Shutdown token for graceful server shutdown
    pub shutdown_token: CancellationToken,
}

impl AppState {
    pub fn new(chat: ChatService, max_sessions: usize) -> (Arc<Self>, CancellationToken) {
        let shutdown_token = CancellationToken::new();
        let default_session = Arc::new(Mutex::new(chat.new_session()));
        let state = Arc::new(Self {
            chat,
            session_manager: SessionManager::new(max_sessions),
            default_session,
            shutdown_token: shutdown_token.clone(),
        });
        (state, shutdown_token)
    }
}

fn session_not_found(session_id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::with_code(
            format!("Session '{}' not found", session_id),
            "SESSION_NOT_FOUND",
        )),
    )
}

fn reply_response(status: StatusCode, reply: Reply) -> (StatusCode, Json<ReplyBody>) {
    (status, Json(reply.to_body()))
}

/// Health check endpoint.
///
/// Always 200; `initialized` tells whether turns can be answered.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let rows = state.chat.dataset().map_or(0, |d| d.table().len());
    Json(HealthResponse::new(state.chat.is_initialized(), rows))
}

/// Create a new session.
///
/// - `201 Created`: session created
/// - `503 Service Unavailable`: maximum session limit reached
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let session = state
        .session_manager
        .create(state.chat.new_session())
        .map_err(|e| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::with_code(e.to_string(), "SESSION_LIMIT_REACHED")),
            )
        })?;

    tracing::info!("Created session {}", session.id);
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id.clone(),
            created_at: session.created_at.to_rfc3339(),
        }),
    ))
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<ListSessionsResponse> {
    let sessions = state.session_manager.list_sessions().await;
    Json(ListSessionsResponse {
        count: sessions.len(),
        max_sessions: state.session_manager.max_sessions,
        sessions,
    })
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    let session = state
        .session_manager
        .get(&session_id)
        .ok_or_else(|| session_not_found(&session_id))?;
    Ok(Json(session.info().await))
}

/// Delete a session.
///
/// - `204 No Content`: session deleted
/// - `404 Not Found`: session does not exist
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .session_manager
        .remove(&session_id)
        .map(|_| {
            tracing::info!("Deleted session {}", session_id);
            StatusCode::NO_CONTENT
        })
        .ok_or_else(|| session_not_found(&session_id))
}

/// Current conversation context of a session.
pub async fn get_context(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ContextSnapshot>, ApiError> {
    let session = state
        .session_manager
        .get(&session_id)
        .ok_or_else(|| session_not_found(&session_id))?;
    session.touch().await;

    let chat = session.chat();
    let snapshot = chat.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// Send a message within a session.
///
/// # Request Body
///
/// ```json
/// { "message": "how many scripts are on progress note forms?", "timeout_secs": 30 }
/// ```
///
/// # Response
///
/// - `200 OK`: the reply (`reply_type` text or table)
/// - `400 Bad Request`: empty message
/// - `404 Not Found`: session does not exist
/// - `500 Internal Server Error`: table or language model unavailable
pub async fn send_session_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<(StatusCode, Json<ReplyBody>), ApiError> {
    let session = state
        .session_manager
        .get(&session_id)
        .ok_or_else(|| session_not_found(&session_id))?;
    session.touch().await;

    let response = run_turn(&state, session.chat(), req).await;
    if response.0 == StatusCode::OK {
        session.record_turn();
    }
    Ok(response)
}

/// Send a message in the shared default conversation.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> (StatusCode, Json<ReplyBody>) {
    run_turn(&state, state.default_session.clone(), req).await
}

async fn run_turn(
    state: &AppState,
    chat: Arc<Mutex<ChatSession>>,
    req: MessageRequest,
) -> (StatusCode, Json<ReplyBody>) {
    if !state.chat.is_initialized() {
        return reply_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Reply::from(QueryError::NotInitialized),
        );
    }
    let Some(utterance) = req.utterance().map(str::to_string) else {
        return reply_response(StatusCode::BAD_REQUEST, Reply::text(NO_MESSAGE));
    };

    let service = state.chat.clone();
    let timeout = req
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| service.timeout());

    let turn = tokio::spawn(async move {
        let mut session = chat.lock().await;
        service
            .handle_turn_with_timeout(&mut session, &utterance, timeout)
            .await
    });

    let reply = match turn.await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!("Turn task failed: {}", e);
            Reply::text(format!("Server error: {}", e))
        }
    };
    reply_response(StatusCode::OK, reply)
}
