//! HTTP server for the Scriptlink assistant.
//!
//! Exposes the same turn pipeline as the CLI. Each session owns its own
//! conversation; the table and column mapping are shared read-only.
//!
//! ```text
//! +----------------------------------------------------+
//! |  Axum HTTP Server                                  |
//! |  /health (GET)                  -> health check    |
//! |  /sessions (POST, GET)          -> create, list    |
//! |  /sessions/{id} (GET, DELETE)   -> info, delete    |
//! |  /sessions/{id}/messages (POST) -> one turn        |
//! |  /sessions/{id}/context (GET)   -> context         |
//! |  /send_message (POST)           -> shared session  |
//! +----------------------------------------------------+
//!          |
//!          v
//! +----------------------------------------------------+
//! |  SessionManager (DashMap)                          |
//! |    +-- Session: Mutex<ChatSession>                 |
//! +----------------------------------------------------+
//! ```
//!
//! Start the server with:
//! ```bash
//! scriptlink-cli --server --port 8080
//! ```

mod handlers;
mod session;
pub mod types;

pub use handlers::AppState;
pub use session::{Session, SessionManager, DEFAULT_MAX_SESSIONS};
pub use types::{
    CreateSessionResponse, ErrorResponse, HealthResponse, ListSessionsResponse, MessageRequest,
    SessionInfo,
};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::chat::ChatService;
use crate::settings::schema::ServerSettings;

use super::args::Args;
use super::bootstrap::initialize_service;

/// Longest pause between idle-session sweeps.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Start the HTTP server.
///
/// Returns the bound address (useful when the port is 0) and a token that
/// shuts the server and its cleanup task down when cancelled.
pub async fn start_server(
    chat: ChatService,
    settings: &ServerSettings,
) -> anyhow::Result<(SocketAddr, CancellationToken)> {
    let (state, shutdown_token) = AppState::new(chat, settings.max_sessions);

    let app = create_router(state.clone());

    let listener = TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", settings.host, settings.port))?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("HTTP server listening on {}", actual_addr);

    let ttl = Duration::from_secs(settings.session_ttl_secs);
    let cleanup_state = state.clone();
    let cleanup_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ttl.min(CLEANUP_INTERVAL).max(Duration::from_secs(1)));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let cleaned = cleanup_state.session_manager.cleanup_idle(ttl).await;
                    if cleaned > 0 {
                        tracing::info!("Cleaned up {} idle sessions", cleaned);
                    }
                }
                _ = cleanup_shutdown.cancelled() => {
                    tracing::debug!("Session cleanup task shutting down");
                    break;
                }
            }
        }
    });

    let server_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(server_shutdown.cancelled_owned())
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_token))
}

/// Run the server from command-line arguments until Ctrl+C.
pub async fn serve(args: &Args) -> anyhow::Result<()> {
    let (chat, settings) = initialize_service(args).await?;

    let mut server = settings.server.clone();
    if let Some(port) = args.port {
        server.port = port;
    }

    let (addr, shutdown) = start_server(chat, &server).await?;
    eprintln!("scriptlink server listening on http://{}", addr);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Shutting down");
    shutdown.cancel();
    Ok(())
}

/// Create the router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/sessions",
            post(handlers::create_session).get(handlers::list_sessions),
        )
        .route(
            "/sessions/{session_id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/sessions/{session_id}/messages",
            post(handlers::send_session_message),
        )
        .route("/sessions/{session_id}/context", get(handlers::get_context))
        .route("/send_message", post(handlers::send_message))
        .with_state(state)
}
