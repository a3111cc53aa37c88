//! Session management for the HTTP server.
//!
//! Each session owns one `ChatSession` (conversation context plus model
//! history) behind an async mutex, so turns within a session run one at a
//! time while different sessions proceed concurrently.
//!
//! # Architecture
//!
//! ```text
//! +------------------------------------------+
//! |  SessionManager (DashMap)                |
//! |    +-- Session 1: Mutex<ChatSession>     |
//! |    +-- Session 2: Mutex<ChatSession>     |
//! |    +-- ... (max configurable sessions)   |
//! +------------------------------------------+
//! ```

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use chrono::{DateTime, Utc};

use crate::chat::ChatSession;

use super::types::SessionInfo;

/// Maximum concurrent sessions to prevent resource exhaustion (default)
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// One conversation held by the server.
pub struct Session {
    /// Unique session identifier (UUID v4)
    pub id: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp (updated on each request)
    last_activity: RwLock<Instant>,

    /// Conversation state; locked for the whole of a turn
    chat: Arc<Mutex<ChatSession>>,

    turns: AtomicUsize,
}

impl Session {
    pub fn new(chat: ChatSession) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), chat)
    }

    pub fn with_id(id: impl Into<String>, chat: ChatSession) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            last_activity: RwLock::new(Instant::now()),
            chat: Arc::new(Mutex::new(chat)),
            turns: AtomicUsize::new(0),
        }
    }

    /// Shared handle to the conversation, for spawned turns.
    pub fn chat(&self) -> Arc<Mutex<ChatSession>> {
        self.chat.clone()
    }

    pub fn record_turn(&self) {
        self.turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn turns(&self) -> usize {
        self.turns.load(Ordering::Relaxed)
    }

    /// Update the last activity timestamp to now.
    pub async fn touch(&self) {
        *self.last_activity.write().await = Instant::now();
    }

    pub async fn idle_for(&self) -> Duration {
        self.last_activity.read().await.elapsed()
    }

    /// Check if this session has been idle longer than `max_idle`.
    pub async fn is_idle(&self, max_idle: Duration) -> bool {
        self.idle_for().await > max_idle
    }

    pub async fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            created_at: self.created_at.to_rfc3339(),
            idle_secs: self.idle_for().await.as_secs(),
            turns: self.turns(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("turns", &self.turns())
            .finish_non_exhaustive()
    }
}

/// Thread-safe session manager using DashMap for O(1) lookup.
///
/// The manager enforces a maximum session limit to prevent resource exhaustion.
/// Idle sessions can be cleaned up periodically via `cleanup_idle()`.
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,

    /// Maximum allowed concurrent sessions
    pub max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_sessions,
        }
    }

    /// Register a new session around `chat`, failing at capacity.
    pub fn create(&self, chat: ChatSession) -> anyhow::Result<Arc<Session>> {
        if self.sessions.len() >= self.max_sessions {
            anyhow::bail!("Maximum session limit ({}) reached", self.max_sessions);
        }

        let session = Arc::new(Session::new(chat));
        self.sessions.insert(session.id.clone(), session.clone());
        tracing::debug!("Created session {}", session.id);
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|r| r.clone())
    }

    /// Remove a session by ID. A turn already running keeps its own handle
    /// to the conversation and finishes normally.
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Snapshot of every session, for the list endpoint.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<Session>> = self.sessions.iter().map(|e| e.value().clone()).collect();

        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.info().await);
        }
        infos
    }

    /// Remove sessions idle for longer than `max_idle`. Returns how many
    /// were removed.
    pub async fn cleanup_idle(&self, max_idle: Duration) -> usize {
        let sessions: Vec<Arc<Session>> = self.sessions.iter().map(|e| e.value().clone()).collect();

        let mut removed = 0;
        for session in sessions {
            if session.is_idle(max_idle).await && self.sessions.remove(&session.id).is_some() {
                tracing::info!("Cleaned up idle session: {}", session.id);
                removed += 1;
            }
        }
        removed
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}
