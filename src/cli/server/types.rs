//! Request/Response types for the HTTP server.
//!
//! Replies themselves use [`ReplyBody`](crate::query::reply::ReplyBody), the
//! same wire form the CLI prints in `--json` mode.

use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Server status (always "ok" when the server answers)
    pub status: String,
    /// Server version from Cargo.toml
    pub version: String,
    /// Whether turns can be answered (table, column mapping and model present)
    pub initialized: bool,
    /// Rows in the loaded registry table
    pub rows: usize,
}

impl HealthResponse {
    pub fn new(initialized: bool, rows: usize) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            initialized,
            rows,
        }
    }
}

/// Response after creating a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSessionResponse {
    /// Server-generated session ID (UUID v4)
    pub session_id: String,
    /// Creation timestamp in RFC 3339 format
    pub created_at: String,
}

/// Information about a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: String,
    /// Creation timestamp in RFC 3339 format
    pub created_at: String,
    /// Seconds since the last request touching this session
    pub idle_secs: u64,
    /// Turns answered in this session
    pub turns: usize,
}

/// Response listing all sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionInfo>,
    /// Current session count
    pub count: usize,
    /// Maximum allowed sessions
    pub max_sessions: usize,
}

/// A user message for one turn.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageRequest {
    /// The utterance; empty or missing is rejected
    #[serde(default)]
    pub message: Option<String>,

    /// Per-turn language model timeout (defaults to the configured one)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl MessageRequest {
    /// The utterance, if there is one worth sending.
    pub fn utterance(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code for programmatic handling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Create an error response with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: None,
        }
    }

    /// Create an error response with a message and code
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: Some(code.into()),
        }
    }
}
