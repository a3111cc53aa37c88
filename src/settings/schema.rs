//! Settings schema definitions for the Scriptlink assistant.
//!
//! All settings structs use `#[serde(default)]` to allow partial configuration files.
//! Missing fields are filled with defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::query::aliases::DEFAULT_DISPLAY_COLUMNS;

/// Root settings structure.
///
/// Loaded from `~/.scriptlink/settings.toml` with environment variable interpolation support.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptlinkSettings {
    /// Schema version for migrations
    pub version: u32,

    /// Registry table source
    pub data: DataSettings,

    /// Language model configuration
    pub ai: AiSettings,

    /// Column alias overrides and display defaults
    pub columns: ColumnSettings,

    /// HTTP server settings
    pub server: ServerSettings,

    /// Advanced/debug settings
    pub advanced: AdvancedSettings,
}

/// Where the registry table lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Path to a `.xlsx`, `.xls`, `.ods` or `.csv` file (supports $ENV_VAR syntax)
    pub path: String,

    /// Worksheet name; the first sheet when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Provider: "gemini" | "openai" | "ollama"
    pub provider: String,

    /// Model name; a per-provider default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Seconds to wait for a plan before giving up on the turn
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Messages of conversation history sent with each request
    pub max_history_messages: usize,

    pub gemini: GeminiSettings,

    pub openai: OpenAiSettings,

    pub ollama: OllamaSettings,
}

/// Google Gemini settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeminiSettings {
    /// Gemini API key (supports $ENV_VAR syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// OpenAI API settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OpenAiSettings {
    /// OpenAI API key (supports $ENV_VAR syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom base URL for OpenAI-compatible APIs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Ollama local LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    /// Ollama server URL
    pub base_url: String,
}

/// Column alias overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSettings {
    /// Conceptual columns shown when a listing plan names none
    pub default_display: Vec<String>,

    /// Conceptual name -> alias list. Replaces the built-in list for known
    /// conceptual names, adds new ones otherwise.
    pub aliases: BTreeMap<String, Vec<String>>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,

    pub port: u16,

    /// Concurrent conversations allowed
    pub max_sessions: usize,

    /// Idle seconds before a conversation is dropped
    pub session_ttl_secs: u64,
}

/// Advanced/debug settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Log level: "error" | "warn" | "info" | "debug" | "trace"
    pub log_level: String,
}

// =============================================================================
// Default implementations
// =============================================================================

impl Default for ScriptlinkSettings {
    fn default() -> Self {
        Self {
            version: 1,
            data: DataSettings::default(),
            ai: AiSettings::default(),
            columns: ColumnSettings::default(),
            server: ServerSettings::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            path: "Scriptlink.xlsx".to_string(),
            sheet: None,
        }
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            timeout_secs: 60,
            temperature: 0.1,
            max_history_messages: 40,
            gemini: GeminiSettings::default(),
            openai: OpenAiSettings::default(),
            ollama: OllamaSettings::default(),
        }
    }
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            default_display: DEFAULT_DISPLAY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            aliases: BTreeMap::new(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_sessions: 10,
            session_ttl_secs: 30 * 60,
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Model used when none is configured.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "openai" => "gpt-4o-mini",
        "ollama" => "llama3.2",
        _ => "gemini-1.5-flash",
    }
}
