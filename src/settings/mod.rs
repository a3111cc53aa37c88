//! Centralized TOML-based settings for Scriptlink.
//!
//! Settings are loaded from `~/.scriptlink/settings.toml` (or `--config`)
//! with environment variable interpolation support. API keys also fall back
//! to the conventional environment variables through `get_with_env_fallback`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::settings::{SettingsManager, get_with_env_fallback};
//!
//! let manager = SettingsManager::new().await?;
//! let settings = manager.get().await;
//!
//! let api_key = get_with_env_fallback(
//!     &settings.ai.gemini.api_key,
//!     &["GEMINI_API_KEY"],
//!     None,
//! );
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_with_env_fallback, settings_path, SettingsManager};
pub use schema::{default_model_for, ScriptlinkSettings};
