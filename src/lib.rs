//! Conversational query assistant for the EHR script registry.
//!
//! A user's question is turned into a structured [`query::Plan`] by a
//! language model, the plan is executed against the registry table, and the
//! outcome is folded into the conversation's context so follow-ups like
//! "is that script on any other forms?" resolve.

pub mod ai;
pub mod chat;
pub mod error;
pub mod query;
pub mod settings;
pub mod table;

#[cfg(feature = "cli")]
pub mod cli;

pub use chat::{ChatService, ChatSession, Dataset};
pub use error::{ErrorCode, QueryError};
pub use query::{Plan, Reply};
