//! Conversation turn pipeline.
//!
//! `ChatService` holds what every conversation shares: the loaded dataset,
//! the plan generator and the executor. It is cheap to clone and read-only.
//! `ChatSession` holds what belongs to one conversation: its context and its
//! model-facing history. A turn borrows the session mutably, so turns within
//! one conversation are serialized by construction.
//!
//! Turn order: not-initialized check, small talk, replay, generation (with a
//! timeout), execution.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::ai::plan_generator::{GeneratedPlan, PlanGenerator, PlanRequest};
use crate::ai::small_talk;
use crate::ai::ChatMessage;
use crate::error::QueryError;
use crate::query::aliases::{AliasMap, ColumnAliases};
use crate::query::context::{ContextSnapshot, ConversationContext};
use crate::query::executor::PlanExecutor;
use crate::query::reply::Reply;
use crate::table::{load_table, Table, TableError};


/// Utterances that re-run the last successful plan without asking the model.
pub const REPLAY_PHRASES: [&str; 3] = ["what was that again?", "show that again", "repeat that"];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_HISTORY: usize = 40;

/// The registry table and its resolved column mapping.
#[derive(Debug, Clone)]
pub struct Dataset {
    table: Table,
    aliases: AliasMap,
}

impl Dataset {
    pub fn new(table: Table, aliases: &ColumnAliases) -> Self {
        let resolved = aliases.resolve(table.columns());
        tracing::info!(
            "Resolved {} of {} conceptual columns",
            resolved.len(),
            aliases.iter().count()
        );
        Self {
            table,
            aliases: resolved,
        }
    }

    pub fn load(path: &Path, sheet: Option<&str>, aliases: &ColumnAliases) -> Result<Self, TableError> {
        Ok(Self::new(load_table(path, sheet)?, aliases))
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }
}

/// One conversation's mutable state.
#[derive(Debug, Clone)]
pub struct ChatSession {
    context: ConversationContext,
    history: Vec<ChatMessage>,
    max_history: usize,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ChatSession {
    pub fn new(max_history: usize) -> Self {
        Self {
            context: ConversationContext::new(),
            history: Vec::new(),
            max_history,
        }
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        self.context.snapshot()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Record a user utterance and the model's raw answer, dropping the
    /// oldest exchanges beyond the limit. History always starts on a user
    /// message.
    fn push_exchange(&mut self, utterance: &str, raw_response: String) {
        self.history.push(ChatMessage::user(utterance));
        self.history.push(ChatMessage::assistant(raw_response));
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            let excess = (excess + excess % 2).min(self.history.len());
            self.history.drain(..excess);
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    dataset: Option<Arc<Dataset>>,
    generator: Option<Arc<dyn PlanGenerator>>,
    executor: PlanExecutor,
    timeout: Duration,
    max_history: usize,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("initialized", &self.is_initialized())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ChatService {
    /// Either part may be missing; the service then answers every turn with
    /// the not-initialized reply.
    pub fn new(dataset: Option<Arc<Dataset>>, generator: Option<Arc<dyn PlanGenerator>>) -> Self {
        Self {
            dataset,
            generator,
            executor: PlanExecutor::default(),
            timeout: DEFAULT_TIMEOUT,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_executor(mut self, executor: PlanExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.generator.is_some()
            && self
                .dataset
                .as_ref()
                .is_some_and(|d| !d.aliases().is_empty())
    }

    pub fn new_session(&self) -> ChatSession {
        ChatSession::new(self.max_history)
    }

    pub async fn handle_turn(&self, session: &mut ChatSession, utterance: &str) -> Reply {
        self.handle_turn_with_timeout(session, utterance, self.timeout).await
    }

    pub async fn handle_turn_with_timeout(
        &self,
        session: &mut ChatSession,
        utterance: &str,
        timeout: Duration,
    ) -> Reply {
        let (Some(dataset), Some(generator)) = (self.dataset.as_deref(), self.generator.as_deref()) else {
            return Reply::from(QueryError::NotInitialized);
        };
        if dataset.aliases().is_empty() {
            return Reply::from(QueryError::NotInitialized);
        }

        if let Some(reply) = small_talk::classify(utterance) {
            return reply;
        }

        let normalized = utterance.trim().to_lowercase();
        if REPLAY_PHRASES.contains(&normalized.as_str()) {
            if let Some(plan) = session.context.last_successful_plan().cloned() {
                tracing::debug!("Replaying last successful plan");
                return self
                    .executor
                    .execute(dataset.table(), dataset.aliases(), &plan, &mut session.context);
            }
        }

        let generated = {
            let request = PlanRequest {
                utterance,
                actual_columns: dataset.table().columns(),
                aliases: dataset.aliases(),
                primary_entity: session.context.last_primary_entity(),
                history: &session.history,
            };
            match tokio::time::timeout(timeout, generator.generate(request)).await {
                Ok(generated) => generated,
                Err(_) => {
                    tracing::warn!("Plan generation timed out after {:?}", timeout);
                    GeneratedPlan::failed(format!(
                        "Language model did not respond within {} seconds.",
                        timeout.as_secs()
                    ))
                }
            }
        };

        if let Some(raw) = generated.raw_response {
            session.push_exchange(utterance, raw);
        }

        self.executor.execute(
            dataset.table(),
            dataset.aliases(),
            &generated.plan,
            &mut session.context,
        )
    }
}
