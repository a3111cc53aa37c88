//! Plan Generator: utterance + context -> [`Plan`].
//!
//! Generation never fails from the caller's point of view. Transport errors
//! and malformed output both come back as not-answerable plans.

use std::sync::Arc;

use async_trait::async_trait;

use super::llm_client::{ChatMessage, LlmBackend};
use super::system_prompt::build_plan_prompt;
use crate::query::aliases::AliasMap;
use crate::query::context::PrimaryEntity;
use crate::query::plan::{parse_plan, Plan};

pub const REASON_API_ERROR: &str = "Language model API error. Please check server logs.";

/// Inputs for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub utterance: &'a str,
    pub actual_columns: &'a [String],
    pub aliases: &'a AliasMap,
    pub primary_entity: Option<&'a PrimaryEntity>,
    pub history: &'a [ChatMessage],
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub plan: Plan,
    /// The model's raw text, when the model answered at all.
    pub raw_response: Option<String>,
}

impl GeneratedPlan {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            plan: Plan::not_answerable(reason),
            raw_response: None,
        }
    }
}

#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, request: PlanRequest<'_>) -> GeneratedPlan;

    fn description(&self) -> String;
}

/// Plan generator backed by a chat-completion model.
pub struct LlmPlanGenerator {
    backend: Arc<dyn LlmBackend>,
}

impl LlmPlanGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl PlanGenerator for LlmPlanGenerator {
    async fn generate(&self, request: PlanRequest<'_>) -> GeneratedPlan {
        let prompt = build_plan_prompt(
            request.utterance,
            request.actual_columns,
            request.aliases,
            request.primary_entity,
        );

        match self.backend.complete(request.history, &prompt).await {
            Ok(raw) => {
                let plan = parse_plan(&raw);
                tracing::debug!(
                    "Generated plan: {}",
                    serde_json::to_string(&plan).unwrap_or_default()
                );
                GeneratedPlan {
                    plan,
                    raw_response: Some(raw),
                }
            }
            Err(e) => {
                tracing::warn!("Plan generation via {} failed: {:#}", self.backend.description(), e);
                GeneratedPlan::failed(REASON_API_ERROR)
            }
        }
    }

    fn description(&self) -> String {
        self.backend.description()
    }
}
