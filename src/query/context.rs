//! Conversation context carried between turns.
//!
//! One `ConversationContext` belongs to one conversation. It is owned by the
//! session and handed to the executor by `&mut`, never shared.

use serde::{Deserialize, Serialize};

use super::plan::Plan;

pub const SENTINEL_COUNTED: &str = "items previously counted";
pub const SENTINEL_LISTED: &str = "all unique values listed";

/// The entity the conversation currently centers on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryEntity {
    /// Conceptual column name, e.g. `script_name_conceptual`.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl PrimaryEntity {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Sentence handed to the plan generator so pronouns resolve to this entity.
    pub fn hint(&self) -> String {
        format!(
            "NOTE: In prior conversation, the main referenced entity is a '{}' with value '{}'. \
             When the user uses pronouns like 'it', 'that script', or 'that form', \
             assume they refer to this entity unless otherwise specified. \
             Use this context to disambiguate ambiguous queries.",
            self.kind, self.value
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationContext {
    last_successful_plan: Option<Plan>,
    last_primary_entity: Option<PrimaryEntity>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_successful_plan(&self) -> Option<&Plan> {
        self.last_successful_plan.as_ref()
    }

    pub fn last_primary_entity(&self) -> Option<&PrimaryEntity> {
        self.last_primary_entity.as_ref()
    }

    /// Filters matched nothing: forget the plan, keep only what the first
    /// filter told us about the entity.
    pub(crate) fn record_empty_result(&mut self, candidate: Option<PrimaryEntity>) {
        self.last_successful_plan = None;
        self.last_primary_entity = candidate;
    }

    pub(crate) fn commit_plan(&mut self, plan: &Plan) {
        self.last_successful_plan = Some(plan.clone());
    }

    /// `None` leaves the current entity in place.
    pub(crate) fn update_primary_entity(&mut self, entity: Option<PrimaryEntity>) {
        if let Some(entity) = entity {
            tracing::debug!("Primary entity now {} = '{}'", entity.kind, entity.value);
            self.last_primary_entity = Some(entity);
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            primary_entity: self.last_primary_entity.clone(),
            has_replayable_plan: self.last_successful_plan.is_some(),
            last_operation: self
                .last_successful_plan
                .as_ref()
                .and_then(|p| p.operation.as_ref())
                .map(|op| op.as_str().to_string()),
        }
    }
}

/// Read-only view of a context, for `/context` and the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    pub primary_entity: Option<PrimaryEntity>,
    pub has_replayable_plan: bool,
    pub last_operation: Option<String>,
}
