//! Language model boundary: backends, prompt, plan generation, and the
//! small-talk short circuit that avoids the model entirely.

pub mod llm_client;
pub mod plan_generator;
pub mod small_talk;
pub mod system_prompt;

pub use llm_client::{create_backend, BackendConfig, ChatMessage, LlmBackend, LlmProvider, MessageRole};
pub use plan_generator::{GeneratedPlan, LlmPlanGenerator, PlanGenerator, PlanRequest};
