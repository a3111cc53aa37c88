//! Query plan protocol and its execution.
//!
//! - `aliases`: conceptual column names and their resolution
//! - `normalize`: filter value normalization
//! - `plan`: plan schema and model-output validation
//! - `context`: per-conversation context carry
//! - `executor`: plan execution
//! - `reply`: turn replies

pub mod aliases;
pub mod context;
pub mod executor;
pub mod normalize;
pub mod plan;
pub mod reply;

pub use aliases::{AliasMap, ColumnAliases};
pub use context::{ContextSnapshot, ConversationContext, PrimaryEntity};
pub use executor::PlanExecutor;
pub use normalize::{SuffixStripper, ValueNormalizer, Verbatim};
pub use plan::{parse_plan, Filter, FilterValue, MatchType, Operation, Plan};
pub use reply::{Reply, ReplyBody, TableReply};
