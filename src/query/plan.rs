//! Query plan schema and the validation boundary for model output.
//!
//! A plan is produced by the language model as JSON. Nothing about that
//! JSON is trusted: [`parse_plan`] either yields a well-typed [`Plan`] or a
//! not-answerable plan carrying a generic reason. Unknown operation and
//! match-type strings are kept (as `Other`) so the executor can report them
//! precisely.

use serde::{Deserialize, Deserializer, Serialize};

pub const REASON_INVALID_JSON: &str = "AI response was not valid JSON.";
pub const REASON_SCHEMA_MISMATCH: &str = "AI response did not match the expected plan format.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    FilterAndList,
    CountItems,
    ListUniqueValues,
    Other(String),
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "filter_and_list" => Operation::FilterAndList,
            "count_items" => Operation::CountItems,
            "list_unique_values" => Operation::ListUniqueValues,
            _ => Operation::Other(value),
        }
    }
}

impl From<Operation> for String {
    fn from(value: Operation) -> Self {
        value.as_str().to_string()
    }
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Operation::FilterAndList => "filter_and_list",
            Operation::CountItems => "count_items",
            Operation::ListUniqueValues => "list_unique_values",
            Operation::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MatchType {
    Exact,
    Contains,
    NotExact,
    Other(String),
}

impl From<String> for MatchType {
    /// Case-insensitive; `equals` is accepted as `exact`.
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "exact" | "equals" => MatchType::Exact,
            "contains" => MatchType::Contains,
            "not_exact" => MatchType::NotExact,
            other => MatchType::Other(other.to_string()),
        }
    }
}

impl From<MatchType> for String {
    fn from(value: MatchType) -> Self {
        match value {
            MatchType::Exact => "exact".to_string(),
            MatchType::Contains => "contains".to_string(),
            MatchType::NotExact => "not_exact".to_string(),
            MatchType::Other(name) => name,
        }
    }
}

/// A filter value as the model sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl FilterValue {
    /// Text used for case-insensitive comparison against cells.
    pub fn as_match_text(&self) -> String {
        match self {
            FilterValue::Text(text) => text.clone(),
            FilterValue::Number(n) => n.to_string(),
            FilterValue::Flag(true) => "True".to_string(),
            FilterValue::Flag(false) => "False".to_string(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub column_conceptual_name: Option<String>,
    #[serde(default)]
    pub match_type: Option<MatchType>,
    #[serde(default)]
    pub value: Option<FilterValue>,
}

impl Filter {
    pub fn new(column: impl Into<String>, match_type: MatchType, value: impl Into<FilterValue>) -> Self {
        Self {
            column_conceptual_name: Some(column.into()),
            match_type: Some(match_type),
            value: Some(value.into()),
        }
    }

    /// A filter without a match type behaves as `contains`.
    pub fn effective_match_type(&self) -> MatchType {
        self.match_type.clone().unwrap_or(MatchType::Contains)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_answerable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_if_not_answerable: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: Vec<Filter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_columns_conceptual: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_target_conceptual: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub count_distinct: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_unique_target_conceptual: Option<String>,

    /// Advisory only; the executor ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Plan {
    pub fn not_answerable(reason: impl Into<String>) -> Self {
        Self {
            is_answerable: false,
            reason_if_not_answerable: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn answerable(operation: Operation) -> Self {
        Self {
            is_answerable: true,
            operation: Some(operation),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Strip markdown fences or surrounding prose from a model response,
/// leaving the JSON object.
pub fn extract_json(response: &str) -> &str {
    let mut text = response.trim();

    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    let text = text.trim();

    if text.starts_with('{') {
        return text;
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Parse a model response into a plan. Never fails: malformed output
/// becomes a not-answerable plan.
pub fn parse_plan(response: &str) -> Plan {
    let json = extract_json(response);

    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Model response was not valid JSON: {}", e);
            return Plan::not_answerable(REASON_INVALID_JSON);
        }
    };

    if !value.is_object() {
        tracing::warn!("Model response was JSON but not an object");
        return Plan::not_answerable(REASON_SCHEMA_MISMATCH);
    }

    match serde_json::from_value::<Plan>(value) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::warn!("Model response did not match plan schema: {}", e);
            Plan::not_answerable(REASON_SCHEMA_MISMATCH)
        }
    }
}
