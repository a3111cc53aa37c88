//! Prompt building for plan generation.
//!
//! The prompt carries everything the model needs to emit a plan: the actual
//! headers, the conceptual -> actual mapping, the primary-entity hint, the
//! extraction and counting rules, the plan structure, and worked examples.

use serde_json::json;

use crate::query::aliases::{
    AliasMap, DEFAULT_DISPLAY_COLUMNS, FIELD_NAME, FORM_NAME, NAMESPACE, SCRIPT_NAME,
    SERVICE_NAME,
};
use crate::query::context::PrimaryEntity;

/// Build the per-turn prompt.
pub fn build_plan_prompt(
    utterance: &str,
    actual_columns: &[String],
    aliases: &AliasMap,
    primary_entity: Option<&PrimaryEntity>,
) -> String {
    let context_hint = primary_entity.map(PrimaryEntity::hint).unwrap_or_default();
    let examples = Examples::new();

    format!(
        r#"
You are an AI assistant that helps users query a table of EHR web service scripts.
Actual columns in the table: {columns}.
Conceptual to actual column mapping: {mapping}.
When specifying a column in your plan, ALWAYS use the 'conceptual_name' from the mapping.

Your primary goal: Understand the user's LATEST question.
--- CRITICAL CONTEXT HANDLING ---
1. Examine the full CONVERSATION HISTORY to understand the current context.
2. Resolve pronouns (it, that, those, these script, that form etc.) or anaphoric references based on entities mentioned in PREVIOUS, RELEVANT turns of the conversation.
3. If the user asks a follow-up question like "is that script on any other forms?" or "what about service X for it?", identify the specific entity (e.g., script name 'ScriptABC', form name 'FormXYZ') from the history.
4. Use this identified entity to formulate the NEW JSON plan for the CURRENT user question.
{context_hint}

--- FILTER VALUE EXTRACTION ---
IMPORTANT FOR FILTER VALUES:
- When the user query includes descriptive terms like "form", "note", "script" AFTER a more specific identifier (e.g., "diagnosis form", "phd progress note", "billing script"), isolate the core identifying part (e.g., "diagnosis", "phd", "phd note", "billing").
- This core identifier SHOULD BE USED as the "value" in your filter.
- For instance, if the user says "phd progress note", the "value" should be "phd" or "phd note", NOT the full "phd progress note".
- ALWAYS set "match_type" to "contains" when using such an extracted core entity, unless you are absolutely certain the core entity is an exact, complete name found in the data.
- If the user says "special use progress note", extract "special use" or "special use note" as the value.

--- COUNTING INSTRUCTIONS ---
IMPORTANT FOR COUNTING:
- When the user asks "how many forms...", "how many scripts...", "number of unique services...", the "operation" should be "count_items".
- The "count_target_conceptual" should be the conceptual name of the item they want to count (e.g., "{form}" for forms, "{script}" for scripts).
- Set "count_distinct" to true if the user implies unique items (e.g., "how many unique forms", "how many different scripts"). If they just say "how many forms" or "how many scripts", assume they mean distinct entities.

--- JSON PLAN STRUCTURE ---
Respond with a single JSON object and nothing else:
- "is_answerable": true/false. If false, provide "reason_if_not_answerable".
- "operation": "filter_and_list", "count_items", "list_unique_values".
- "filters": List of {{ "column_conceptual_name": "...", "match_type": "exact" or "contains" or "not_exact", "value": "..." }}.
- "display_columns_conceptual": For "filter_and_list". Default: {defaults}.
- "count_target_conceptual": For "count_items".
- "count_distinct": (boolean, optional for "count_items").
- "list_unique_target_conceptual": For "list_unique_values".
- "reasoning": (Optional) Your brief reasoning for the plan, especially how you resolved context.

--- EXAMPLES ---
Examples of resolving context and partial names:
A. Previous Interaction: User: "What scripts are on 'Form X'?" -> Bot shows 'ScriptA'.
   LATEST User Question: "Is that script on any other forms?"
   Your reasoning: User means 'ScriptA' from history. Plan should find forms for 'ScriptA', potentially excluding 'Form X'.
   JSON Plan: {a}

B. Previous Interaction: User: "How many services on 'Form Y'?" -> Bot gives a count.
   LATEST User Question: "What about 'Form Z'?"
   Your reasoning: User wants the same type of query (count services) but for 'Form Z'.
   JSON Plan: {b}

C. User: "How many scripts are on the special use note?" (table has "Special Use Progress Note")
   Your reasoning: "special use note" -> core entity "special use". Match type "contains".
   JSON Plan: {c}

D. User: "what scripts are on the phd progress note" (table has "PhD PsyD SW MFT Progress Note")
   Your reasoning: "phd progress note" implies the core entity is "phd" or "phd note". Use "contains".
   JSON Plan: {d}

E. User: "Is there a diagnosis form?" (table has a form named "Diagnosis")
   Your reasoning: "diagnosis form" -> core entity "diagnosis".
   JSON Plan (using contains for robustness): {e_contains}
   JSON Plan (using exact if confident): {e_exact}

F. User: "how many forms have cws namespace"
   Your reasoning: User wants to count distinct forms filtered by namespace.
   JSON Plan: {f}

G. User: "how many scripts are on progress note forms"
   Your reasoning: User wants to count distinct scripts found on any form containing 'progress note'.
   JSON Plan: {g}

Single-turn plans:
1. User: "What scripts are on the 'Patient Demographics' form?"
   JSON: {one}
2. User: "How many distinct scripts are on 'Billing Claims'?"
   JSON: {two}
3. User: "Show forms with 'progress note'."
   JSON: {three}

LATEST User Question: "{utterance}"
JSON Plan:
"#,
        columns = actual_columns.join(", "),
        mapping = aliases.to_json(),
        context_hint = context_hint,
        form = FORM_NAME,
        script = SCRIPT_NAME,
        defaults = json!(DEFAULT_DISPLAY_COLUMNS),
        a = examples.a,
        b = examples.b,
        c = examples.c,
        d = examples.d,
        e_contains = examples.e_contains,
        e_exact = examples.e_exact,
        f = examples.f,
        g = examples.g,
        one = examples.one,
        two = examples.two,
        three = examples.three,
        utterance = utterance,
    )
}

struct Examples {
    a: String,
    b: String,
    c: String,
    d: String,
    e_contains: String,
    e_exact: String,
    f: String,
    g: String,
    one: String,
    two: String,
    three: String,
}

fn filter(column: &str, match_type: &str, value: &str) -> serde_json::Value {
    json!([{ "column_conceptual_name": column, "match_type": match_type, "value": value }])
}

impl Examples {
    fn new() -> Self {
        let list = |filters: serde_json::Value, display: &[&str]| {
            json!({
                "is_answerable": true,
                "operation": "filter_and_list",
                "filters": filters,
                "display_columns_conceptual": display,
            })
            .to_string()
        };
        let count = |filters: serde_json::Value, target: &str, distinct: bool| {
            let mut plan = json!({
                "is_answerable": true,
                "operation": "count_items",
                "filters": filters,
                "count_target_conceptual": target,
            });
            if distinct {
                plan["count_distinct"] = json!(true);
            }
            plan.to_string()
        };

        let mut d = json!({
            "is_answerable": true,
            "operation": "filter_and_list",
            "filters": filter(FORM_NAME, "contains", "phd"),
            "display_columns_conceptual": [SCRIPT_NAME, SERVICE_NAME],
        });
        d["reasoning"] = json!(
            "User query 'phd progress note' refers to a form likely containing 'phd'. Using 'contains' with core entity 'phd'."
        );

        Self {
            a: list(
                filter(SCRIPT_NAME, "exact", "ScriptA"),
                &[FORM_NAME, SERVICE_NAME],
            ),
            b: count(filter(FORM_NAME, "exact", "Form Z"), SERVICE_NAME, true),
            c: count(filter(FORM_NAME, "contains", "special use"), SCRIPT_NAME, false),
            d: d.to_string(),
            e_contains: list(filter(FORM_NAME, "contains", "diagnosis"), &[FORM_NAME]),
            e_exact: list(filter(FORM_NAME, "exact", "Diagnosis"), &[FORM_NAME]),
            f: count(filter(NAMESPACE, "contains", "cws"), FORM_NAME, true),
            g: count(filter(FORM_NAME, "contains", "progress note"), SCRIPT_NAME, true),
            one: list(
                filter(FORM_NAME, "exact", "Patient Demographics"),
                &[SCRIPT_NAME, FIELD_NAME, SERVICE_NAME],
            ),
            two: count(filter(FORM_NAME, "exact", "Billing Claims"), SCRIPT_NAME, true),
            three: list(filter(FORM_NAME, "contains", "progress note"), &[FORM_NAME]),
        }
    }
}
