//! Plan Executor.
//!
//! Interprets a validated [`Plan`] against the registry table and updates the
//! caller's [`ConversationContext`]. Every failure comes back as a
//! [`Reply::Error`]; nothing here panics on model-supplied input.
//!
//! Context bookkeeping happens between filtering and the operation itself,
//! so an operation that fails after a non-empty filter still leaves the plan
//! committed.

use std::sync::Arc;

use crate::error::{ColumnRole, QueryError, Result};
use crate::table::{CellValue, Table};

use super::aliases::{AliasMap, DEFAULT_DISPLAY_COLUMNS, SCRIPT_NAME};
use super::context::{ConversationContext, PrimaryEntity, SENTINEL_COUNTED, SENTINEL_LISTED};
use super::normalize::{SuffixStripper, ValueNormalizer};
use super::plan::{Filter, FilterValue, MatchType, Operation, Plan};
use super::reply::{Reply, TableReply};

pub const DEFAULT_NOT_ANSWERABLE_REASON: &str = "AI determined it is not answerable.";
pub const NO_DATA_FOUND: &str = "No data found matching your specified filter criteria.";

/// Placeholder used in messages when the plan omitted a name entirely.
const UNNAMED: &str = "None";

#[derive(Clone)]
pub struct PlanExecutor {
    normalizer: Arc<dyn ValueNormalizer>,
    default_display: Vec<String>,
}

impl Default for PlanExecutor {
    fn default() -> Self {
        Self::with_normalizer(Arc::new(SuffixStripper::default()))
    }
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("default_display", &self.default_display)
            .finish_non_exhaustive()
    }
}

impl PlanExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalizer(normalizer: Arc<dyn ValueNormalizer>) -> Self {
        Self {
            normalizer,
            default_display: DEFAULT_DISPLAY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Conceptual columns listed when a plan names no display columns.
    pub fn with_default_display(mut self, columns: Vec<String>) -> Self {
        self.default_display = columns;
        self
    }

    /// Execute `plan` and fold the outcome into `ctx`.
    pub fn execute(
        &self,
        table: &Table,
        aliases: &AliasMap,
        plan: &Plan,
        ctx: &mut ConversationContext,
    ) -> Reply {
        match self.run(table, aliases, plan, ctx) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::info!("Plan execution failed [{}]: {}", err.code(), err);
                Reply::from(err)
            }
        }
    }

    fn run(
        &self,
        table: &Table,
        aliases: &AliasMap,
        plan: &Plan,
        ctx: &mut ConversationContext,
    ) -> Result<Reply> {
        if aliases.is_empty() {
            return Err(QueryError::NotInitialized);
        }
        if !plan.is_answerable {
            let reason = plan
                .reason_if_not_answerable
                .clone()
                .unwrap_or_else(|| DEFAULT_NOT_ANSWERABLE_REASON.to_string());
            return Err(QueryError::NotAnswerable(reason));
        }

        let candidate = plan.filters.first().and_then(candidate_entity);

        let predicates = plan
            .filters
            .iter()
            .map(|filter| self.compile_filter(table, aliases, filter))
            .collect::<Result<Vec<_>>>()?;

        let filtered = table.filter_rows(|row| predicates.iter().all(|p| p.keeps(row)));

        if filtered.is_empty() {
            ctx.record_empty_result(candidate);
            return Ok(Reply::text(NO_DATA_FOUND));
        }

        ctx.commit_plan(plan);
        let entity = single_script_entity(plan, aliases, &filtered)
            .or(candidate)
            .or_else(|| operation_entity(plan));
        ctx.update_primary_entity(entity);

        match &plan.operation {
            Some(Operation::FilterAndList) => {
                filter_and_list(plan, &self.default_display, aliases, &filtered)
            }
            Some(Operation::CountItems) => count_items(plan, aliases, &filtered),
            Some(Operation::ListUniqueValues) => list_unique_values(plan, aliases, table, &filtered),
            Some(Operation::Other(name)) => Err(QueryError::UnsupportedOperation(name.clone())),
            None => Err(QueryError::UnsupportedOperation(UNNAMED.to_string())),
        }
    }

    /// Resolve one filter: column, then match type, then value, then the
    /// mapped column's position in the table.
    fn compile_filter(&self, table: &Table, aliases: &AliasMap, filter: &Filter) -> Result<Predicate> {
        let concept = filter.column_conceptual_name.as_deref().unwrap_or(UNNAMED);
        let actual = aliases
            .get(concept)
            .ok_or_else(|| QueryError::not_mapped(ColumnRole::Filter, concept))?;

        let match_type = filter.effective_match_type();
        if let MatchType::Other(name) = &match_type {
            return Err(QueryError::UnsupportedMatchType(name.clone()));
        }

        let value = filter
            .value
            .as_ref()
            .map(|v| self.normalizer.normalize(v))
            .ok_or_else(|| QueryError::MissingFilterValue(concept.to_string()))?;

        let column = table
            .column_index(actual)
            .ok_or_else(|| QueryError::FilterExecution {
                column: actual.to_string(),
                message: "mapped column not in table".to_string(),
            })?;

        tracing::debug!("Filter {} ({}) {:?} {:?}", concept, actual, match_type, value);

        Ok(Predicate {
            column,
            match_type,
            needle: value.as_match_text().to_lowercase(),
        })
    }
}

/// A resolved filter, ready to test rows.
#[derive(Debug)]
struct Predicate {
    column: usize,
    match_type: MatchType,
    needle: String,
}

impl Predicate {
    /// Case-insensitive comparison on the cell's text form. Missing cells
    /// never equal or contain anything, so `not_exact` keeps them.
    fn keeps(&self, row: &[CellValue]) -> bool {
        let text = row.get(self.column).and_then(CellValue::as_text);
        match (&self.match_type, text) {
            (MatchType::Exact, Some(t)) => t.to_lowercase() == self.needle,
            (MatchType::Contains, Some(t)) => t.to_lowercase().contains(&self.needle),
            (MatchType::NotExact, Some(t)) => t.to_lowercase() != self.needle,
            (MatchType::NotExact, None) => true,
            _ => false,
        }
    }
}

/// First filter, when it names both a column and a value. Keeps the value as
/// the user said it, before normalization.
fn candidate_entity(filter: &Filter) -> Option<PrimaryEntity> {
    let concept = filter.column_conceptual_name.as_deref().filter(|c| !c.is_empty())?;
    let value = match filter.value.as_ref()? {
        FilterValue::Text(text) if text.is_empty() => return None,
        FilterValue::Flag(false) => return None,
        FilterValue::Number(n) if n.as_f64() == Some(0.0) => return None,
        other => other.as_match_text(),
    };
    Some(PrimaryEntity::new(concept, value))
}

fn single_script_entity(plan: &Plan, aliases: &AliasMap, filtered: &Table) -> Option<PrimaryEntity> {
    if plan.operation != Some(Operation::FilterAndList) {
        return None;
    }
    let column = filtered.column_index(aliases.get(SCRIPT_NAME)?)?;
    let mut scripts = filtered.distinct_values(column);
    if scripts.len() == 1 {
        scripts.pop().map(|script| PrimaryEntity::new(SCRIPT_NAME, script))
    } else {
        None
    }
}

fn operation_entity(plan: &Plan) -> Option<PrimaryEntity> {
    match plan.operation {
        Some(Operation::CountItems) => plan
            .count_target_conceptual
            .as_deref()
            .map(|target| PrimaryEntity::new(target, SENTINEL_COUNTED)),
        Some(Operation::ListUniqueValues) if plan.filters.is_empty() => plan
            .list_unique_target_conceptual
            .as_deref()
            .map(|target| PrimaryEntity::new(target, SENTINEL_LISTED)),
        _ => None,
    }
}

fn filter_and_list(
    plan: &Plan,
    default_display: &[String],
    aliases: &AliasMap,
    filtered: &Table,
) -> Result<Reply> {
    let requested = plan
        .display_columns_conceptual
        .as_deref()
        .unwrap_or(default_display);

    let mut indices: Vec<usize> = Vec::new();
    for concept in requested {
        let index = aliases.get(concept).and_then(|actual| filtered.column_index(actual));
        if let Some(index) = index {
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
    }

    if indices.is_empty() {
        indices = filtered
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, name)| aliases.contains_actual(name))
            .map(|(i, _)| i)
            .collect();
    }
    if indices.is_empty() {
        indices = (0..filtered.columns().len()).collect();
    }
    if indices.is_empty() {
        return Err(QueryError::DisplayFormat(
            "Data found, but no valid columns to display.".to_string(),
        ));
    }

    let shown = filtered.project(&indices).dedup_rows();
    Ok(Reply::Table(TableReply::from(&shown)))
}

fn count_items(plan: &Plan, aliases: &AliasMap, filtered: &Table) -> Result<Reply> {
    let Some(target) = plan.count_target_conceptual.as_deref() else {
        return Ok(Reply::text(format!(
            "Found {} records matching your criteria.",
            filtered.len()
        )));
    };

    let actual = aliases
        .get(target)
        .ok_or_else(|| QueryError::not_mapped(ColumnRole::Count, target))?;
    let column = filtered
        .column_index(actual)
        .ok_or_else(|| QueryError::not_mapped(ColumnRole::Count, target))?;

    if plan.count_distinct {
        let count = filtered.distinct_values(column).len();
        let label = entity_label(target);
        let label = if count == 1 { label } else { format!("{}s", label) };
        Ok(Reply::text(format!(
            "Found {} distinct {} ({}) matching your criteria.",
            count, label, actual
        )))
    } else {
        Ok(Reply::text(format!(
            "Found {} items/records where '{}' is present, matching criteria.",
            filtered.count_present(column),
            entity_label(target)
        )))
    }
}

fn list_unique_values(plan: &Plan, aliases: &AliasMap, table: &Table, filtered: &Table) -> Result<Reply> {
    let target = plan
        .list_unique_target_conceptual
        .as_deref()
        .unwrap_or(UNNAMED);
    let actual = aliases
        .get(target)
        .filter(|actual| table.has_column(actual))
        .ok_or_else(|| QueryError::not_mapped(ColumnRole::ListUnique, target))?;

    // `filtered` is non-empty here, so it is the source whenever filters ran.
    let source = if plan.filters.is_empty() { table } else { filtered };
    let column = source
        .column_index(actual)
        .ok_or_else(|| QueryError::not_mapped(ColumnRole::ListUnique, target))?;

    let mut values = source.distinct_values(column);
    if values.is_empty() {
        return Ok(Reply::text(format!(
            "No data to list unique values for '{}'.",
            actual
        )));
    }
    values.sort();

    Ok(Reply::text(format!(
        "Unique values for '{}':\n{}",
        actual,
        values.join("\n")
    )))
}

/// `script_name_conceptual` -> `Script`.
fn entity_label(concept: &str) -> String {
    let stem = concept.replace("_conceptual", "").replace("_name", "");
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::query::aliases::{ColumnAliases, FIELD_NAME, FORM_NAME, NAMESPACE, SERVICE_NAME};
    use crate::query::normalize::Verbatim;
    use proptest::prelude::*;

    fn registry(rows: &[[&str; 3]]) -> Table {
        Table::new(
            vec!["Form Name".into(), "Script Name".into(), "Namespace".into()],
            rows.iter()
                .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
                .collect(),
        )
    }

    fn aliases_for(table: &Table) -> AliasMap {
        ColumnAliases::default().resolve(table.columns())
    }

    fn list(filters: Vec<Filter>) -> Plan {
        let mut plan = Plan::answerable(Operation::FilterAndList);
        plan.filters = filters;
        plan
    }

    fn text(reply: &Reply) -> &str {
        reply.as_text().expect("text reply")
    }

    mod scenario_tests {
        use super::*;

        #[test]
        fn exact_filter_lists_matching_script() {
            let table = registry(&[
                ["Patient Demographics", "ScriptX", "PROD"],
                ["Diagnosis", "ScriptY", "PROD"],
            ]);
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            let plan = list(vec![Filter::new(FORM_NAME, MatchType::Exact, "Patient Demographics")]);

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);

            let Reply::Table(grid) = reply else {
                panic!("expected table, got {:?}", reply);
            };
            assert_eq!(grid.rows.len(), 1);
            assert!(grid.rows[0].contains(&"ScriptX".to_string()));
            assert_eq!(
                ctx.last_primary_entity(),
                Some(&PrimaryEntity::new(SCRIPT_NAME, "ScriptX"))
            );
            assert_eq!(ctx.last_successful_plan(), Some(&plan));
        }

        #[test]
        fn distinct_count_over_contains_filter() {
            let table = registry(&[
                ["PhD Progress Note", "S1", "PROD"],
                ["Special Use Progress Note", "S2", "PROD"],
                ["Diagnosis", "S1", "PROD"],
            ]);
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            let mut plan = Plan::answerable(Operation::CountItems)
                .with_filter(Filter::new(FORM_NAME, MatchType::Contains, "progress note"));
            plan.count_target_conceptual = Some(SCRIPT_NAME.to_string());
            plan.count_distinct = true;

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);

            assert_eq!(
                text(&reply),
                "Found 2 distinct Scripts (Script Name) matching your criteria."
            );
            // Filter candidate outranks the count sentinel.
            assert_eq!(
                ctx.last_primary_entity(),
                Some(&PrimaryEntity::new(FORM_NAME, "progress note"))
            );
        }

        #[test]
        fn empty_result_clears_plan() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            let executor = PlanExecutor::new();

            executor.execute(&table, &aliases, &list(vec![]), &mut ctx);
            assert!(ctx.last_successful_plan().is_some());

            let plan = list(vec![Filter::new(FORM_NAME, MatchType::Exact, "Billing Claims")]);
            let reply = executor.execute(&table, &aliases, &plan, &mut ctx);

            assert_eq!(text(&reply), NO_DATA_FOUND);
            assert!(ctx.last_successful_plan().is_none());
            assert_eq!(
                ctx.last_primary_entity(),
                Some(&PrimaryEntity::new(FORM_NAME, "Billing Claims"))
            );
        }

        #[test]
        fn replaying_stored_plan_reproduces_result() {
            let table = registry(&[["Patient Demographics", "ScriptX", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            let executor = PlanExecutor::new();
            let plan = list(vec![Filter::new(FORM_NAME, MatchType::Exact, "Patient Demographics")]);

            let first = executor.execute(&table, &aliases, &plan, &mut ctx);
            let stored = ctx.last_successful_plan().cloned().unwrap();
            let second = executor.execute(&table, &aliases, &stored, &mut ctx);

            assert_eq!(first, second);
        }

        #[test]
        fn unmapped_filter_column_leaves_context_untouched() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            let executor = PlanExecutor::new();
            executor.execute(&table, &aliases, &list(vec![]), &mut ctx);
            let before = ctx.clone();

            let plan = list(vec![Filter::new("owner_conceptual", MatchType::Exact, "me")]);
            let reply = executor.execute(&table, &aliases, &plan, &mut ctx);

            assert_eq!(reply.error_code(), Some(ErrorCode::ColumnNotMapped));
            assert!(text(&reply).contains("owner_conceptual"));
            assert_eq!(ctx, before);
        }
    }

    mod filter_tests {
        use super::*;

        #[test]
        fn match_types_compare_case_insensitively() {
            let table = registry(&[
                ["Diagnosis", "S1", "PROD"],
                ["diagnosis history", "S2", "PROD"],
                ["Billing", "S3", "TEST"],
            ]);
            let aliases = aliases_for(&table);
            let executor = PlanExecutor::with_normalizer(Arc::new(Verbatim));
            let run = |m: MatchType| {
                let mut plan = Plan::answerable(Operation::CountItems)
                    .with_filter(Filter::new(FORM_NAME, m, "DIAGNOSIS"));
                plan.count_target_conceptual = None;
                let reply = executor.execute(&table, &aliases, &plan, &mut ConversationContext::new());
                text(&reply).to_string()
            };

            assert_eq!(run(MatchType::Exact), "Found 1 records matching your criteria.");
            assert_eq!(run(MatchType::Contains), "Found 2 records matching your criteria.");
            assert_eq!(run(MatchType::NotExact), "Found 2 records matching your criteria.");
        }

        #[test]
        fn missing_cells_only_survive_not_exact() {
            let table = Table::new(
                vec!["Form".into(), "Script".into()],
                vec![
                    vec![CellValue::Missing, "S1".into()],
                    vec!["Diagnosis".into(), "S2".into()],
                ],
            );
            let aliases = aliases_for(&table);
            let executor = PlanExecutor::new();
            let count = |m: MatchType, v: &str| {
                let plan = Plan::answerable(Operation::CountItems).with_filter(Filter::new(FORM_NAME, m, v));
                let reply = executor.execute(&table, &aliases, &plan, &mut ConversationContext::new());
                text(&reply).to_string()
            };

            assert_eq!(count(MatchType::Contains, "nan"), NO_DATA_FOUND);
            assert_eq!(count(MatchType::Exact, ""), NO_DATA_FOUND);
            assert_eq!(count(MatchType::NotExact, "diagnosis"), "Found 1 records matching your criteria.");
        }

        #[test]
        fn numbers_compare_as_integral_text() {
            let table = Table::new(
                vec!["Field_ID".into(), "Script".into()],
                vec![vec![1204.0.into(), "S1".into()], vec![15.5.into(), "S2".into()]],
            );
            let aliases = aliases_for(&table);
            let plan = list(vec![Filter {
                column_conceptual_name: Some(FIELD_NAME.into()),
                match_type: Some(MatchType::Exact),
                value: Some(FilterValue::Number(1204.into())),
            }]);
            let mut ctx = ConversationContext::new();

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);
            let Reply::Table(grid) = reply else { panic!("expected table") };
            assert_eq!(grid.rows, vec![vec!["S1".to_string(), "1204".to_string()]]);
        }

        #[test]
        fn filter_values_are_normalized_before_matching() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let plan = list(vec![Filter::new(FORM_NAME, MatchType::Exact, "Diagnosis Form")]);
            let mut ctx = ConversationContext::new();

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);
            assert_eq!(reply.reply_type(), crate::query::reply::ReplyType::Table);

            let reply = PlanExecutor::with_normalizer(Arc::new(Verbatim))
                .execute(&table, &aliases, &plan, &mut ctx);
            assert_eq!(text(&reply), NO_DATA_FOUND);
        }

        #[test]
        fn missing_match_type_defaults_to_contains() {
            let table = registry(&[["PhD Progress Note", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let plan = list(vec![Filter {
                column_conceptual_name: Some(FORM_NAME.into()),
                match_type: None,
                value: Some("phd".into()),
            }]);
            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(reply.reply_type(), crate::query::reply::ReplyType::Table);
        }

        #[test]
        fn unknown_match_type_is_reported() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let plan = list(vec![Filter::new(FORM_NAME, MatchType::Other("regex".into()), "d.*")]);
            let mut ctx = ConversationContext::new();

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);
            assert_eq!(reply.error_code(), Some(ErrorCode::UnsupportedMatchType));
            assert_eq!(text(&reply), "Unsupported match_type: 'regex'.");
            assert_eq!(ctx, ConversationContext::new());
        }

        #[test]
        fn missing_value_is_reported() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let plan = list(vec![Filter {
                column_conceptual_name: Some(FORM_NAME.into()),
                match_type: Some(MatchType::Exact),
                value: None,
            }]);
            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(reply.error_code(), Some(ErrorCode::MissingFilterValue));
            assert_eq!(text(&reply), "Filter Error: No value for filtering 'form_name_conceptual'.");
        }

        #[test]
        fn column_is_checked_before_match_type() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let plan = list(vec![Filter {
                column_conceptual_name: Some("owner_conceptual".into()),
                match_type: Some(MatchType::Other("fuzzy".into())),
                value: None,
            }]);
            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(reply.error_code(), Some(ErrorCode::ColumnNotMapped));
        }

        #[test]
        fn mapping_to_absent_column_fails_filtering() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases: AliasMap = [
                (FORM_NAME.to_string(), "Gone".to_string()),
                (SCRIPT_NAME.to_string(), "Script Name".to_string()),
            ]
            .into_iter()
            .collect();
            let mut ctx = ConversationContext::new();
            let executor = PlanExecutor::new();
            executor.execute(&table, &aliases, &list(vec![]), &mut ctx);
            let before = ctx.clone();

            let plan = list(vec![Filter::new(FORM_NAME, MatchType::Exact, "Diagnosis")]);
            let reply = executor.execute(&table, &aliases, &plan, &mut ctx);

            assert_eq!(reply.error_code(), Some(ErrorCode::FilterExecutionError));
            assert!(text(&reply).contains("'Gone'"), "{}", text(&reply));
            assert_eq!(ctx, before);
        }

        fn arb_match_type() -> impl Strategy<Value = MatchType> {
            prop_oneof![
                Just(MatchType::Exact),
                Just(MatchType::Contains),
                Just(MatchType::NotExact),
            ]
        }

        proptest! {
            #[test]
            fn filter_order_does_not_change_rows(
                rows in proptest::collection::vec(("[ab]{1,2}", "[xy]{1,2}"), 0..12),
                form_match in arb_match_type(),
                script_match in arb_match_type(),
                form_value in "[ab]{1,2}",
                script_value in "[xy]{1,2}",
            ) {
                let table = Table::new(
                    vec!["Form".into(), "Script".into()],
                    rows.iter().map(|(f, s)| vec![f.as_str().into(), s.as_str().into()]).collect(),
                );
                let aliases = aliases_for(&table);
                let executor = PlanExecutor::new();
                let a = Filter::new(FORM_NAME, form_match, form_value.as_str());
                let b = Filter::new(SCRIPT_NAME, script_match, script_value.as_str());

                let mut forward = list(vec![a.clone(), b.clone()]);
                forward.display_columns_conceptual = Some(vec![FORM_NAME.into(), SCRIPT_NAME.into()]);
                let mut backward = forward.clone();
                backward.filters = vec![b, a];

                let first = executor.execute(&table, &aliases, &forward, &mut ConversationContext::new());
                let second = executor.execute(&table, &aliases, &backward, &mut ConversationContext::new());
                prop_assert_eq!(first, second);
            }
        }
    }

    mod context_tests {
        use super::*;

        fn seeded() -> ConversationContext {
            let table = registry(&[["Diagnosis", "Seed", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            PlanExecutor::new().execute(&table, &aliases, &list(vec![]), &mut ctx);
            ctx
        }

        proptest! {
            #[test]
            fn not_answerable_plans_leave_context_alone(reason in "[a-zA-Z ]{0,40}") {
                let table = registry(&[["Diagnosis", "S1", "PROD"]]);
                let aliases = aliases_for(&table);
                let mut ctx = seeded();
                let before = ctx.clone();

                let reply = PlanExecutor::new().execute(&table, &aliases, &Plan::not_answerable(reason.clone()), &mut ctx);

                prop_assert_eq!(reply.error_code(), Some(ErrorCode::NotAnswerable));
                prop_assert!(text(&reply).contains(&reason));
                prop_assert_eq!(ctx, before);
            }
        }

        #[test]
        fn not_answerable_without_reason_uses_default() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let plan = Plan::default();
            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(text(&reply), "I cannot answer that. Reason: AI determined it is not answerable.");
        }

        #[test]
        fn empty_alias_map_is_not_initialized() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let reply = PlanExecutor::new().execute(
                &table,
                &AliasMap::default(),
                &list(vec![]),
                &mut ConversationContext::new(),
            );
            assert_eq!(reply.error_code(), Some(ErrorCode::NotInitialized));
        }

        #[test]
        fn several_scripts_fall_back_to_filter_candidate() {
            let table = registry(&[["Diagnosis", "S1", "PROD"], ["Diagnosis", "S2", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            let plan = list(vec![Filter::new(FORM_NAME, MatchType::Contains, "Diagnosis Form")]);

            PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);
            // Raw value, before suffix stripping.
            assert_eq!(
                ctx.last_primary_entity(),
                Some(&PrimaryEntity::new(FORM_NAME, "Diagnosis Form"))
            );
        }

        #[test]
        fn zero_filter_value_is_not_an_entity() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = seeded();
            let mut plan = Plan::answerable(Operation::CountItems).with_filter(Filter {
                column_conceptual_name: Some(FORM_NAME.into()),
                match_type: Some(MatchType::Exact),
                value: Some(FilterValue::Number(0.into())),
            });
            plan.count_target_conceptual = None;

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);

            assert_eq!(text(&reply), NO_DATA_FOUND);
            assert!(ctx.last_successful_plan().is_none());
            assert_eq!(ctx.last_primary_entity(), None);
        }

        #[test]
        fn unfiltered_count_uses_sentinel() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = seeded();
            let mut plan = Plan::answerable(Operation::CountItems);
            plan.count_target_conceptual = Some(FORM_NAME.into());

            PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);
            assert_eq!(
                ctx.last_primary_entity(),
                Some(&PrimaryEntity::new(FORM_NAME, SENTINEL_COUNTED))
            );
        }

        #[test]
        fn unfiltered_list_unique_uses_sentinel() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            let mut plan = Plan::answerable(Operation::ListUniqueValues);
            plan.list_unique_target_conceptual = Some(NAMESPACE.into());

            PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);
            assert_eq!(
                ctx.last_primary_entity(),
                Some(&PrimaryEntity::new(NAMESPACE, SENTINEL_LISTED))
            );
        }

        #[test]
        fn multi_script_list_without_filters_keeps_entity() {
            let table = registry(&[["Diagnosis", "S1", "PROD"], ["Billing", "S2", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = seeded();
            let before = ctx.last_primary_entity().cloned();

            PlanExecutor::new().execute(&table, &aliases, &list(vec![]), &mut ctx);
            assert_eq!(ctx.last_primary_entity().cloned(), before);
        }

        #[test]
        fn unsupported_operation_still_commits_plan() {
            let table = registry(&[["Diagnosis", "S1", "PROD"]]);
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            let plan = Plan::answerable(Operation::Other("sum_values".into()));

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);
            assert_eq!(text(&reply), "Unsupported operation: 'sum_values'.");
            assert_eq!(ctx.last_successful_plan(), Some(&plan));
        }
    }

    mod operation_tests {
        use super::*;

        fn wide_registry() -> Table {
            Table::new(
                vec![
                    "ScriptName".into(),
                    "FormName".into(),
                    "Service".into(),
                    "Notes".into(),
                ],
                vec![
                    vec!["S1".into(), "Diagnosis".into(), "svc-a".into(), "x".into()],
                    vec!["S1".into(), "Diagnosis".into(), "svc-a".into(), "y".into()],
                    vec!["S2".into(), "Billing".into(), CellValue::Missing, "z".into()],
                ],
            )
        }

        #[test]
        fn default_display_columns_follow_fixed_order_and_dedup() {
            let table = wide_registry();
            let aliases = aliases_for(&table);
            let reply = PlanExecutor::new().execute(&table, &aliases, &list(vec![]), &mut ConversationContext::new());

            let Reply::Table(grid) = reply else { panic!("expected table") };
            assert_eq!(grid.columns, vec!["ScriptName", "FormName", "Service"]);
            assert_eq!(grid.rows.len(), 2);
        }

        #[test]
        fn configured_default_display_is_used() {
            let table = wide_registry();
            let aliases = aliases_for(&table);
            let executor = PlanExecutor::new().with_default_display(vec![FORM_NAME.into()]);

            let reply = executor.execute(&table, &aliases, &list(vec![]), &mut ConversationContext::new());
            let Reply::Table(grid) = reply else { panic!("expected table") };
            assert_eq!(grid.columns, vec!["FormName"]);
            assert_eq!(grid.rows.len(), 2);
        }

        #[test]
        fn unusable_display_columns_fall_back_to_mapped_columns() {
            let table = wide_registry();
            let aliases = aliases_for(&table);
            let mut plan = list(vec![]);
            plan.display_columns_conceptual = Some(vec!["owner_conceptual".into(), NAMESPACE.into()]);

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            let Reply::Table(grid) = reply else { panic!("expected table") };
            assert_eq!(grid.columns, vec!["ScriptName", "FormName", "Service"]);
        }

        #[test]
        fn falls_back_to_every_column_when_nothing_is_mapped() {
            let table = Table::new(
                vec!["Script".into(), "Notes".into()],
                vec![vec!["S1".into(), "n".into()]],
            );
            // No table column appears among the map's actual names.
            let aliases: AliasMap = [(FORM_NAME.to_string(), "Elsewhere".to_string())]
                .into_iter()
                .collect();
            let mut plan = list(vec![]);
            plan.display_columns_conceptual = Some(vec![SCRIPT_NAME.into()]);

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            let Reply::Table(grid) = reply else { panic!("expected table") };
            assert_eq!(grid.columns, vec!["Script", "Notes"]);
        }

        #[test]
        fn rows_without_columns_cannot_be_displayed() {
            let table = Table::new(vec![], vec![vec![]]);
            let aliases: AliasMap = [(FORM_NAME.to_string(), "Form Name".to_string())]
                .into_iter()
                .collect();

            let reply = PlanExecutor::new().execute(&table, &aliases, &list(vec![]), &mut ConversationContext::new());

            assert_eq!(reply.error_code(), Some(ErrorCode::DisplayFormatError));
            assert_eq!(
                text(&reply),
                "Error displaying results as table. Data found, but no valid columns to display."
            );
        }

        #[test]
        fn non_distinct_count_ignores_missing_cells() {
            let table = wide_registry();
            let aliases = aliases_for(&table);
            let mut plan = Plan::answerable(Operation::CountItems);
            plan.count_target_conceptual = Some(SERVICE_NAME.into());

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(
                text(&reply),
                "Found 2 items/records where 'Service' is present, matching criteria."
            );
        }

        #[test]
        fn distinct_count_of_one_is_singular() {
            let table = wide_registry();
            let aliases = aliases_for(&table);
            let mut plan = Plan::answerable(Operation::CountItems)
                .with_filter(Filter::new(FORM_NAME, MatchType::Exact, "Diagnosis"));
            plan.count_target_conceptual = Some(SCRIPT_NAME.into());
            plan.count_distinct = true;

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(
                text(&reply),
                "Found 1 distinct Script (ScriptName) matching your criteria."
            );
        }

        #[test]
        fn count_of_unmapped_target_fails_after_commit() {
            let table = wide_registry();
            let aliases = aliases_for(&table);
            let mut ctx = ConversationContext::new();
            let mut plan = Plan::answerable(Operation::CountItems);
            plan.count_target_conceptual = Some(NAMESPACE.into());

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ctx);
            assert_eq!(
                text(&reply),
                "Count Error: Conceptual column 'namespace_conceptual' not mapped."
            );
            assert!(ctx.last_successful_plan().is_some());
        }

        #[test]
        fn list_unique_is_sorted_and_skips_missing() {
            let table = wide_registry();
            let aliases = aliases_for(&table);
            let mut plan = Plan::answerable(Operation::ListUniqueValues);
            plan.list_unique_target_conceptual = Some(SERVICE_NAME.into());

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(text(&reply), "Unique values for 'Service':\nsvc-a");

            plan.list_unique_target_conceptual = Some(FORM_NAME.into());
            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(text(&reply), "Unique values for 'FormName':\nBilling\nDiagnosis");
        }

        #[test]
        fn list_unique_uses_filtered_rows_when_filtered() {
            let table = wide_registry();
            let aliases = aliases_for(&table);
            let mut plan = Plan::answerable(Operation::ListUniqueValues)
                .with_filter(Filter::new(SCRIPT_NAME, MatchType::Exact, "S2"));
            plan.list_unique_target_conceptual = Some(FORM_NAME.into());

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(text(&reply), "Unique values for 'FormName':\nBilling");
        }

        #[test]
        fn list_unique_of_empty_column_says_so() {
            let table = Table::new(
                vec!["Script".into(), "Namespace".into()],
                vec![vec!["S1".into(), CellValue::Missing]],
            );
            let aliases = aliases_for(&table);
            let mut plan = Plan::answerable(Operation::ListUniqueValues);
            plan.list_unique_target_conceptual = Some(NAMESPACE.into());

            let reply = PlanExecutor::new().execute(&table, &aliases, &plan, &mut ConversationContext::new());
            assert_eq!(text(&reply), "No data to list unique values for 'Namespace'.");
        }

        #[test]
        fn labels_drop_suffixes() {
            assert_eq!(entity_label(SCRIPT_NAME), "Script");
            assert_eq!(entity_label(NAMESPACE), "Namespace");
            assert_eq!(entity_label("EHR_name_conceptual"), "Ehr");
        }
    }
}
