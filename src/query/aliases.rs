//! Conceptual column names and their resolution against actual headers.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

pub const FORM_NAME: &str = "form_name_conceptual";
pub const SCRIPT_NAME: &str = "script_name_conceptual";
pub const FIELD_NAME: &str = "field_name_conceptual";
pub const SERVICE_NAME: &str = "service_name_conceptual";
pub const NAMESPACE: &str = "namespace_conceptual";

/// Columns shown by `filter_and_list` when the plan names none.
pub const DEFAULT_DISPLAY_COLUMNS: [&str; 5] =
    [SCRIPT_NAME, FORM_NAME, FIELD_NAME, SERVICE_NAME, NAMESPACE];

/// Ordered alias declarations: conceptual key -> ordered alias strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAliases {
    entries: Vec<(String, Vec<String>)>,
}

impl ColumnAliases {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Declare (or replace) the aliases of a conceptual key. Declaration
    /// order is kept; replacing a key keeps its original position.
    pub fn declare<I, S>(&mut self, conceptual: impl Into<String>, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let conceptual = conceptual.into();
        let aliases: Vec<String> = aliases.into_iter().map(Into::into).collect();
        match self.entries.iter_mut().find(|(key, _)| *key == conceptual) {
            Some(entry) => entry.1 = aliases,
            None => self.entries.push((conceptual, aliases)),
        }
    }

    pub fn with<I, S>(mut self, conceptual: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare(conceptual, aliases);
        self
    }

    /// Apply overrides from configuration on top of these declarations.
    pub fn merged(mut self, overrides: &BTreeMap<String, Vec<String>>) -> Self {
        for (conceptual, aliases) in overrides {
            self.declare(conceptual.clone(), aliases.iter().cloned());
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, aliases)| (key.as_str(), aliases.as_slice()))
    }

    /// Resolve against the actual column headers of a table.
    ///
    /// For each conceptual key, aliases are tried in declared order and each
    /// alias scans the headers in table order; the first header whose
    /// normalized form equals the normalized alias wins. Keys with no match
    /// are left out and logged.
    pub fn resolve(&self, actual_columns: &[String]) -> AliasMap {
        let mut entries = Vec::new();

        for (conceptual, aliases) in &self.entries {
            let found = aliases.iter().find_map(|alias| {
                let wanted = normalize_header(alias);
                actual_columns
                    .iter()
                    .find(|col| normalize_header(col) == wanted)
            });

            match found {
                Some(actual) => {
                    tracing::debug!("Mapped {} -> '{}'", conceptual, actual);
                    entries.push((conceptual.clone(), actual.clone()));
                }
                None => {
                    tracing::warn!(
                        "No column found for '{}' (aliases: {:?})",
                        conceptual,
                        aliases
                    );
                }
            }
        }

        AliasMap { entries }
    }
}

impl Default for ColumnAliases {
    /// The five registry categories and the header spellings seen in the
    /// registry exports.
    fn default() -> Self {
        ColumnAliases::new()
            .with(
                FORM_NAME,
                ["FormName", "Form Name", "Form", "Forms", "EHR Form"],
            )
            .with(
                SCRIPT_NAME,
                ["ScriptName", "Script Name", "Script", "Scripts", "EHR Script"],
            )
            .with(
                FIELD_NAME,
                [
                    "FieldName",
                    "Field Name",
                    "Field",
                    "Fields",
                    "Form Field",
                    "EHR Field",
                    "Field_Name",
                    "Field_ID",
                ],
            )
            .with(
                SERVICE_NAME,
                ["ServiceName", "Service Name", "Service", "Services", "EHR Service"],
            )
            .with(NAMESPACE, ["Namespace", "Namespaces", "Env", "Environment"])
    }
}

/// Header comparison form: spaces removed, lower-cased.
fn normalize_header(name: &str) -> String {
    name.replace(' ', "").to_lowercase()
}

/// Resolved conceptual -> actual column mapping. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    entries: Vec<(String, String)>,
}

impl AliasMap {
    pub fn get(&self, conceptual: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == conceptual)
            .map(|(_, actual)| actual.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains_actual(&self, actual: &str) -> bool {
        self.entries.iter().any(|(_, a)| a == actual)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for AliasMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

impl FromIterator<(String, String)> for AliasMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (key, value) in iter {
            if !entries.iter().any(|(k, _)| *k == key) {
                entries.push((key, value));
            }
        }
        AliasMap { entries }
    }
}
