//! Filter value normalization.
//!
//! Users say "diagnosis form" or "phd progress note" where the registry
//! stores "Diagnosis" or "PhD PsyD SW MFT Progress Note". Stripping one
//! trailing descriptive word recovers a likely core identifier. This is a
//! heuristic: it also strips words that belong to the name ("Special Use
//! Note" becomes "special use"), so it sits behind a trait and can be
//! swapped per executor.

use super::plan::FilterValue;

pub trait ValueNormalizer: Send + Sync {
    fn normalize(&self, value: &FilterValue) -> FilterValue;
}

/// Lower-cases, trims, then removes the first matching suffix.
#[derive(Debug, Clone)]
pub struct SuffixStripper {
    suffixes: Vec<String>,
}

impl SuffixStripper {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn strip(&self, value: &str) -> String {
        let value = value.trim().to_lowercase();
        for suffix in &self.suffixes {
            if let Some(core) = value.strip_suffix(suffix.as_str()) {
                return core.to_string();
            }
        }
        value
    }
}

impl Default for SuffixStripper {
    fn default() -> Self {
        Self::new([" form", " note", " script"])
    }
}

impl ValueNormalizer for SuffixStripper {
    fn normalize(&self, value: &FilterValue) -> FilterValue {
        match value {
            FilterValue::Text(text) => FilterValue::Text(self.strip(text)),
            other => other.clone(),
        }
    }
}

/// Leaves values untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl ValueNormalizer for Verbatim {
    fn normalize(&self, value: &FilterValue) -> FilterValue {
        value.clone()
    }
}
