//! Table Store for the script registry.
//!
//! The registry is loaded once at startup from a spreadsheet or CSV file and
//! never mutated afterwards. Queries work on filtered copies.
//!
//! Cells are a small sum type rather than dynamically coerced values: text
//! comparisons go through [`CellValue::as_text`], which is the single place
//! where numbers are rendered and missing cells are recognised.

mod loader;

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

pub use loader::{load_table, TableError};

/// A single cell of the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Missing,
}

impl CellValue {
    /// Build a text cell; blank strings are treated as missing, the way
    /// spreadsheet readers report empty cells.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            CellValue::Missing
        } else {
            CellValue::Text(value)
        }
    }

    /// Build a numeric cell; NaN is treated as missing.
    pub fn number(value: f64) -> Self {
        if value.is_nan() {
            CellValue::Missing
        } else {
            CellValue::Number(value)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Text form used for comparisons and display. `None` for missing cells.
    ///
    /// Integral numbers render without a fractional part (`42`, not `42.0`).
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            CellValue::Number(n) => Some(Cow::Owned(format_number(*n))),
            CellValue::Missing => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::number(value)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// An ordered collection of rows keyed by column position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Create a table. Rows shorter than the header are padded with missing
    /// cells; longer rows are truncated.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Missing);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column, in row order.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Copy of this table keeping only rows for which `keep` returns true.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[CellValue]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row.as_slice()))
                .cloned()
                .collect(),
        }
    }

    /// Copy of this table restricted to the given column positions, in order.
    pub fn project(&self, indices: &[usize]) -> Table {
        Table {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Remove rows that are exact duplicates of an earlier row.
    pub fn dedup_rows(mut self) -> Table {
        let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
        self.rows.retain(|row| {
            let key = row
                .iter()
                .map(|cell| cell.as_text().map(Cow::into_owned))
                .collect();
            seen.insert(key)
        });
        self
    }

    /// Distinct non-missing text values of a column, in first-seen order.
    pub fn distinct_values(&self, index: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for cell in self.column_values(index) {
            if let Some(text) = cell.as_text() {
                if seen.insert(text.to_string()) {
                    out.push(text.into_owned());
                }
            }
        }
        out
    }

    /// Number of non-missing cells in a column.
    pub fn count_present(&self, index: usize) -> usize {
        self.column_values(index)
            .filter(|cell| !cell.is_missing())
            .count()
    }
}
