//! Loading the registry from disk.
//!
//! Spreadsheets (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) go through
//! calamine; `.csv` goes through the csv reader with per-column numeric
//! inference. The first row is always the header.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, ExcelDateTime, Reader};
use thiserror::Error;

use super::{CellValue, Table};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Table file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported table format '{0}' (expected .xlsx, .xlsm, .xlsb, .xls, .ods or .csv)")]
    UnsupportedFormat(String),

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Worksheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Workbook has no worksheets")]
    NoSheets,

    #[error("Table has no header row")]
    MissingHeader,
}

/// Load a table from `path`. `sheet` selects a worksheet by name for
/// spreadsheet formats; the first sheet is used when it is `None`.
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<Table, TableError> {
    if !path.exists() {
        return Err(TableError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let table = match extension.as_str() {
        "csv" => load_csv(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_spreadsheet(path, sheet)?,
        other => return Err(TableError::UnsupportedFormat(other.to_string())),
    };

    tracing::info!(
        "Loaded table from {:?}: {} rows, {} columns",
        path,
        table.len(),
        table.columns().len()
    );
    Ok(table)
}

fn load_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<Table, TableError> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet_name = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(TableError::SheetNotFound(name.to_string()));
            }
            name.to_string()
        }
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(TableError::NoSheets)?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();

    let header = rows.next().ok_or(TableError::MissingHeader)?;
    let columns = header_names(header.iter().map(|cell| match convert_cell(cell) {
        CellValue::Missing => String::new(),
        value => value.to_string(),
    }));

    let body = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    Ok(Table::new(columns, body))
}

fn convert_cell(value: &Data) -> CellValue {
    match value {
        Data::Empty => CellValue::Missing,
        Data::Error(_) => CellValue::Missing,
        Data::Bool(v) => CellValue::text(if *v { "True" } else { "False" }),
        Data::Int(v) => CellValue::number(*v as f64),
        Data::Float(v) => CellValue::number(*v),
        Data::String(v) => CellValue::text(v.clone()),
        Data::DateTime(v) => convert_datetime(v),
        Data::DateTimeIso(v) => CellValue::text(v.clone()),
        Data::DurationIso(v) => CellValue::text(v.clone()),
    }
}

/// Dates render as `YYYY-MM-DD HH:MM:SS`; durations stay numeric.
fn convert_datetime(value: &ExcelDateTime) -> CellValue {
    if value.is_datetime() {
        if let Some(dt) = value.as_datetime() {
            return CellValue::text(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }
    CellValue::number(value.as_f64())
}

fn load_csv(path: &Path) -> Result<Table, TableError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(TableError::MissingHeader);
    }
    let columns = header_names(headers.iter().map(str::to_string));

    let mut raw: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        raw.push(record.iter().map(str::to_string).collect());
    }

    // A column is numeric only if every non-blank field parses as a number.
    let numeric: Vec<bool> = (0..columns.len())
        .map(|i| {
            let mut fields = raw
                .iter()
                .filter_map(|row| row.get(i))
                .filter(|f| !f.trim().is_empty())
                .peekable();
            fields.peek().is_some() && fields.all(|f| f.trim().parse::<f64>().is_ok())
        })
        .collect();

    let rows = raw
        .into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(i, field)| match numeric.get(i) {
                    Some(true) => field
                        .trim()
                        .parse::<f64>()
                        .map(CellValue::number)
                        .unwrap_or(CellValue::Missing),
                    _ => CellValue::text(field),
                })
                .collect()
        })
        .collect();

    Ok(Table::new(columns, rows))
}

/// Blank headers become `Unnamed: <index>`.
fn header_names(names: impl Iterator<Item = String>) -> Vec<String> {
    names
        .enumerate()
        .map(|(i, name)| {
            if name.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name
            }
        })
        .collect()
}
