//! Turn replies and their renderings.

use serde::Serialize;

use crate::error::{ErrorCode, QueryError};
use crate::table::Table;

/// What a turn produces. `Error` is a text reply that also carries a code.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Table(TableReply),
    Error { code: ErrorCode, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReply {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl From<&Table> for TableReply {
    fn from(table: &Table) -> Self {
        Self {
            columns: table.columns().to_vec(),
            rows: table
                .rows()
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        }
    }
}

impl From<QueryError> for Reply {
    fn from(err: QueryError) -> Self {
        Reply::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl Reply {
    pub fn text(message: impl Into<String>) -> Self {
        Reply::Text(message.into())
    }

    pub fn reply_type(&self) -> ReplyType {
        match self {
            Reply::Table(_) => ReplyType::Table,
            Reply::Text(_) | Reply::Error { .. } => ReplyType::Text,
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Reply::Error { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Text content, `None` for tables.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Error { message, .. } => Some(message),
            Reply::Table(_) => None,
        }
    }

    pub fn to_body(&self) -> ReplyBody {
        let reply = match self {
            Reply::Text(text) => ReplyContent::Text(text.clone()),
            Reply::Error { message, .. } => ReplyContent::Text(message.clone()),
            Reply::Table(table) => ReplyContent::Table(table.clone()),
        };
        ReplyBody {
            reply_type: self.reply_type(),
            reply,
            error_code: self.error_code(),
        }
    }

    /// Plain-text rendering for terminals.
    pub fn render(&self) -> String {
        match self {
            Reply::Text(text) => text.clone(),
            Reply::Error { message, .. } => message.clone(),
            Reply::Table(table) => format!("Results:\n{}", render_grid(table)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyType {
    Text,
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplyContent {
    Text(String),
    Table(TableReply),
}

/// Wire form of a reply: `{"reply_type", "reply", "error_code"?}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyBody {
    pub reply_type: ReplyType,
    pub reply: ReplyContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

fn render_grid(table: &TableReply) -> String {
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(table.rows.len() + 2);
    out.push(line(&table.columns));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &table.rows {
        out.push(line(row));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CellValue;

    fn sample_table() -> TableReply {
        TableReply::from(&Table::new(
            vec!["Script".into(), "Form".into()],
            vec![
                vec!["ScriptX".into(), "Patient Demographics".into()],
                vec![CellValue::Missing, 7.0.into()],
            ],
        ))
    }

    #[test]
    fn table_cells_render_as_text() {
        let table = sample_table();
        assert_eq!(table.rows[1], vec!["".to_string(), "7".to_string()]);
    }

    #[test]
    fn text_reply_wire_form() {
        let json = serde_json::to_value(Reply::text("hello").to_body()).unwrap();
        assert_eq!(json, serde_json::json!({"reply_type": "text", "reply": "hello"}));
    }

    #[test]
    fn error_reply_is_text_with_code() {
        let reply = Reply::from(QueryError::UnsupportedOperation("sum".into()));
        let json = serde_json::to_value(reply.to_body()).unwrap();
        assert_eq!(json["reply_type"], "text");
        assert_eq!(json["reply"], "Unsupported operation: 'sum'.");
        assert_eq!(json["error_code"], "UnsupportedOperation");
    }

    #[test]
    fn table_reply_wire_form() {
        let json = serde_json::to_value(Reply::Table(sample_table()).to_body()).unwrap();
        assert_eq!(json["reply_type"], "table");
        assert_eq!(json["reply"]["columns"][0], "Script");
        assert_eq!(json["reply"]["rows"][0][1], "Patient Demographics");
    }

    #[test]
    fn grid_aligns_columns() {
        let rendered = Reply::Table(sample_table()).render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Results:");
        assert_eq!(lines[1], "Script   Form");
        assert_eq!(lines[2], "-------  --------------------");
        assert_eq!(lines[3], "ScriptX  Patient Demographics");
        assert_eq!(lines[4], "         7");
    }
}
