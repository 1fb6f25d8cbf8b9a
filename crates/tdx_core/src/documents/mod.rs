use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Row, RowSet, SummaryColumns, Value};

/// Text + metadata unit derived from one source row; the atom that gets embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Content-derived: sha256 over `row_index` and `text`.
    pub id: String,
    pub row_index: usize,
    pub text: String,
    /// Every non-null column of the source row, rendered.
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(row_index: usize, text: String, metadata: BTreeMap<String, String>) -> Self {
        let payload = format!("row_index={row_index}\ntext={text}");
        let id = hex::encode(Sha256::digest(payload.as_bytes()));
        Self {
            id,
            row_index,
            text,
            metadata,
        }
    }
}

/// Convert each row into a [`Document`].
///
/// Every non-null column becomes a `column: value` line. The primary text
/// column (when present and non-null) comes first, the rest follow in column
/// order. All-null rows are skipped.
pub fn build_documents(rows: &RowSet, primary_text_column: &str) -> Vec<Document> {
    let primary = rows.column_index(primary_text_column);
    let mut out = Vec::with_capacity(rows.len());

    for (row_index, row) in rows.rows().iter().enumerate() {
        if row.is_all_null() {
            continue;
        }

        let mut lines: Vec<String> = Vec::new();
        let mut metadata = BTreeMap::new();

        if let Some(p) = primary {
            let v = &row.values()[p];
            if !v.is_null() {
                lines.push(format!("{primary_text_column}: {v}"));
            }
        }

        for (i, (col, v)) in rows.columns().iter().zip(row.values()).enumerate() {
            if v.is_null() {
                continue;
            }
            let rendered = v.to_string();
            if Some(i) != primary {
                lines.push(format!("{col}: {rendered}"));
            }
            metadata.insert(col.clone(), rendered);
        }

        out.push(Document::new(row_index, lines.join("\n"), metadata));
    }

    out
}

/// One-line narrative of a record, e.g.
/// `Type: 1, Date: 2025-10-01, Value: 10, Status: Active`.
pub fn describe_row(rows: &RowSet, row: &Row, columns: &SummaryColumns) -> Value {
    let cell = |name: &str| {
        rows.value(row, name)
            .filter(|v| !v.is_null())
            .map(Value::to_string)
            .unwrap_or_else(|| "unknown".to_string())
    };
    let status = match rows
        .value(row, &columns.status_column)
        .and_then(Value::truthiness)
    {
        Some(true) => "Active",
        Some(false) => "Inactive",
        None => "Unknown",
    };
    Value::Text(format!(
        "Type: {}, Date: {}, Value: {}, Status: {status}",
        cell(&columns.type_column),
        cell(&columns.date_column),
        cell(&columns.value_column),
    ))
}
