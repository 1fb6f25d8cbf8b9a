use std::fmt;

use serde::{Deserialize, Serialize};

/// One scalar cell read from the source table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used for range and average statistics.
    ///
    /// Text is parsed leniently so `NUMERIC` columns stored as strings still count.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Truthiness of a status-like cell. `None` for nulls and unrecognized values.
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            Value::Null | Value::Blob(_) => None,
            Value::Bool(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Real(r) => Some(*r != 0.0),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" | "active" => Some(true),
                "false" | "f" | "no" | "n" | "0" | "inactive" => Some(false),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Blob(b) => f.write_str(&hex::encode(b)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One tuple, aligned with the owning [`RowSet`]'s columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }
}

/// Tabular result of one fetch: rows × named columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RowSet {
    /// Rows shorter or longer than `columns` are padded with nulls / truncated.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.values.resize(width, Value::Null);
                r
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
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

    /// Cell lookup by column name; `None` when the column does not exist.
    pub fn value<'a>(&'a self, row: &'a Row, column: &str) -> Option<&'a Value> {
        self.column_index(column).and_then(|i| row.values.get(i))
    }

    pub fn column_values<'a>(&'a self, column: &str) -> Vec<&'a Value> {
        match self.column_index(column) {
            Some(i) => self.rows.iter().filter_map(|r| r.values.get(i)).collect(),
            None => Vec::new(),
        }
    }

    /// Returns a copy with one computed column appended (or replaced, if the name exists).
    pub fn with_derived_column<F>(&self, name: &str, mut derive: F) -> RowSet
    where
        F: FnMut(&RowSet, &Row) -> Value,
    {
        let existing = self.column_index(name);
        let mut columns = self.columns.clone();
        if existing.is_none() {
            columns.push(name.to_string());
        }

        let rows = self
            .rows
            .iter()
            .map(|r| {
                let v = derive(self, r);
                let mut values = r.values.clone();
                match existing {
                    Some(i) => values[i] = v,
                    None => values.push(v),
                }
                Row::new(values)
            })
            .collect();

        RowSet { columns, rows }
    }
}

/// Column roles used by the narrative line and the summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SummaryColumns {
    pub type_column: String,
    pub date_column: String,
    pub value_column: String,
    pub status_column: String,
}

impl Default for SummaryColumns {
    fn default() -> Self {
        Self {
            type_column: "type".to_string(),
            date_column: "date".to_string(),
            value_column: "value".to_string(),
            status_column: "status".to_string(),
        }
    }
}
