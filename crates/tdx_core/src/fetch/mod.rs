//! Row Fetcher: reads one table into a [`RowSet`].
//!
//! Every call opens its own read-only connection and drops it before returning.
//! Table and column names must be plain identifiers and are always backtick-quoted;
//! predicate values are always bound parameters, never spliced into SQL.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::db;
use crate::domain::{Row, RowSet, Value};
use crate::error::{AppError, ErrorKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clause {
    pub column: String,
    pub op: Op,
    pub value: Value,
}

/// Conjunction of simple comparisons (`a = ? AND b >= ?`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clause(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clause(column, Op::Eq, value)
    }

    pub fn ge(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clause(column, Op::Ge, value)
    }

    pub fn le(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clause(column, Op::Le, value)
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// SQL predicate text (without `WHERE`) plus the values to bind, in order.
    pub fn render(&self) -> Result<(String, Vec<Value>), AppError> {
        let mut parts = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::with_capacity(self.clauses.len());
        for (i, c) in self.clauses.iter().enumerate() {
            let col = quote_ident(&c.column)?;
            parts.push(format!("{col} {} ?{}", c.op.as_sql(), i + 1));
            params.push(c.value.clone());
        }
        Ok((parts.join(" AND "), params))
    }
}

/// Quote a table/column name after checking it is a plain identifier.
///
/// Backticks, not double quotes: SQLite falls back to treating an unknown
/// double-quoted name as a string literal, which would hide a missing column.
pub fn quote_ident(name: &str) -> Result<String, AppError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(AppError::new(
            ErrorKind::Query,
            "DB_IDENTIFIER_INVALID",
            "Table and column names must be plain identifiers",
        )
        .with_details(format!("name={name:?}")));
    }
    Ok(format!("`{name}`"))
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(r) => ToSqlOutput::from(*r),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Bool(b) => ToSqlOutput::from(*b),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
        })
    }
}

fn value_from_ref(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

#[derive(Debug, Clone)]
pub struct RowFetcher {
    path: PathBuf,
    busy_timeout: Duration,
}

impl RowFetcher {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            path: config.path.clone(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }

    /// Open and close one connection. Used for start-up diagnostics.
    pub fn check_connection(&self) -> Result<(), AppError> {
        let conn = db::open_read_only(&self.path, self.busy_timeout)?;
        drop(conn);
        info!(path = %self.path.display(), "database connection ok");
        Ok(())
    }

    /// `SELECT * FROM <table> [WHERE <filter>]`.
    ///
    /// A filter matching nothing yields an empty (not absent) [`RowSet`].
    pub fn fetch(&self, table: &str, filter: Option<&Filter>) -> Result<RowSet, AppError> {
        let table_sql = quote_ident(table)?;
        let (sql, params) = match filter {
            Some(f) if !f.is_empty() => {
                let (pred, params) = f.render()?;
                (format!("SELECT * FROM {table_sql} WHERE {pred}"), params)
            }
            _ => (format!("SELECT * FROM {table_sql}"), Vec::new()),
        };

        let conn = db::open_read_only(&self.path, self.busy_timeout)?;
        let rows = run_select(&conn, &sql, &params)?;
        drop(conn);

        info!(table, rows = rows.len(), filtered = filter.is_some(), "fetched rows");
        Ok(rows)
    }

    /// Rows whose `column` lies in `[start, end]` (inclusive, compared as stored).
    pub fn fetch_by_date_range(
        &self,
        table: &str,
        column: &str,
        start: &str,
        end: &str,
    ) -> Result<RowSet, AppError> {
        let filter = Filter::new().ge(column, start).le(column, end);
        self.fetch(table, Some(&filter))
    }
}

fn run_select(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> Result<RowSet, AppError> {
    debug!(sql, params = params.len(), "executing select");
    let mut stmt = conn.prepare(sql).map_err(|e| db::statement_error(e, sql))?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let width = columns.len();

    let mut cursor = stmt
        .query(rusqlite::params_from_iter(params.iter()))
        .map_err(|e| db::statement_error(e, sql))?;

    let mut rows = Vec::new();
    while let Some(r) = cursor.next().map_err(|e| db::statement_error(e, sql))? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            let v = r.get_ref(i).map_err(|e| db::statement_error(e, sql))?;
            values.push(value_from_ref(v));
        }
        rows.push(Row::new(values));
    }

    Ok(RowSet::new(columns, rows))
}
