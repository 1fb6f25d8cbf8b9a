use serde::{Deserialize, Serialize};

use crate::domain::{RowSet, SummaryColumns, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryStats {
    pub total_records: usize,
    pub active_records: usize,
    pub inactive_records: usize,
    pub date_min: Option<String>,
    pub date_max: Option<String>,
    pub value_min: Option<String>,
    pub value_max: Option<String>,
    pub value_avg: Option<f64>,
}

impl SummaryStats {
    /// Aggregate statistics over the fetched rows.
    ///
    /// Nulls are ignored everywhere; a status that is neither truthy nor falsy
    /// counts toward neither active nor inactive.
    pub fn compute(rows: &RowSet, columns: &SummaryColumns) -> Self {
        let mut active = 0usize;
        let mut inactive = 0usize;
        for v in rows.column_values(&columns.status_column) {
            match v.truthiness() {
                Some(true) => active += 1,
                Some(false) => inactive += 1,
                None => {}
            }
        }

        // Dates compare as rendered text; ISO-8601 sorts chronologically.
        let dates: Vec<String> = rows
            .column_values(&columns.date_column)
            .into_iter()
            .filter(|v| !v.is_null())
            .map(Value::to_string)
            .collect();
        let date_min = dates.iter().min().cloned();
        let date_max = dates.iter().max().cloned();

        let numeric: Vec<(f64, &Value)> = rows
            .column_values(&columns.value_column)
            .into_iter()
            .filter_map(|v| v.as_f64().map(|n| (n, v)))
            .collect();
        let value_min = numeric
            .iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, v)| v.to_string());
        let value_max = numeric
            .iter()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, v)| v.to_string());
        let value_avg = if numeric.is_empty() {
            None
        } else {
            Some(numeric.iter().map(|(n, _)| n).sum::<f64>() / numeric.len() as f64)
        };

        Self {
            total_records: rows.len(),
            active_records: active,
            inactive_records: inactive,
            date_min,
            date_max,
            value_min,
            value_max,
            value_avg,
        }
    }
}

fn range(min: &Option<String>, max: &Option<String>) -> String {
    match (min, max) {
        (Some(a), Some(b)) => format!("{a} to {b}"),
        _ => "n/a".to_string(),
    }
}

/// Plain-text summary mailed at the end of a run. An absent answer renders as `None`.
pub fn render_summary(stats: &SummaryStats, answer: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("TableDigest Analysis Complete\n");
    out.push_str("=============================\n\n");

    out.push_str(&format!("Total Records: {}\n", stats.total_records));
    out.push_str(&format!("Active Records: {}\n", stats.active_records));
    out.push_str(&format!("Inactive Records: {}\n\n", stats.inactive_records));

    out.push_str(&format!(
        "Date Range: {}\n",
        range(&stats.date_min, &stats.date_max)
    ));
    out.push_str(&format!(
        "Value Range: {}\n",
        range(&stats.value_min, &stats.value_max)
    ));
    match stats.value_avg {
        Some(avg) => out.push_str(&format!("Average Value: {avg:.2}\n\n")),
        None => out.push_str("Average Value: n/a\n\n"),
    }

    out.push_str("Analysis Results:\n");
    out.push_str(answer.map(str::trim).unwrap_or("None"));
    out.push('\n');
    out
}
