use pretty_assertions::assert_eq;

use tdx_core::domain::{Row, RowSet, SummaryColumns, Value};
use tdx_core::report::{render_summary, SummaryStats};

fn details() -> RowSet {
    RowSet::new(
        vec![
            "type".to_string(),
            "date".to_string(),
            "value".to_string(),
            "status".to_string(),
        ],
        vec![
            Row::new(vec![1i64.into(), "2025-10-01".into(), 10i64.into(), 1i64.into()]),
            Row::new(vec![2i64.into(), "2025-10-02".into(), 20i64.into(), 0i64.into()]),
            Row::new(vec![1i64.into(), "2025-10-03".into(), 30i64.into(), 1i64.into()]),
        ],
    )
}

#[test]
fn summary_matches_golden_text() {
    let stats = SummaryStats::compute(&details(), &SummaryColumns::default());
    let text = render_summary(&stats, Some("Values rise by 10 each day.\n"));

    let expected = "\
TableDigest Analysis Complete
=============================

Total Records: 3
Active Records: 2
Inactive Records: 1

Date Range: 2025-10-01 to 2025-10-03
Value Range: 10 to 30
Average Value: 20.00

Analysis Results:
Values rise by 10 each day.
";
    assert_eq!(text, expected);
}

#[test]
fn absent_answer_renders_none() {
    let stats = SummaryStats::compute(&details(), &SummaryColumns::default());
    let text = render_summary(&stats, None);
    assert!(text.ends_with("Analysis Results:\nNone\n"));
}

#[test]
fn missing_columns_render_not_available() {
    let rows = RowSet::new(
        vec!["other".to_string()],
        vec![Row::new(vec![Value::from("x")])],
    );
    let stats = SummaryStats::compute(&rows, &SummaryColumns::default());
    assert_eq!(stats.total_records, 1);
    assert_eq!(stats.active_records, 0);
    assert_eq!(stats.value_avg, None);

    let text = render_summary(&stats, None);
    assert!(text.contains("Date Range: n/a\n"));
    assert!(text.contains("Value Range: n/a\n"));
    assert!(text.contains("Average Value: n/a\n"));
}

#[test]
fn value_range_is_numeric_not_lexicographic() {
    let rows = RowSet::new(
        vec!["value".to_string(), "status".to_string()],
        vec![
            Row::new(vec![Value::Integer(9), Value::from("true")]),
            Row::new(vec![Value::Integer(100), Value::Null]),
            Row::new(vec![Value::Real(12.5), Value::Bool(false)]),
        ],
    );
    let stats = SummaryStats::compute(&rows, &SummaryColumns::default());
    assert_eq!(stats.value_min.as_deref(), Some("9"));
    assert_eq!(stats.value_max.as_deref(), Some("100"));
    assert_eq!(stats.active_records, 1);
    assert_eq!(stats.inactive_records, 1);
}
