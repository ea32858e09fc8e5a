use std::collections::HashMap;

use chrono::SecondsFormat;

use super::stats::TestReport;
use super::{ActionEntry, RequestId};

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Export raw action entries as CSV.
///
/// Produces a text document with:
/// - Leading comment lines (prefixed `#`) summarising the report.
/// - A header row.
/// - One data row per [`ActionEntry`], labelled with its stage and action
///   names from the report.
pub fn export_csv(report: &TestReport, entries: &[ActionEntry]) -> String {
    let failed = entries.iter().filter(|e| !e.success).count();
    let failure_rate = if entries.is_empty() {
        0.0
    } else {
        failed as f64 / entries.len() as f64 * 100.0
    };

    let labels: HashMap<RequestId, (&str, &str)> = report
        .requests
        .iter()
        .map(|r| {
            (
                RequestId {
                    stage_index: r.stage_index,
                    action_index: r.action_index,
                },
                (r.stage_name.as_str(), r.action_name.as_str()),
            )
        })
        .collect();

    let mut out = String::new();

    out.push_str(&format!("# gargote test run: {}\n", report.test_name));
    out.push_str(&format!("# Entries: {}\n", entries.len()));
    out.push_str(&format!("# Requests: {}\n", report.requests.len()));
    out.push_str(&format!("# Failed: {} ({:.2}%)\n", failed, failure_rate));
    out.push('\n');

    out.push_str(
        "started_at,test_index,stage_index,stage_name,try_number,action_index,action_name,duration_ms,success,failure\n",
    );

    for e in entries {
        let (stage_name, action_name) = labels.get(&e.request_id()).copied().unwrap_or(("", ""));
        let failure = e.failure.map(|k| k.to_string()).unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{:.3},{},{}\n",
            e.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            e.test_index,
            e.stage_index,
            csv_escape(stage_name),
            e.try_number,
            e.action_index,
            csv_escape(action_name),
            e.duration.as_secs_f64() * 1000.0,
            e.success,
            failure
        ));
    }

    out
}

/// Quote a field when it contains a separator, a quote or a newline.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// JSON export
// ---------------------------------------------------------------------------

/// Export a report as pretty-printed JSON.
pub fn export_json(report: &TestReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
