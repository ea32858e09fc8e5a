use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::definition::model::Test;
use crate::error::FailureKind;

use super::{RequestId, RequestResults, ResultStore};

// ---------------------------------------------------------------------------
// Statistics: descriptive statistics over successful durations
// ---------------------------------------------------------------------------

/// Descriptive statistics of a set of durations, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Statistics {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    /// Population standard deviation.
    pub std_dev_ms: f64,
}

impl Statistics {
    /// Returns `None` for an empty sample.
    pub fn from_durations(durations: &[Duration]) -> Option<Self> {
        if durations.is_empty() {
            return None;
        }

        let mut data: Vec<f64> = durations.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        data.sort_by(f64::total_cmp);

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let mid = data.len() / 2;
        let median = if data.len() % 2 == 0 {
            (data[mid - 1] + data[mid]) / 2.0
        } else {
            data[mid]
        };

        Some(Self {
            min_ms: data[0],
            max_ms: data[data.len() - 1],
            mean_ms: mean,
            median_ms: median,
            std_dev_ms: variance.sqrt(),
        })
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min: {:.3}, max: {:.3}, mean: {:.3}, median: {:.3}, std dev: {:.3}",
            self.min_ms, self.max_ms, self.mean_ms, self.median_ms, self.std_dev_ms
        )
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Aggregated outcome of one request (stage, action) over the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RequestReport {
    pub stage_index: usize,
    pub action_index: usize,
    pub stage_name: String,
    pub action_name: String,
    /// URL template as written in the test.
    pub url: String,
    pub failures: u64,
    pub successes: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
    /// Absent when no attempt succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

impl fmt::Display for RequestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "URL: {}, Fail: {}, Success: {}, Stats:[",
            self.url, self.failures, self.successes
        )?;
        if let Some(stats) = &self.statistics {
            write!(f, "{stats}")?;
        }
        write!(f, "]")?;
        if !self.failures_by_kind.is_empty() {
            let kinds: Vec<String> = self
                .failures_by_kind
                .iter()
                .map(|(kind, count)| format!("{kind}: {count}"))
                .collect();
            write!(f, ", Failures:[{}]", kinds.join(", "))?;
        }
        Ok(())
    }
}

/// Report of a whole run, ordered by (stage, action).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TestReport {
    pub test_name: String,
    pub total_entries: usize,
    pub requests: Vec<RequestReport>,
}

/// Build the report of `test` from everything recorded in `store`.
pub fn build_report(test: &Test, store: &ResultStore) -> TestReport {
    let grouped = store.request_results();
    let total_entries = grouped
        .values()
        .map(|r| r.failures as usize + r.success_durations.len())
        .sum();

    let requests = grouped
        .into_iter()
        .map(|(id, results)| request_report(test, id, results))
        .collect();

    TestReport {
        test_name: test.name.clone(),
        total_entries,
        requests,
    }
}

fn request_report(test: &Test, id: RequestId, results: RequestResults) -> RequestReport {
    let stage = test.stages.get(id.stage_index);
    let action = stage.and_then(|s| s.actions.get(id.action_index));

    RequestReport {
        stage_index: id.stage_index,
        action_index: id.action_index,
        stage_name: stage.map(|s| s.name.clone()).unwrap_or_default(),
        action_name: action.map(|a| a.name.clone()).unwrap_or_default(),
        url: action.map(|a| a.query.url.clone()).unwrap_or_default(),
        failures: results.failures,
        successes: results.success_durations.len() as u64,
        failures_by_kind: results.failures_by_kind,
        statistics: Statistics::from_durations(&results.success_durations),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
