use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::json::JsonValue;

/// Timeout applied to a query that does not configure one.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// HttpMethod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Put,
    Post,
    Delete,
    Patch,
    Options,
    Head,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// The request sent by an action. Every string is a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Query {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// JSON payload; string leaves are templates too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_json: Option<JsonValue>,
    /// Plain-text payload. Wins over `body_json` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    /// Timeout in milliseconds; zero or absent means [`DEFAULT_TIMEOUT_MS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Query {
    pub fn effective_timeout(&self) -> Duration {
        match self.timeout {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// The text body, if one is configured and non-empty.
    pub fn text_body(&self) -> Option<&str> {
        self.body_text.as_deref().filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Response: validation and capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Validation {
    /// Accepted status codes; empty accepts any.
    #[serde(default)]
    pub status_codes: Vec<u16>,
    /// Header name to exact expected value.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Dot path to expected value. Expected strings are regular expressions.
    #[serde(default)]
    pub body_json: BTreeMap<String, JsonValue>,
    /// Regular expression the raw body must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
}

impl Validation {
    pub fn text_pattern(&self) -> Option<&str> {
        self.body_text.as_deref().filter(|s| !s.is_empty())
    }

    pub fn checks_body(&self) -> bool {
        self.text_pattern().is_some() || !self.body_json.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Capture {
    /// Header name to variable name.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Dot path to variable name.
    #[serde(default)]
    pub body_json: BTreeMap<String, String>,
    /// Variable receiving the whole body as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
}

impl Capture {
    pub fn text_variable(&self) -> Option<&str> {
        self.body_text.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<Capture>,
}

// ---------------------------------------------------------------------------
// Action / Stage / Test
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "action_name", default)]
    pub name: String,
    pub query: Query,
    #[serde(default)]
    pub response: Response,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage {
    #[serde(rename = "stage_name", default)]
    pub name: String,
    /// Additional tries after the first one.
    #[serde(default)]
    pub max_retries: u32,
    /// Milliseconds slept before every try.
    #[serde(default)]
    pub delay_before: u64,
    /// Milliseconds slept after every try, successful or not.
    #[serde(default)]
    pub delay_after: u64,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Stage {
    pub fn max_tries(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn delay_before(&self) -> Duration {
        Duration::from_millis(self.delay_before)
    }

    pub fn delay_after(&self) -> Duration {
        Duration::from_millis(self.delay_after)
    }
}

/// How many iterations to run and how fast to admit them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Swarm {
    #[serde(default)]
    pub number_of_runs: u32,
    /// Iterations started per second.
    #[serde(default)]
    pub creation_rate: u32,
}

impl Swarm {
    /// Replace zero values with 1.
    pub fn with_defaults(self) -> Self {
        Self {
            number_of_runs: self.number_of_runs.max(1),
            creation_rate: self.creation_rate.max(1),
        }
    }

    /// Gap between two iteration starts. Zero when the rate exceeds 1000/s.
    pub fn admission_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.creation_rate.max(1)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Test {
    #[serde(rename = "test_name", default)]
    pub name: String,
    #[serde(default)]
    pub continue_on_stage_failure: bool,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub swarm: Swarm,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
