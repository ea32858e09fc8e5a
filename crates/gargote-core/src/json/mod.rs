//! Decoded JSON trees, dot-path navigation and the typed comparison used by
//! body validation.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::patterns;

// ---------------------------------------------------------------------------
// JsonValue
// ---------------------------------------------------------------------------

/// A JSON value decoded without a fixed schema.
///
/// Integers and floating values are kept apart so that the comparison table
/// in [`typed_match`] can treat them differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<JsonValue>),
    Object(HashMap<String, JsonValue>),
}

impl JsonValue {
    /// Decode raw bytes (typically a response body).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<serde_json::Value>(bytes).map(JsonValue::from)
    }

    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Integer(_) => "integer",
            JsonValue::Float(_) => "float",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }
}

impl From<serde_json::Value> for JsonValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => JsonValue::Null,
            serde_json::Value::Bool(b) => JsonValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => JsonValue::Integer(i),
                // u64 above i64::MAX and real numbers both land here.
                None => JsonValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => JsonValue::String(s),
            serde_json::Value::Array(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            serde_json::Value::Object(map) => JsonValue::Object(
                map.into_iter().map(|(k, v)| (k, JsonValue::from(v))).collect(),
            ),
        }
    }
}

impl From<&str> for JsonValue {
    fn from(s: &str) -> Self {
        JsonValue::String(s.to_string())
    }
}

impl From<String> for JsonValue {
    fn from(s: String) -> Self {
        JsonValue::String(s)
    }
}

impl From<i64> for JsonValue {
    fn from(i: i64) -> Self {
        JsonValue::Integer(i)
    }
}

impl From<f64> for JsonValue {
    fn from(f: f64) -> Self {
        JsonValue::Float(f)
    }
}

/// Text form used when a value is substituted into a template or matched
/// against a regular expression. Strings are written without quotes; numbers,
/// arrays and objects as compact JSON, so `7.0` keeps its fraction.
impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonValue::Null => write!(f, "null"),
            JsonValue::Bool(b) => write!(f, "{b}"),
            JsonValue::Integer(i) => write!(f, "{i}"),
            JsonValue::Float(x) => match serde_json::Number::from_f64(*x) {
                Some(n) => write!(f, "{n}"),
                None => write!(f, "{x}"),
            },
            JsonValue::String(s) => write!(f, "{s}"),
            JsonValue::Array(_) | JsonValue::Object(_) => {
                let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{text}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// A dot-separated path could not be walked to the end.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("path '{path}' not found (stopped at segment '{segment}')")]
pub struct PathNotFound {
    pub path: String,
    pub segment: String,
}

/// Walk `path` (e.g. `"user.company.name"`) through nested objects.
///
/// Every node on the way must be an object holding the next segment. The leaf
/// may be any value, including a subtree.
pub fn resolve_path<'a>(root: &'a JsonValue, path: &str) -> Result<&'a JsonValue, PathNotFound> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            JsonValue::Object(map) => map.get(segment),
            _ => None,
        }
        .ok_or_else(|| PathNotFound {
            path: path.to_string(),
            segment: segment.to_string(),
        })?;
    }
    Ok(current)
}

// ---------------------------------------------------------------------------
// Typed comparison
// ---------------------------------------------------------------------------

/// Compare a resolved value with an expected one.
///
/// Numbers compare numerically (integers widen to float when the other side is
/// a float). An expected string is a regular expression, matched unanchored
/// against the text form of the resolved number or string. Objects, arrays,
/// booleans and nulls never match.
///
/// Fails only when an expected string is not a valid regular expression.
pub fn typed_match(resolved: &JsonValue, expected: &JsonValue) -> Result<bool, regex::Error> {
    match (resolved, expected) {
        (JsonValue::Integer(got), JsonValue::Integer(want)) => Ok(got == want),
        (JsonValue::Integer(got), JsonValue::Float(want)) => Ok(*got as f64 == *want),
        (JsonValue::Integer(got), JsonValue::String(pattern)) => {
            regex_match(pattern, &got.to_string())
        }
        (JsonValue::Float(got), JsonValue::Integer(want)) => Ok(*got == *want as f64),
        (JsonValue::Float(got), JsonValue::Float(want)) => Ok(got == want),
        (JsonValue::Float(got), JsonValue::String(pattern)) => {
            regex_match(pattern, &got.to_string())
        }
        (JsonValue::String(got), JsonValue::String(pattern)) => regex_match(pattern, got),
        (JsonValue::Integer(_), _) | (JsonValue::Float(_), _) | (JsonValue::String(_), _) => {
            Ok(false)
        }
        (
            JsonValue::Null
            | JsonValue::Bool(_)
            | JsonValue::Array(_)
            | JsonValue::Object(_),
            _,
        ) => Ok(false),
    }
}

fn regex_match(pattern: &str, text: &str) -> Result<bool, regex::Error> {
    Ok(patterns::text(pattern)?.is_match(text))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> JsonValue {
        JsonValue::from_slice(text.as_bytes()).expect("valid json")
    }

    // --- decoding ---

    #[test]
    fn integers_and_floats_stay_apart() {
        let value = parse(r#"{"a": 7, "b": 7.5, "c": 7.0}"#);
        assert_eq!(resolve_path(&value, "a").unwrap(), &JsonValue::Integer(7));
        assert_eq!(resolve_path(&value, "b").unwrap(), &JsonValue::Float(7.5));
        assert_eq!(resolve_path(&value, "c").unwrap(), &JsonValue::Float(7.0));
    }

    #[test]
    fn huge_unsigned_becomes_float() {
        let value = parse("18446744073709551615");
        assert!(matches!(value, JsonValue::Float(_)));
    }

    #[test]
    fn display_forms() {
        assert_eq!(JsonValue::String("abc".into()).to_string(), "abc");
        assert_eq!(JsonValue::Integer(42).to_string(), "42");
        assert_eq!(JsonValue::Float(2.75).to_string(), "2.75");
        assert_eq!(JsonValue::Bool(true).to_string(), "true");
        assert_eq!(JsonValue::Null.to_string(), "null");
        assert_eq!(parse("[1,\"x\"]").to_string(), "[1,\"x\"]");
    }

    #[test]
    fn float_display_keeps_json_form() {
        assert_eq!(JsonValue::Float(7.0).to_string(), "7.0");
        assert_eq!(JsonValue::Float(1e21).to_string(), "1e21");
        assert_eq!(JsonValue::Float(-0.5).to_string(), "-0.5");
        assert_eq!(parse(r#"{"c": 7.0}"#).to_string(), r#"{"c":7.0}"#);
        assert_eq!(JsonValue::Float(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn float_regex_sees_fraction() {
        let whole = JsonValue::String(r"^7$".into());
        assert!(!typed_match(&JsonValue::Float(7.0), &whole).unwrap());
        let fraction = JsonValue::String(r"^7\.0$".into());
        assert!(typed_match(&JsonValue::Float(7.0), &fraction).unwrap());
    }

    // --- resolve_path ---

    #[test]
    fn resolve_nested_key() {
        let value = parse(r#"{"user": {"company": {"name": "Romaguera-Crona"}}}"#);
        let leaf = resolve_path(&value, "user.company.name").unwrap();
        assert_eq!(leaf, &JsonValue::String("Romaguera-Crona".into()));
    }

    #[test]
    fn resolve_returns_subtree() {
        let value = parse(r#"{"user": {"id": 1, "name": "Leanne"}}"#);
        let leaf = resolve_path(&value, "user").unwrap();
        assert!(matches!(leaf, JsonValue::Object(map) if map.len() == 2));
    }

    #[test]
    fn resolve_missing_key_reports_segment() {
        let value = parse(r#"{"user": {"id": 1}}"#);
        let err = resolve_path(&value, "user.email").unwrap_err();
        assert_eq!(err.segment, "email");
        assert_eq!(err.path, "user.email");
    }

    #[test]
    fn resolve_through_non_object_fails() {
        let value = parse(r#"{"items": [1, 2, 3]}"#);
        let err = resolve_path(&value, "items.0").unwrap_err();
        assert_eq!(err.segment, "0");
    }

    #[test]
    fn resolve_on_scalar_root_fails() {
        let value = parse("42");
        assert!(resolve_path(&value, "id").is_err());
    }

    // --- typed_match ---

    #[test]
    fn integer_against_integer() {
        assert!(typed_match(&JsonValue::Integer(7), &JsonValue::Integer(7)).unwrap());
        assert!(!typed_match(&JsonValue::Integer(7), &JsonValue::Integer(8)).unwrap());
    }

    #[test]
    fn integer_against_float_widens() {
        assert!(typed_match(&JsonValue::Integer(3), &JsonValue::Float(3.0)).unwrap());
        assert!(!typed_match(&JsonValue::Integer(3), &JsonValue::Float(3.5)).unwrap());
    }

    #[test]
    fn integer_against_regex() {
        let pattern = JsonValue::String("4[0-9]".into());
        assert!(typed_match(&JsonValue::Integer(42), &pattern).unwrap());
        assert!(!typed_match(&JsonValue::Integer(52), &pattern).unwrap());
    }

    #[test]
    fn float_against_integer_is_exact() {
        assert!(!typed_match(&JsonValue::Float(2.75), &JsonValue::Integer(2)).unwrap());
        assert!(typed_match(&JsonValue::Float(3.0), &JsonValue::Integer(3)).unwrap());
    }

    #[test]
    fn float_against_regex_uses_json_rendering() {
        let pattern = JsonValue::String(r"^2\.75$".into());
        assert!(typed_match(&JsonValue::Float(2.75), &pattern).unwrap());
    }

    #[test]
    fn string_regex_is_unanchored() {
        let got = JsonValue::String("abc123".into());
        assert!(typed_match(&got, &JsonValue::String("^abc".into())).unwrap());
        assert!(typed_match(&got, &JsonValue::String("c1".into())).unwrap());
        assert!(!typed_match(&got, &JsonValue::String("^123".into())).unwrap());
    }

    #[test]
    fn string_against_number_mismatches() {
        let got = JsonValue::String("7".into());
        assert!(!typed_match(&got, &JsonValue::Integer(7)).unwrap());
    }

    #[test]
    fn unsupported_resolved_types_never_match() {
        let expected = JsonValue::String(".*".into());
        assert!(!typed_match(&JsonValue::Bool(true), &expected).unwrap());
        assert!(!typed_match(&JsonValue::Null, &expected).unwrap());
        assert!(!typed_match(&parse("[1]"), &expected).unwrap());
        assert!(!typed_match(&parse("{}"), &expected).unwrap());
    }

    #[test]
    fn integer_against_bool_mismatches() {
        assert!(!typed_match(&JsonValue::Integer(1), &JsonValue::Bool(true)).unwrap());
    }

    #[test]
    fn malformed_regex_is_an_error() {
        let got = JsonValue::String("abc".into());
        assert!(typed_match(&got, &JsonValue::String("(".into())).is_err());
    }
}
