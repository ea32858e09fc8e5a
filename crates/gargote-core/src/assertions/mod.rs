//! Response validation: status code, headers and body checks, evaluated in a
//! fixed order and stopping at the first violation.

use crate::definition::model::Validation;
use crate::error::GargoteError;
use crate::http::response::ResponseData;
use crate::json::{resolve_path, typed_match, JsonValue};
use crate::patterns;

// ---------------------------------------------------------------------------
// validate_response
// ---------------------------------------------------------------------------

/// Check a response against a [`Validation`].
///
/// Order: status code, headers, non-empty body (when a body check is
/// configured), body regex, JSON path expectations. The first violated
/// condition is returned as [`GargoteError::ValidationFailed`].
pub fn validate_response(
    response: &ResponseData,
    validation: &Validation,
) -> Result<(), GargoteError> {
    check_status(response.status, &validation.status_codes)?;

    for (name, expected) in &validation.headers {
        match response.header(name) {
            Some(value) if value == expected => {}
            Some(value) => {
                return Err(GargoteError::ValidationFailed(format!(
                    "header '{name}' expected '{expected}', got '{value}'"
                )))
            }
            None => {
                return Err(GargoteError::ValidationFailed(format!(
                    "header '{name}' expected '{expected}', but was not received"
                )))
            }
        }
    }

    if !validation.checks_body() {
        return Ok(());
    }

    if response.body.is_empty() {
        return Err(GargoteError::ValidationFailed(
            "body should be checked, but the response has no body".to_string(),
        ));
    }

    if let Some(pattern) = validation.text_pattern() {
        let re = patterns::bytes(pattern).map_err(|e| {
            GargoteError::ValidationFailed(format!("body regex '{pattern}' is malformed: {e}"))
        })?;
        if !re.is_match(&response.body) {
            return Err(GargoteError::ValidationFailed(format!(
                "body does not match regex '{pattern}'"
            )));
        }
    }

    if !validation.body_json.is_empty() {
        let root = JsonValue::from_slice(&response.body).map_err(|e| {
            GargoteError::ValidationFailed(format!("body should be JSON but is not: {e}"))
        })?;
        for (path, expected) in &validation.body_json {
            check_json_value(&root, path, expected)?;
        }
    }

    Ok(())
}

fn check_status(status: u16, accepted: &[u16]) -> Result<(), GargoteError> {
    if accepted.is_empty() || accepted.contains(&status) {
        Ok(())
    } else {
        Err(GargoteError::ValidationFailed(format!(
            "received status {status} (expected one of {accepted:?})"
        )))
    }
}

/// Resolve `path` in `root` and compare it with `expected` using
/// [`typed_match`].
pub fn check_json_value(
    root: &JsonValue,
    path: &str,
    expected: &JsonValue,
) -> Result<(), GargoteError> {
    let actual = resolve_path(root, path)
        .map_err(|e| GargoteError::ValidationFailed(format!("JSON {e}")))?;

    match typed_match(actual, expected) {
        Ok(true) => Ok(()),
        Ok(false) => Err(GargoteError::ValidationFailed(format!(
            "JSON path '{path}' expected '{expected}' ({}), got '{actual}' ({})",
            expected.type_name(),
            actual.type_name()
        ))),
        Err(e) => Err(GargoteError::ValidationFailed(format!(
            "JSON path '{path}': expected regex '{expected}' is malformed: {e}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
