//! Capture engine: copies header values, the raw body and JSON values from a
//! validated response into the variable environment.

use crate::definition::model::Capture;
use crate::error::GargoteError;
use crate::http::response::ResponseData;
use crate::json::{resolve_path, JsonValue};
use crate::template::Variables;

/// Apply every capture rule of `capture` to `variables`.
///
/// Headers are captured first (an absent header stores an empty string),
/// then the raw body, then JSON paths. A body that is not JSON, or a path that
/// cannot be resolved, aborts with [`GargoteError::CaptureFailed`]; values
/// stored before the failure stay in place.
pub fn capture_response(
    response: &ResponseData,
    capture: &Capture,
    variables: &mut Variables,
) -> Result<(), GargoteError> {
    for (header, variable) in &capture.headers {
        let value = response.header(header).unwrap_or_default();
        variables.insert(variable.clone(), JsonValue::String(value.to_string()));
    }

    if let Some(variable) = capture.text_variable() {
        variables.insert(variable.to_string(), JsonValue::String(response.body_text()));
    }

    if !capture.body_json.is_empty() {
        let root = JsonValue::from_slice(&response.body).map_err(|e| {
            GargoteError::CaptureFailed(format!(
                "expected a response with a JSON body, but it was not readable: {e}"
            ))
        })?;
        for (path, variable) in &capture.body_json {
            let value = resolve_path(&root, path)
                .map_err(|e| GargoteError::CaptureFailed(format!("JSON {e}")))?;
            variables.insert(variable.clone(), value.clone());
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
