use regex::Regex;

use crate::definition::model::{Action, Stage, Test};
use crate::error::GargoteError;
use crate::json::JsonValue;
use crate::template::check_syntax;

/// Validate a [`Test`] and return every problem found.
///
/// An empty `Vec` means the test can be run.
pub fn validate_test(test: &Test) -> Vec<GargoteError> {
    let mut errors = Vec::new();

    if test.name.trim().is_empty() {
        errors.push(GargoteError::Definition(
            "test_name must not be empty".to_string(),
        ));
    }

    if test.stages.is_empty() {
        errors.push(GargoteError::Definition(format!(
            "Test '{}' has no stages",
            test.name
        )));
    }

    for (stage_index, stage) in test.stages.iter().enumerate() {
        errors.extend(validate_stage(stage_index, stage));
    }

    errors
}

fn validate_stage(stage_index: usize, stage: &Stage) -> Vec<GargoteError> {
    let mut errors = Vec::new();

    if stage.actions.is_empty() {
        errors.push(GargoteError::Definition(format!(
            "Stage {stage_index} '{}' has no actions",
            stage.name
        )));
    }

    for (action_index, action) in stage.actions.iter().enumerate() {
        let label = format!("Action {stage_index}-{action_index} '{}'", action.name);
        errors.extend(validate_action(&label, action));
    }

    errors
}

fn validate_action(label: &str, action: &Action) -> Vec<GargoteError> {
    let mut errors = Vec::new();
    let query = &action.query;

    if query.url.trim().is_empty() {
        errors.push(GargoteError::Definition(format!(
            "{label}: url must not be empty"
        )));
    }

    let mut templates: Vec<(&str, &str)> = vec![("url", query.url.as_str())];
    templates.extend(query.headers.values().map(|v| ("header", v.as_str())));
    templates.extend(query.params.values().map(|v| ("param", v.as_str())));
    if let Some(body) = &query.body_text {
        templates.push(("body_text", body.as_str()));
    }
    for (field, template) in templates {
        if let Err(e) = check_syntax(template) {
            errors.push(GargoteError::Definition(format!("{label}: {field}: {e}")));
        }
    }
    if let Some(body) = &query.body_json {
        collect_json_template_errors(label, body, &mut errors);
    }

    if let Some(validation) = &action.response.validation {
        if let Some(pattern) = validation.text_pattern() {
            if let Err(e) = Regex::new(pattern) {
                errors.push(GargoteError::Definition(format!(
                    "{label}: body_text validation is not a valid regex: {e}"
                )));
            }
        }
        for (path, expected) in &validation.body_json {
            if let JsonValue::String(pattern) = expected {
                if let Err(e) = Regex::new(pattern) {
                    errors.push(GargoteError::Definition(format!(
                        "{label}: expected value for '{path}' is not a valid regex: {e}"
                    )));
                }
            }
        }
    }

    errors
}

fn collect_json_template_errors(label: &str, value: &JsonValue, errors: &mut Vec<GargoteError>) {
    match value {
        JsonValue::String(s) => {
            if let Err(e) = check_syntax(s) {
                errors.push(GargoteError::Definition(format!("{label}: body_json: {e}")));
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_json_template_errors(label, item, errors);
            }
        }
        JsonValue::Object(map) => {
            for item in map.values() {
                collect_json_template_errors(label, item, errors);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
