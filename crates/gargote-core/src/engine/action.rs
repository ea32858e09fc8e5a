use std::fmt;

use crate::assertions::validate_response;
use crate::definition::model::Action;
use crate::error::GargoteError;
use crate::extractors::capture_response;
use crate::http::{prepare_request, HttpClient};
use crate::template::Variables;

/// Position of an action within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionCoordinates {
    pub test_index: usize,
    pub stage_index: usize,
    pub action_index: usize,
}

impl fmt::Display for ActionCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.test_index, self.stage_index, self.action_index)
    }
}

/// Execute one action: prepare the request, send it, validate the response
/// and apply the captures.
///
/// Each step fails fast. Captures only run after a successful validation, so
/// a rejected response never touches `variables`.
pub async fn run_action(
    client: &HttpClient,
    coords: ActionCoordinates,
    action: &Action,
    variables: &mut Variables,
) -> Result<(), GargoteError> {
    tracing::info!("Action {coords}: starting '{}'", action.name);

    let result = execute(client, action, variables).await;
    match &result {
        Ok(()) => tracing::info!("Action {coords}: success"),
        Err(e) => tracing::warn!("Action {coords}: {e}"),
    }
    result
}

async fn execute(
    client: &HttpClient,
    action: &Action,
    variables: &mut Variables,
) -> Result<(), GargoteError> {
    let timeout = action.query.effective_timeout();
    let request = prepare_request(&action.query, variables)?;
    let response = client.send(&request, timeout).await?;

    if let Some(validation) = &action.response.validation {
        validate_response(&response, validation)?;
    }
    if let Some(capture) = &action.response.capture {
        capture_response(&response, capture, variables)?;
    }
    Ok(())
}
