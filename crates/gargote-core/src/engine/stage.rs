use std::time::Instant;

use chrono::Utc;
use tokio::time::sleep;

use crate::definition::model::Stage;
use crate::engine::action::{run_action, ActionCoordinates};
use crate::engine::{RunContext, StageState};
use crate::error::GargoteError;
use crate::results::ActionEntry;
use crate::template::Variables;

/// What a stage invocation produced.
#[derive(Debug)]
pub struct StageOutcome {
    /// `Succeeded` or `Exhausted`.
    pub state: StageState,
    /// Number of tries attempted.
    pub tries: u32,
    /// Variable environment as left by the last try.
    pub variables: Variables,
    /// Last error encountered, set when the stage is exhausted.
    pub error: Option<GargoteError>,
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        self.state == StageState::Succeeded
    }

    pub fn into_result(self) -> Result<Variables, GargoteError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.variables),
        }
    }
}

/// Run a stage with its retry policy.
///
/// One variable environment lives for the whole invocation: values captured
/// by a failed try stay visible to the following tries. Every try sleeps
/// `delay_before` first and `delay_after` last, whatever its outcome. The
/// entries of each try are stored as one batch; a storage failure is logged
/// and does not change the outcome.
pub async fn run_stage(
    ctx: &RunContext,
    test_index: usize,
    stage_index: usize,
    stage: &Stage,
) -> StageOutcome {
    let label = format!("{test_index}-{stage_index}");
    let mut variables = Variables::new();
    let mut last_error = None;

    tracing::debug!("Stage {label}: {}", StageState::Pending);

    for try_number in 0..stage.max_tries() {
        tracing::info!(
            "Stage {label}: {} '{}', try {}/{}",
            StageState::Attempting,
            stage.name,
            try_number + 1,
            stage.max_tries()
        );

        let (entries, result) =
            run_try(ctx, test_index, stage_index, try_number, stage, &mut variables).await;

        if let Err(e) = ctx.store.insert_batch(entries) {
            tracing::error!("Stage {label}: unable to record try {try_number}: {e}");
        }

        match result {
            Ok(()) => {
                tracing::info!("Stage {label}: {} after {} tries", StageState::Succeeded, try_number + 1);
                return StageOutcome {
                    state: StageState::Succeeded,
                    tries: try_number + 1,
                    variables,
                    error: None,
                };
            }
            Err(e) => {
                tracing::warn!("Stage {label}: try {try_number} failed: {e}");
                last_error = Some(e);
            }
        }
    }

    tracing::warn!("Stage {label}: {} after {} tries", StageState::Exhausted, stage.max_tries());
    StageOutcome {
        state: StageState::Exhausted,
        tries: stage.max_tries(),
        variables,
        error: last_error,
    }
}

/// One try: every action in order until the first failure.
async fn run_try(
    ctx: &RunContext,
    test_index: usize,
    stage_index: usize,
    try_number: u32,
    stage: &Stage,
    variables: &mut Variables,
) -> (Vec<ActionEntry>, Result<(), GargoteError>) {
    sleep(stage.delay_before()).await;

    let mut entries = Vec::with_capacity(stage.actions.len());
    let mut result = Ok(());

    for (action_index, action) in stage.actions.iter().enumerate() {
        let coords = ActionCoordinates {
            test_index,
            stage_index,
            action_index,
        };
        let started_at = Utc::now();
        let start = Instant::now();
        let outcome = run_action(&ctx.client, coords, action, variables).await;

        entries.push(ActionEntry {
            test_index,
            stage_index,
            try_number,
            action_index,
            started_at,
            duration: start.elapsed(),
            success: outcome.is_ok(),
            failure: outcome.as_ref().err().and_then(GargoteError::failure_kind),
        });

        if let Err(e) = outcome {
            result = Err(e);
            break;
        }
    }

    sleep(stage.delay_after()).await;
    (entries, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::definition::model::{Action, Capture, Query, Response, Validation};
    use crate::error::FailureKind;
    use crate::http::HttpClient;
    use crate::json::JsonValue;
    use crate::results::ResultStore;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_ctx() -> RunContext {
        RunContext::new(
            HttpClient::builder().build().unwrap(),
            Arc::new(ResultStore::new()),
        )
    }

    fn make_action(url: String) -> Action {
        Action {
            name: "call".to_string(),
            query: Query {
                url,
                ..Query::default()
            },
            response: Response {
                validation: Some(Validation {
                    status_codes: vec![200],
                    ..Validation::default()
                }),
                capture: None,
            },
        }
    }

    fn make_stage(actions: Vec<Action>, max_retries: u32) -> Stage {
        Stage {
            name: "stage".to_string(),
            max_retries,
            actions,
            ..Stage::default()
        }
    }

    fn capture_id(action: &mut Action) {
        let mut capture = Capture::default();
        capture
            .body_json
            .insert("id".to_string(), "captured_id".to_string());
        action.response.capture = Some(capture);
    }

    #[tokio::test]
    async fn always_failing_stage_is_exhausted() {
        let ctx = make_ctx();
        let stage = make_stage(
            vec![
                make_action("http://localhost/{{ .missing }}".to_string()),
                make_action("http://localhost/never".to_string()),
            ],
            3,
        );

        let outcome = run_stage(&ctx, 0, 0, &stage).await;
        assert_eq!(outcome.state, StageState::Exhausted);
        assert_eq!(outcome.tries, 4);
        assert!(matches!(outcome.error, Some(GargoteError::Template(_))));

        // Only the failing first action of each try is recorded.
        let entries = ctx.store.scan();
        assert_eq!(entries.len(), 4);
        let mut tries: Vec<u32> = entries.iter().map(|e| e.try_number).collect();
        tries.sort_unstable();
        assert_eq!(tries, vec![0, 1, 2, 3]);
        assert!(entries
            .iter()
            .all(|e| !e.success && e.action_index == 0 && e.failure == Some(FailureKind::Template)));
    }

    #[tokio::test]
    async fn stage_succeeds_on_later_try() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(2)
            .mount(&server)
            .await;

        let ctx = make_ctx();
        let stage = make_stage(vec![make_action(format!("{}/flaky", server.uri()))], 5);
        let outcome = run_stage(&ctx, 0, 0, &stage).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.tries, 3);

        let entries = ctx.store.scan();
        assert_eq!(entries.len(), 3);
        for e in &entries {
            let expect_success = e.try_number == 2;
            assert_eq!(e.success, expect_success);
        }
        assert_eq!(entries[0].failure, Some(FailureKind::Validation));
    }

    #[tokio::test]
    async fn delays_apply_to_every_try() {
        let ctx = make_ctx();
        let mut stage = make_stage(vec![make_action("{{ .missing }}".to_string())], 1);
        stage.delay_before = 30;
        stage.delay_after = 20;

        let start = Instant::now();
        let outcome = run_stage(&ctx, 0, 0, &stage).await;
        assert_eq!(outcome.tries, 2);
        assert!(start.elapsed() >= Duration::from_millis(2 * (30 + 20)));
    }

    #[tokio::test]
    async fn captured_variables_survive_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id": 7}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(2)
            .mount(&server)
            .await;

        let mut login = make_action(format!("{}/login", server.uri()));
        capture_id(&mut login);
        let item = make_action(format!("{}/item", server.uri()));

        let ctx = make_ctx();
        let outcome = run_stage(&ctx, 0, 0, &make_stage(vec![login, item], 1)).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.tries, 2);
        assert_eq!(outcome.variables["captured_id"], JsonValue::Integer(7));
        assert_eq!(ctx.store.len(), 4);
    }

    #[tokio::test]
    async fn end_to_end_capture() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id": 7}"#))
            .mount(&server)
            .await;

        let mut action = make_action(server.uri());
        capture_id(&mut action);

        let ctx = make_ctx();
        let outcome = run_stage(&ctx, 0, 0, &make_stage(vec![action], 2)).await;
        assert_eq!(outcome.tries, 1);
        let entries = ctx.store.scan();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].success);

        let variables = outcome.into_result().unwrap();
        assert_eq!(variables["captured_id"], JsonValue::Integer(7));
    }

    #[tokio::test]
    async fn end_to_end_server_error_exhausts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string(r#"{"id": 7}"#))
            .expect(3)
            .mount(&server)
            .await;

        let mut action = make_action(server.uri());
        capture_id(&mut action);

        let ctx = make_ctx();
        let outcome = run_stage(&ctx, 0, 0, &make_stage(vec![action], 2)).await;
        assert_eq!(outcome.state, StageState::Exhausted);
        assert_eq!(outcome.tries, 3);
        assert!(!outcome.variables.contains_key("captured_id"));
        assert!(matches!(
            outcome.into_result(),
            Err(GargoteError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn captured_value_feeds_next_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"token": "abc-123", "n": 42}"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/use"))
            .and(body_string("abc-123/42"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut first = make_action(format!("{}/token", server.uri()));
        let mut capture = Capture::default();
        capture
            .body_json
            .insert("token".to_string(), "token".to_string());
        capture.body_json.insert("n".to_string(), "n".to_string());
        first.response.capture = Some(capture);

        let mut second = make_action(format!("{}/use", server.uri()));
        second.query.method = crate::definition::model::HttpMethod::Post;
        second.query.body_text = Some("{{ .token }}/{{ .n }}".to_string());

        let ctx = make_ctx();
        let outcome = run_stage(&ctx, 0, 0, &make_stage(vec![first, second], 0)).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn rejected_batch_keeps_stage_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let ctx = make_ctx();
        let stage = make_stage(vec![make_action(server.uri())], 0);

        let first = run_stage(&ctx, 0, 0, &stage).await;
        // Same (test, stage, try, action) key: the store refuses the second batch.
        let second = run_stage(&ctx, 0, 0, &stage).await;

        assert_eq!(first.state, StageState::Succeeded);
        assert_eq!(second.state, StageState::Succeeded);
        assert!(second.error.is_none());
        assert_eq!(ctx.store.len(), 1);
        assert!(ctx.store.scan()[0].success);
    }
}
