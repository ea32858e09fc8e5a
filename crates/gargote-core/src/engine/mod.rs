use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::http::HttpClient;
use crate::results::ResultStore;

pub mod action;
pub mod stage;
pub mod swarm;

pub use action::{run_action, ActionCoordinates};
pub use stage::{run_stage, StageOutcome};
pub use swarm::{run_swarm, spawn_monitor_loop, SwarmMonitor, SwarmSummary};

/// Lifecycle of one stage invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Not started yet.
    #[default]
    Pending,
    /// A try is running.
    Attempting,
    /// A try completed every action.
    Succeeded,
    /// Every allowed try failed.
    Exhausted,
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageState::Pending => "pending",
            StageState::Attempting => "attempting",
            StageState::Succeeded => "succeeded",
            StageState::Exhausted => "exhausted",
        };
        write!(f, "{s}")
    }
}

/// Shared resources of a run: one connection pool and one result store for
/// every iteration.
#[derive(Clone)]
pub struct RunContext {
    pub client: HttpClient,
    pub store: Arc<ResultStore>,
}

impl RunContext {
    pub fn new(client: HttpClient, store: Arc<ResultStore>) -> Self {
        Self { client, store }
    }
}
