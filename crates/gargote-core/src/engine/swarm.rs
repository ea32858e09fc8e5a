use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::definition::model::Test;
use crate::engine::stage::run_stage;
use crate::engine::RunContext;

// ---------------------------------------------------------------------------
// SwarmMonitor: live concurrency gauges
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Gauges {
    current: AtomicU32,
    maximum: AtomicU32,
}

/// Number of iterations running right now and the highest number seen so
/// far. Clones share the same gauges; reads are best effort.
#[derive(Debug, Clone, Default)]
pub struct SwarmMonitor {
    gauges: Arc<Gauges>,
}

impl SwarmMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u32 {
        self.gauges.current.load(Ordering::Relaxed)
    }

    pub fn maximum(&self) -> u32 {
        self.gauges.maximum.load(Ordering::Relaxed)
    }

    /// Count one more running iteration until the guard is dropped.
    fn enter(&self) -> RunningGuard {
        let now = self.gauges.current.fetch_add(1, Ordering::Relaxed) + 1;
        self.gauges.maximum.fetch_max(now, Ordering::Relaxed);
        RunningGuard {
            gauges: Arc::clone(&self.gauges),
        }
    }
}

struct RunningGuard {
    gauges: Arc<Gauges>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.gauges.current.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Poll `monitor` every `period` and hand `(current, maximum)` to `on_tick`
/// until `cancel` fires.
pub fn spawn_monitor_loop<F>(
    monitor: SwarmMonitor,
    period: Duration,
    cancel: CancellationToken,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut(u32, u32) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => on_tick(monitor.current(), monitor.maximum()),
                _ = cancel.cancelled() => break,
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Swarm run
// ---------------------------------------------------------------------------

/// Outcome of a whole swarm run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SwarmSummary {
    pub run_id: Uuid,
    pub launched: u32,
    /// Iterations that went through every stage.
    pub completed: u32,
    /// Iterations stopped by an exhausted stage.
    pub abandoned: u32,
    pub max_concurrency: u32,
    pub duration: Duration,
}

/// Run `test.swarm.number_of_runs` iterations of `test`, starting one every
/// `1000 / creation_rate` ms, and wait for all of them.
///
/// Iterations overlap freely. Their individual failures are logged and
/// counted, never returned.
pub async fn run_swarm(ctx: &RunContext, test: &Arc<Test>, monitor: &SwarmMonitor) -> SwarmSummary {
    let run_id = Uuid::new_v4();
    let swarm = test.swarm.with_defaults();
    let gap = swarm.admission_interval();
    let started = Instant::now();

    tracing::info!(
        "Swarm {run_id}: '{}' with {} runs at {} per second",
        test.name,
        swarm.number_of_runs,
        swarm.creation_rate
    );

    let mut ticker = if gap.is_zero() {
        None
    } else {
        let mut t = interval(gap);
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(t)
    };

    let mut join_set: JoinSet<bool> = JoinSet::new();
    let mut launched = 0u32;

    for test_index in 0..swarm.number_of_runs as usize {
        if let Some(t) = ticker.as_mut() {
            t.tick().await;
        }
        let ctx = ctx.clone();
        let test = Arc::clone(test);
        let guard = monitor.enter();
        join_set.spawn(async move {
            let _guard = guard;
            run_iteration(&ctx, &test, test_index).await
        });
        launched += 1;
    }

    let mut completed = 0u32;
    let mut abandoned = 0u32;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(true) => completed += 1,
            Ok(false) => abandoned += 1,
            Err(e) => tracing::error!("Swarm {run_id}: iteration task failed: {e}"),
        }
    }

    let summary = SwarmSummary {
        run_id,
        launched,
        completed,
        abandoned,
        max_concurrency: monitor.maximum(),
        duration: started.elapsed(),
    };
    tracing::info!(
        "Swarm {run_id}: finished, {} completed, {} abandoned in {:?}",
        summary.completed,
        summary.abandoned,
        summary.duration
    );
    summary
}

/// Run every stage of `test` in order. Returns `false` when an exhausted
/// stage stopped the iteration early.
async fn run_iteration(ctx: &RunContext, test: &Test, test_index: usize) -> bool {
    tracing::info!("Test {test_index}: starting");

    for (stage_index, stage) in test.stages.iter().enumerate() {
        let outcome = run_stage(ctx, test_index, stage_index, stage).await;
        if outcome.is_success() {
            continue;
        }
        if test.continue_on_stage_failure {
            tracing::warn!("Test {test_index}: stage {stage_index} failed, continuing");
        } else {
            tracing::warn!("Test {test_index}: stage {stage_index} failed, remaining stages abandoned");
            return false;
        }
    }

    tracing::info!("Test {test_index}: finished");
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
