use std::{
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    task::{JoinError, JoinHandle},
    time::{self, Instant},
};
use tracing::{debug, error, info};

use crate::{
    client::PayloadSink,
    config::SenderConfig,
    error::HarnessError,
    task::{SendTask, TaskReport},
};

/// Lifecycle of a sender run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// New tasks may be spawned.
    Running,
    /// No more spawns, waiting for the in-flight tasks.
    Draining,
    /// Every task has finished.
    Done,
}

impl SchedulerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Done,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Draining => 1,
            Self::Done => 2,
        }
    }
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub state: SchedulerState,
    pub spawned: u64,
    pub completed: u64,
}

impl RegistrySnapshot {
    /// Tasks spawned but not completed yet.
    pub fn in_flight(&self) -> u64 {
        self.spawned - self.completed
    }
}

/// Live counts of the tasks of a run, shared between the scheduler, its
/// tasks and any observer.
///
/// `spawned` is only bumped by the scheduler, `completed` only by the tasks
/// themselves through a [`CompletionGuard`].
#[derive(Debug)]
pub struct TaskRegistry {
    spawned: AtomicU64,
    completed: AtomicU64,
    state: AtomicU8,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self {
            spawned: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            state: AtomicU8::new(SchedulerState::Running.to_u8()),
        }
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new task, the returned guard marks it completed when dropped.
    pub fn record_spawn(self: &Arc<Self>) -> CompletionGuard {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        CompletionGuard {
            registry: self.clone(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SchedulerState) {
        debug!("Scheduler state: {:?} -> {:?}", self.state(), state);
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        // Completed never overtakes spawned, read it first so the
        // subtraction in `in_flight` cannot underflow
        let completed = self.completed.load(Ordering::SeqCst);
        let spawned = self.spawned.load(Ordering::SeqCst);
        RegistrySnapshot {
            state: self.state(),
            spawned,
            completed,
        }
    }
}

/// Held by a running task. Dropping it, on success, error or panic, counts
/// the task as completed.
#[derive(Debug)]
pub struct CompletionGuard {
    registry: Arc<TaskRegistry>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.registry.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A task as seen by the scheduler when it was spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRecord {
    pub task_id: u64,
    pub payload_size: usize,
    /// Time since the start of the run.
    pub offset: Duration,
    /// Registry right after the spawn.
    pub snapshot: RegistrySnapshot,
}

#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task_id: u64,
    pub reason: String,
}

/// Result of a whole sender run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub task_count: u64,
    pub spawns: Vec<SpawnRecord>,
    /// Successful tasks, in spawn order.
    pub reports: Vec<TaskReport>,
    /// Failed tasks, in spawn order.
    pub failures: Vec<TaskFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Describe a task that did not run to the end. The runtime's own task id is
/// left out, it has nothing to do with the harness task id.
fn join_failure_reason(err: &JoinError) -> String {
    if err.is_panic() {
        "panicked".to_string()
    } else if err.is_cancelled() {
        "cancelled".to_string()
    } else {
        "did not finish".to_string()
    }
}

/// Spawns send tasks at random intervals until the deadline or the file
/// count is reached, then waits for all of them.
pub struct Scheduler {
    config: SenderConfig,
    sink: Arc<dyn PayloadSink>,
    registry: Arc<TaskRegistry>,
    rng: StdRng,
    task_count: u64,
}

impl Scheduler {
    pub fn new(config: SenderConfig, sink: Arc<dyn PayloadSink>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            sink,
            registry: Arc::new(TaskRegistry::new()),
            rng,
            task_count: 0,
        }
    }

    /// Registry of this scheduler, for observing a run from outside.
    pub fn registry(&self) -> Arc<TaskRegistry> {
        self.registry.clone()
    }

    fn spawn_task(
        &self,
        task_id: u64,
        payload_size: usize,
    ) -> JoinHandle<Result<TaskReport, HarnessError>> {
        let task = SendTask::new(task_id, payload_size, &self.config.output_dir)
            .with_delay(self.config.task_delay());
        let sink = self.sink.clone();
        let guard = self.registry.record_spawn();
        tokio::spawn(async move {
            let _guard = guard;
            let res = task.run(sink).await;
            if let Err(err) = &res {
                error!("task {} failed: {}", task_id, err);
            }
            res
        })
    }

    /// Run the spawn loop then drain every task.
    pub async fn run(mut self) -> RunSummary {
        let start = Instant::now();
        let deadline = start + self.config.duration_max;
        let mut handles = Vec::new();
        let mut summary = RunSummary::default();

        while Instant::now() < deadline && self.task_count < self.config.file_count {
            let interval = self
                .rng
                .gen_range(self.config.gen_interval_min..self.config.gen_interval_max);
            time::sleep(interval).await;
            if Instant::now() >= deadline {
                debug!("Deadline passed while waiting, no more tasks");
                break;
            }

            let task_id = self.task_count;
            let payload_size = self
                .rng
                .gen_range(self.config.data_size_min..self.config.data_size_max);
            handles.push((task_id, self.spawn_task(task_id, payload_size)));
            self.task_count += 1;

            let snapshot = self.registry.snapshot();
            info!(
                "created task {}, queue size: {}, tasks completed: {}",
                task_id,
                snapshot.in_flight(),
                snapshot.completed
            );
            summary.spawns.push(SpawnRecord {
                task_id,
                payload_size,
                offset: start.elapsed(),
                snapshot,
            });
        }

        self.registry.set_state(SchedulerState::Draining);
        for (task_id, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => summary.reports.push(report),
                Ok(Err(err)) => summary.failures.push(TaskFailure {
                    task_id,
                    reason: err.to_string(),
                }),
                Err(err) => {
                    let reason = join_failure_reason(&err);
                    error!("task {} did not finish: {}", task_id, reason);
                    summary.failures.push(TaskFailure { task_id, reason });
                }
            }
        }
        self.registry.set_state(SchedulerState::Done);

        summary.task_count = self.task_count;
        info!("generated and sent {} files", self.task_count);
        summary
    }
}
