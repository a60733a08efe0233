//! Job runner: drains the queue through the dispatcher.
//!
//! Three entry points share one execution lock, so at most one job is in
//! flight at a time no matter who asked for it:
//!
//! - `run_one(id)` runs a single job by id.
//! - `step()` runs the lowest-id `ToDo` job once.
//! - `run()` starts an interval loop that keeps stepping until the queue is
//!   empty or `stop()` is called.
//!
//! Queue state lives in a `watch` channel so the loop's interval wait can be
//! interrupted by `stop()`. Each `run()` takes a new generation number; a
//! loop whose generation is no longer current exits before its next job.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{PnaError, Result};
use crate::types::{JobStatus, Progress, RunState};

use super::db::JobDb;
use super::job::Job;

/// Called after `reset()` has put every job back to `ToDo`, for collaborators
/// that track physical state outside the queue (parts back to unassembled).
pub type ResetHook = Arc<dyn Fn() + Send + Sync>;

/// Broadcast to subscribers (the SSE stream, `pna queue run`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerEvent {
    StateChanged {
        state: RunState,
    },
    JobStarted {
        id: u64,
    },
    JobFinished {
        id: u64,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        progress: Progress,
    },
}

const EVENT_CAPACITY: usize = 256;

struct Inner {
    db: Arc<JobDb>,
    dispatcher: Dispatcher,
    interval: Duration,
    state: watch::Sender<RunState>,
    events: broadcast::Sender<RunnerEvent>,
    generation: AtomicU64,
    exec: tokio::sync::Mutex<()>,
    reset_hook: Mutex<Option<ResetHook>>,
}

#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<Inner>,
}

// Store calls are blocking redb transactions.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PnaError::storage(format!("store task failed: {e}")))?
}

impl JobRunner {
    pub fn new(db: Arc<JobDb>, dispatcher: Dispatcher, interval: Duration) -> Self {
        let (state, _) = watch::channel(RunState::Stopped);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                db,
                dispatcher,
                interval,
                state,
                events,
                generation: AtomicU64::new(0),
                exec: tokio::sync::Mutex::new(()),
                reset_hook: Mutex::new(None),
            }),
        }
    }

    pub fn set_reset_hook(&self, hook: ResetHook) {
        *self.inner.reset_hook.lock() = Some(hook);
    }

    pub fn db(&self) -> &Arc<JobDb> {
        &self.inner.db
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn state(&self) -> RunState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunnerEvent> {
        self.inner.events.subscribe()
    }

    pub async fn progress(&self) -> Result<Progress> {
        let db = Arc::clone(&self.inner.db);
        blocking(move || db.progress()).await
    }

    /// Resolves once the queue is `Stopped`.
    pub async fn wait_until_stopped(&self) {
        let mut rx = self.inner.state.subscribe();
        let _stopped = rx.wait_for(|s| *s == RunState::Stopped).await.is_ok();
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run one job by id regardless of its current status.
    pub async fn run_one(&self, id: u64) -> Result<Job> {
        let _exec = self.inner.exec.lock().await;
        self.execute(id).await
    }

    /// Run the next `ToDo` job. `Ok(None)` when the queue is empty or a
    /// continuous run already owns it.
    pub async fn step(&self) -> Result<Option<Job>> {
        if self.state() == RunState::Running {
            return Ok(None);
        }
        self.transition(|s| (s == RunState::Stopped).then_some(RunState::Stepping));
        let result = self.step_locked().await;
        self.transition(|s| (s == RunState::Stepping).then_some(RunState::Stopped));
        result
    }

    async fn step_locked(&self) -> Result<Option<Job>> {
        let _exec = self.inner.exec.lock().await;
        let db = Arc::clone(&self.inner.db);
        match blocking(move || db.next_todo()).await? {
            Some(job) => self.execute(job.id).await.map(Some),
            None => {
                info!("queue empty");
                Ok(None)
            }
        }
    }

    /// Start draining the queue. Returns `false` if it was already running.
    pub fn run(&self) -> bool {
        if !self.transition(|s| (s != RunState::Running).then_some(RunState::Running)) {
            return false;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = self.clone();
        tokio::spawn(async move { this.run_loop(generation).await });
        true
    }

    /// Stop the loop before its next job. An in-flight dispatch finishes.
    pub fn stop(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.transition(|s| (s != RunState::Stopped).then_some(RunState::Stopped));
    }

    /// Stop, wait for any in-flight job, put every job back to `ToDo` and
    /// fire the reset hook. Returns the number of jobs that changed.
    pub async fn reset(&self) -> Result<usize> {
        self.stop();
        let changed = {
            let _exec = self.inner.exec.lock().await;
            let db = Arc::clone(&self.inner.db);
            blocking(move || db.reset_all()).await?
        };
        info!(changed, "queue reset");
        let hook = self.inner.reset_hook.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(changed)
    }

    async fn run_loop(&self, generation: u64) {
        let mut rx = self.inner.state.subscribe();
        let mut ticker = tokio::time::interval(self.inner.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if !self.is_current(generation) {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let _exec = self.inner.exec.lock().await;
            if !self.is_current(generation) {
                break;
            }
            let db = Arc::clone(&self.inner.db);
            let next = match blocking(move || db.next_todo()).await {
                Ok(next) => next,
                Err(e) => {
                    error!(error = %e, "queue stopped: could not read next job");
                    self.stop_generation(generation);
                    break;
                }
            };
            let Some(job) = next else {
                info!("queue drained");
                self.stop_generation(generation);
                break;
            };
            if let Err(e) = self.execute(job.id).await {
                error!(job = job.id, error = %e, "queue stopped: could not record job status");
                self.stop_generation(generation);
                break;
            }
        }
    }

    // Dispatch errors become `Failed`; only store errors come back as `Err`.
    // Caller holds the execution lock.
    async fn execute(&self, id: u64) -> Result<Job> {
        let db = Arc::clone(&self.inner.db);
        let job = blocking(move || db.set_status(id, JobStatus::Running, None)).await?;
        self.emit(RunnerEvent::JobStarted { id });
        info!(job = id, op = %job.label(), params = %job.params.summary(), "job started");

        let outcome = match job.device_class {
            Some(device) => self
                .inner
                .dispatcher
                .dispatch(device, &job.operation, &job.params)
                .await
                .map_err(|e| e.to_string()),
            None => Err("job has no device class".to_string()),
        };
        let (status, error) = match outcome {
            Ok(_) => (JobStatus::Done, None),
            Err(msg) => {
                warn!(job = id, error = %msg, "job failed");
                (JobStatus::Failed, Some(msg))
            }
        };

        let db = Arc::clone(&self.inner.db);
        let err = error.clone();
        let (job, progress) = blocking(move || {
            let job = db.set_status(id, status, err)?;
            Ok((job, db.progress()?))
        })
        .await?;
        info!(job = id, status = %status, progress = %progress, "job finished");
        self.emit(RunnerEvent::JobFinished {
            id,
            status,
            error,
            progress,
        });
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // State helpers
    // -----------------------------------------------------------------------

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
            && self.state() == RunState::Running
    }

    // Auto-stop only if no newer run has taken over.
    fn stop_generation(&self, generation: u64) {
        if self.inner.generation.load(Ordering::SeqCst) == generation {
            self.transition(|s| (s == RunState::Running).then_some(RunState::Stopped));
        }
    }

    /// Apply `f` to the current state; `Some(next)` moves to `next`. Returns
    /// whether the state changed.
    fn transition(&self, f: impl FnOnce(RunState) -> Option<RunState>) -> bool {
        let mut moved_to = None;
        self.inner.state.send_if_modified(|s| match f(*s) {
            Some(next) if next != *s => {
                *s = next;
                moved_to = Some(next);
                true
            }
            _ => false,
        });
        match moved_to {
            Some(state) => {
                info!(state = %state, "queue state");
                self.emit(RunnerEvent::StateChanged { state });
                true
            }
            None => false,
        }
    }

    fn emit(&self, event: RunnerEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
