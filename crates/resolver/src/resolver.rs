use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ResolveError, TaskError};
use crate::field::{FieldErrors, FieldKey};
use crate::task::{Apply, Task, TaskSet};

/// What to do when a task reports an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Return the first error; cancel and reap the remaining workers.
    FailFast,
    /// Wait for every task; report failures per field.
    CollectAll,
}

impl FailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailFast => "fail_fast",
            Self::CollectAll => "collect_all",
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Upper bound on a whole run. Expiry is reported as `ResolveError::Timeout`
    /// regardless of policy.
    pub deadline: Option<Duration>,
}

struct Completion<R> {
    key: FieldKey,
    name: String,
    result: Result<Apply<R>, TaskError>,
}

/// Decrements the live-worker gauge however the worker exits
/// (completion, cancellation, abort).
struct WorkerGuard(Arc<AtomicUsize>);

impl WorkerGuard {
    fn enter(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::AcqRel);
        Self(live.clone())
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs a task set concurrently and merges the values into a record.
///
/// Cheap to clone; clones share the live-worker gauge.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
    live: Arc<AtomicUsize>,
}

impl Resolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Worker tasks spawned by this resolver (or its clones) that have not
    /// exited yet, including ones abandoned by a fail-fast run and still
    /// being reaped.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Resolve every task in `tasks` into `record`.
    ///
    /// On success the returned map is empty unless `policy` is
    /// `CollectAll` and some tasks failed; those fields keep their prior value.
    ///
    /// # Errors
    /// - `EmptyTaskSet` / `DuplicateField` for a malformed task set.
    /// - `Task` for the first failing task under `FailFast`.
    /// - `Timeout` when the configured deadline expires first.
    /// - `WorkerLost` if a worker vanished without reporting.
    pub async fn resolve<R: 'static>(
        &self,
        tasks: TaskSet<R>,
        record: &mut R,
        policy: FailurePolicy,
    ) -> Result<FieldErrors, ResolveError> {
        tasks.validate()?;

        let run_id = ulid::Ulid::new();
        let expected = tasks.len();
        let mut pending: Vec<FieldKey> = tasks.keys().collect();

        // Capacity N: a worker's single send never waits, even after the
        // collector has stopped listening.
        let (tx, mut rx) = mpsc::channel::<Completion<R>>(expected);
        let token = CancellationToken::new();
        let mut workers = JoinSet::new();

        for task in tasks.into_tasks() {
            let guard = WorkerGuard::enter(&self.live);
            workers.spawn(run_worker(task, tx.clone(), token.clone(), guard));
        }
        drop(tx);

        debug!(%run_id, tasks = expected, %policy, "resolution started");

        // A deadline past the clock's range is the same as none.
        let deadline = self
            .config
            .deadline
            .and_then(|d| Instant::now().checked_add(d).map(|at| (d, at)));
        let mut errors = FieldErrors::new();
        let mut received = 0usize;

        while received < expected {
            let next = match deadline {
                Some((after, at)) => tokio::select! {
                    completion = rx.recv() => completion,
                    () = tokio::time::sleep_until(at) => {
                        warn!(%run_id, ?after, pending = pending.len(), "resolution deadline exceeded");
                        abandon(run_id, token, workers, rx);
                        return Err(ResolveError::Timeout { after, pending });
                    }
                },
                None => rx.recv().await,
            };

            let Some(completion) = next else {
                abandon(run_id, token, workers, rx);
                return Err(ResolveError::WorkerLost { received, expected });
            };

            received += 1;
            pending.retain(|k| *k != completion.key);

            // The writer belongs to the task: a panic in it fails that field only.
            let outcome = completion.result.and_then(|apply| {
                std::panic::catch_unwind(AssertUnwindSafe(|| apply(&mut *record)))
                    .map_err(|panic| TaskError::Panicked(panic_message(panic.as_ref())))
            });

            match outcome {
                Ok(()) => {
                    debug!(%run_id, field = %completion.key, task = %completion.name, "field resolved");
                }
                Err(source) => {
                    warn!(
                        %run_id,
                        field = %completion.key,
                        task = %completion.name,
                        error = %source,
                        "task failed"
                    );
                    match policy {
                        FailurePolicy::FailFast => {
                            abandon(run_id, token, workers, rx);
                            return Err(ResolveError::Task {
                                field: completion.key,
                                task: completion.name,
                                source,
                            });
                        }
                        FailurePolicy::CollectAll => errors.insert(completion.key, source),
                    }
                }
            }
        }

        // Every worker has sent; joining only waits for them to return.
        while workers.join_next().await.is_some() {}

        info!(%run_id, tasks = expected, failed = errors.len(), "resolution finished");
        Ok(errors)
    }
}

async fn run_worker<R: 'static>(
    task: Task<R>,
    tx: mpsc::Sender<Completion<R>>,
    token: CancellationToken,
    _guard: WorkerGuard,
) {
    let (key, name, run) = task.into_parts();

    // Calling `run` inside the future keeps a panic in its synchronous
    // prelude within catch_unwind.
    let work = AssertUnwindSafe(async move { run().await }).catch_unwind();

    let result = tokio::select! {
        biased;
        () = token.cancelled() => {
            debug!(field = %key, task = %name, "worker cancelled");
            return;
        }
        outcome = work => match outcome {
            Ok(result) => result,
            Err(panic) => Err(TaskError::Panicked(panic_message(panic.as_ref()))),
        },
    };

    // The receiver may already be gone after a fail-fast decision.
    let _ = tx.send(Completion { key, name, result }).await;
}

/// Stop the run without waiting for stragglers: signal cancellation and hand
/// the workers to a background reaper that joins every one of them.
fn abandon<R: 'static>(
    run_id: ulid::Ulid,
    token: CancellationToken,
    mut workers: JoinSet<()>,
    rx: mpsc::Receiver<Completion<R>>,
) {
    token.cancel();
    let outstanding = workers.len();

    tokio::spawn(async move {
        let mut reaped = 0usize;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(%run_id, error = %e, "worker join failed");
            }
            reaped += 1;
        }
        drop(rx);
        debug!(%run_id, reaped, outstanding, "abandoned workers reaped");
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
