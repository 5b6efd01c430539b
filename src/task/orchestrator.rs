//! Task orchestrator: submission, bounded dispatch and completion watching.
//!
//! [`CopyOrchestrator::submit`] registers a task and returns its id right
//! away. Each item runs in its own Tokio task holding one permit of a shared
//! semaphore, so at most `thread_pool_size` copies run at once across all
//! tasks. A separate watcher per task joins the item handles without taking a
//! permit and then computes the task's terminal status.
//!
//! An item's failure, including a panic, is recorded on that item only.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::copy_task::{CopyTask, CopyTaskSnapshot, TaskStatus};
use super::error::TaskError;
use super::item::CopyItem;
use crate::config::{CopierConfig, MAX_THREAD_POOL_SIZE, MIN_THREAD_POOL_SIZE};
use crate::copy::{CopyEngine, INTERRUPT_POLL_INTERVAL};
use crate::fs::FileSystemProvider;

/// Owns the task registry and dispatches item copies.
///
/// The registry keeps every submitted task for the orchestrator's lifetime.
#[derive(Debug)]
pub struct CopyOrchestrator {
    tasks: DashMap<String, Arc<CopyTask>>,
    semaphore: Arc<Semaphore>,
    engine: Arc<CopyEngine>,
    interrupted: Arc<AtomicBool>,
    runtime: Handle,
    pool_size: usize,
}

impl CopyOrchestrator {
    /// Creates an orchestrator from configuration and a handle provider.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidPoolSize`] if `thread_pool_size` is out of
    /// range, or [`TaskError::NoRuntime`] outside a Tokio runtime.
    pub fn new(
        config: &CopierConfig,
        provider: Arc<dyn FileSystemProvider>,
    ) -> Result<Self, TaskError> {
        let engine = CopyEngine::new(provider, config.checksum_enabled);
        Self::with_engine(config.thread_pool_size, engine)
    }

    /// Creates an orchestrator around a preconfigured engine.
    ///
    /// The engine's interrupt flag becomes the orchestrator's.
    ///
    /// # Errors
    ///
    /// See [`CopyOrchestrator::new`].
    #[instrument(skip(engine))]
    pub fn with_engine(pool_size: usize, engine: CopyEngine) -> Result<Self, TaskError> {
        if !(MIN_THREAD_POOL_SIZE..=MAX_THREAD_POOL_SIZE).contains(&pool_size) {
            return Err(TaskError::InvalidPoolSize { value: pool_size });
        }
        let runtime = Handle::try_current().map_err(|_| TaskError::NoRuntime)?;
        let interrupted = Arc::clone(engine.interrupt_flag());

        debug!(pool_size, "copy orchestrator created");
        Ok(Self {
            tasks: DashMap::new(),
            semaphore: Arc::new(Semaphore::new(pool_size)),
            engine: Arc::new(engine),
            interrupted,
            runtime,
            pool_size,
        })
    }

    /// Returns the worker pool size.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true once [`CopyOrchestrator::interrupt`] has been called.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Submits a batch of `(source, destination)` pairs.
    ///
    /// Returns the new task id without waiting for any copy. `bandwidth_limit`
    /// is in MB/s; `None` is unbounded. A zero limit is not rejected here;
    /// each item then fails when its throttle is built.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub fn submit(
        &self,
        namespace: &str,
        bandwidth_limit: Option<u32>,
        items: Vec<(String, String)>,
    ) -> String {
        let task = Arc::new(CopyTask::new(namespace, bandwidth_limit, items));
        let task_id = task.id().to_string();

        self.tasks.insert(task_id.clone(), Arc::clone(&task));
        task.mark_in_progress();
        info!(task_id = %task_id, namespace, ?bandwidth_limit, "task submitted");

        let namespace: Arc<str> = Arc::from(namespace);
        let handles: Vec<JoinHandle<()>> = task
            .items()
            .iter()
            .map(|item| {
                self.runtime.spawn(run_item(
                    Arc::clone(item),
                    Arc::clone(&namespace),
                    bandwidth_limit,
                    Arc::clone(&self.engine),
                    Arc::clone(&self.semaphore),
                    Arc::clone(&self.interrupted),
                ))
            })
            .collect();

        self.runtime
            .spawn(watch_task(task, handles, Arc::clone(&self.interrupted)));

        task_id
    }

    /// Returns a snapshot of the task, or `None` for an unknown id.
    #[must_use]
    pub fn get(&self, task_id: &str) -> Option<CopyTaskSnapshot> {
        self.tasks.get(task_id).map(|task| task.snapshot())
    }

    /// Waits until the task is terminal and returns its final snapshot.
    ///
    /// Returns `None` for an unknown id.
    pub async fn wait(&self, task_id: &str) -> Option<CopyTaskSnapshot> {
        let task = self.tasks.get(task_id).map(|entry| Arc::clone(entry.value()))?;
        while !task.status().is_terminal() {
            tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
        }
        Some(task.snapshot())
    }

    /// Stops outstanding work as far as it can be stopped.
    ///
    /// Throttled reads fail at their next wait, items still waiting for a
    /// worker slot fail without starting, and watchers stop waiting and mark
    /// their tasks failed. Unthrottled transfers already running are not
    /// aborted.
    pub fn interrupt(&self) {
        if !self.interrupted.swap(true, Ordering::SeqCst) {
            warn!(tasks = self.tasks.len(), "copy orchestrator interrupted");
        }
    }
}

async fn wait_for_interrupt(interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}

/// Runs one item to a terminal status.
async fn run_item(
    item: Arc<CopyItem>,
    namespace: Arc<str>,
    bandwidth_limit: Option<u32>,
    engine: Arc<CopyEngine>,
    semaphore: Arc<Semaphore>,
    interrupted: Arc<AtomicBool>,
) {
    let permit = tokio::select! {
        biased;
        () = wait_for_interrupt(&interrupted) => None,
        result = semaphore.acquire_owned() => result.ok(),
    };
    // Permit is released when this function returns (RAII)
    let Some(_permit) = permit else {
        item.mark_failed("interrupted before copy started", 0);
        return;
    };
    if interrupted.load(Ordering::SeqCst) {
        item.mark_failed("interrupted before copy started", 0);
        return;
    }

    item.mark_in_progress();
    debug!(source = item.source_path(), dest = item.dest_path(), "item started");
    let started = Instant::now();

    let result = engine
        .copy(
            &namespace,
            item.source_path(),
            Path::new(item.dest_path()),
            bandwidth_limit,
        )
        .await;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(outcome) => {
            info!(
                source = item.source_path(),
                bytes = outcome.bytes_copied,
                duration_ms,
                checksum_verified = outcome.checksum_verified,
                "item completed"
            );
            item.mark_completed(outcome.bytes_copied, outcome.checksum_verified, duration_ms);
        }
        Err(error) => {
            warn!(
                source = item.source_path(),
                error = %error,
                "item failed"
            );
            item.mark_failed(error.to_string(), duration_ms);
        }
    }
}

/// Joins every item of `task`, then records its terminal status.
async fn watch_task(task: Arc<CopyTask>, handles: Vec<JoinHandle<()>>, interrupted: Arc<AtomicBool>) {
    let join_items = async {
        let results = join_all(handles).await;
        for (item, result) in task.items().iter().zip(results) {
            if let Err(join_error) = result {
                warn!(
                    source = item.source_path(),
                    error = %join_error,
                    "copy task panicked"
                );
                item.mark_failed(format!("task panic: {join_error}"), 0);
            }
        }
    };

    let status = tokio::select! {
        () = join_items => task.finalize(),
        () = wait_for_interrupt(&interrupted) => {
            warn!(task_id = task.id(), "completion wait interrupted");
            task.force_failed()
        }
    };

    log_finalized(&task, status);
}

fn log_finalized(task: &CopyTask, status: TaskStatus) {
    let snapshot = task.snapshot();
    info!(
        task_id = task.id(),
        status = %status,
        completed = snapshot.completed_count(),
        failed = snapshot.failed_count(),
        bytes = snapshot.total_bytes(),
        "task finished"
    );
}
