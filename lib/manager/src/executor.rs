//! The per-task executor state machine.
//!
//! Idle: no pending timer. Active: at most one pending timer, running a
//! background loop that sleeps until the next run date, spawns an
//! execution monitor without waiting on it, then recomputes and arms the
//! next sleep. `stop()` cancels the timer loop but never the child process
//! a monitor may currently be running.

use chrono::{DateTime, Utc};
use pscheduler_core::TaskId;
use pscheduler_executor::{ExecutionMonitor, OutputLogBuffer, StatusCallback};
use pscheduler_store::{ProcessLogStatus, Store, Task};
use pscheduler_trigger::RunDateIter;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

/// The executor's reported status: either it has never run, or it
/// reflects the most recent `ProcessLog` status its monitor produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorStatus {
    /// No execution monitor has reported a status yet.
    NeverLaunched,
    /// The most recent status an execution monitor reported.
    Produced(ProcessLogStatus),
}

impl fmt::Display for ExecutorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverLaunched => write!(f, "never launched"),
            Self::Produced(status) => write!(f, "{status}"),
        }
    }
}

struct Shared {
    task: Task,
    active: AtomicBool,
    status: StdMutex<ExecutorStatus>,
}

/// In-memory controller for exactly one task.
pub struct Executor {
    task_id: TaskId,
    shared: Arc<Shared>,
    store: Store,
    buffer: Arc<OutputLogBuffer>,
    timer: AsyncMutex<Option<JoinHandle<()>>>,
}

impl Executor {
    /// Builds an idle executor over `task`. Does not run it.
    #[must_use]
    pub fn new(task: Task, store: Store, buffer: Arc<OutputLogBuffer>) -> Self {
        Self {
            task_id: task.task_id,
            shared: Arc::new(Shared {
                task,
                active: AtomicBool::new(false),
                status: StdMutex::new(ExecutorStatus::NeverLaunched),
            }),
            store,
            buffer,
            timer: AsyncMutex::new(None),
        }
    }

    /// The task this executor controls.
    #[must_use]
    pub fn task(&self) -> &Task {
        &self.shared.task
    }

    /// The task id this executor controls.
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Whether the executor currently has a pending timer.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// The most recently reported execution status.
    #[must_use]
    pub fn status(&self) -> ExecutorStatus {
        *self.shared.status.lock().unwrap()
    }

    /// Idle → Active: creates a fresh run-date iterator and arms the first
    /// timer. A no-op if already active.
    pub async fn run(self: &Arc<Self>) {
        let mut timer = self.timer.lock().await;
        if self.shared.active.swap(true, Ordering::SeqCst) {
            return;
        }

        let this = Arc::clone(self);
        *timer = Some(tokio::spawn(async move { this.timer_loop().await }));
    }

    /// Active → Idle: cancels the pending timer. Any execution monitor
    /// currently running continues to completion. A no-op if already idle.
    pub async fn stop(&self) {
        let mut timer = self.timer.lock().await;
        self.shared.active.store(false, Ordering::SeqCst);
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }

    async fn timer_loop(self: Arc<Self>) {
        let mut iter = RunDateIter::new(&self.shared.task.trigger, Utc::now());

        loop {
            let Some(instant) = self.next_fire(&mut iter).await else {
                self.shared.active.store(false, Ordering::SeqCst);
                return;
            };

            let now = Utc::now();
            if instant > now {
                if let Ok(delay) = (instant - now).to_std() {
                    tokio::time::sleep(delay).await;
                }
            }

            self.spawn_monitor();
        }
    }

    /// Consumes run dates until the first instant strictly in the future,
    /// recording every past instant as `missed` along the way. Returns
    /// `None` once the iterator is exhausted (date trigger, post-fire).
    async fn next_fire(&self, iter: &mut RunDateIter) -> Option<DateTime<Utc>> {
        loop {
            let candidate = iter.next()?;
            let now = Utc::now();
            if candidate > now {
                return Some(candidate);
            }

            if let Err(e) = self
                .store
                .insert_process_log(
                    self.task_id,
                    ProcessLogStatus::Missed,
                    candidate,
                    Some(candidate),
                    None,
                )
                .await
            {
                tracing::warn!(task_id = %self.task_id, error = %e, "failed to record missed run");
            } else {
                *self.shared.status.lock().unwrap() = ExecutorStatus::Produced(ProcessLogStatus::Missed);
            }
        }
    }

    /// Launches an execution monitor as an independent task so it never
    /// blocks the timer loop.
    fn spawn_monitor(self: &Arc<Self>) {
        let store = self.store.clone();
        let buffer = Arc::clone(&self.buffer);
        let task_id = self.task_id;
        let command = self.shared.task.command.clone();
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            let monitor = ExecutionMonitor::new(store, buffer);
            let callback: StatusCallback = Arc::new(move |status| {
                *shared.status.lock().unwrap() = ExecutorStatus::Produced(status);
            });
            if let Err(e) = monitor.start(task_id, &command, Utc::now(), &callback).await {
                tracing::warn!(%task_id, error = %e, "execution monitor reported an error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_launched_displays_literal() {
        assert_eq!(ExecutorStatus::NeverLaunched.to_string(), "never launched");
    }

    #[test]
    fn produced_displays_inner_status() {
        assert_eq!(
            ExecutorStatus::Produced(ProcessLogStatus::Finished).to_string(),
            "finished"
        );
    }

    /// A task whose interval is long enough that, within one test's
    /// lifetime, its timer loop never fires and so never touches the
    /// store — letting `run()`/`stop()`'s state transitions be exercised
    /// against a `Store` built from `PgPoolOptions::connect_lazy` (which
    /// never opens a connection), matching the approach in
    /// `pscheduler-executor`'s `monitor.rs` tests.
    fn far_future_task() -> Task {
        let now = Utc::now();
        Task {
            task_id: TaskId::new(),
            title: "t".to_string(),
            descr: None,
            command: "true".to_string(),
            trigger: pscheduler_trigger::TriggerConfig::Interval {
                args: pscheduler_trigger::IntervalArgs {
                    hours: Some(6),
                    ..Default::default()
                },
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn lazy_store() -> Store {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool construction does not touch the network");
        Store::new(pool)
    }

    #[tokio::test]
    async fn run_activates_an_idle_executor() {
        let executor = Arc::new(Executor::new(
            far_future_task(),
            lazy_store(),
            Arc::new(OutputLogBuffer::new()),
        ));
        assert!(!executor.is_active());
        executor.run().await;
        assert!(executor.is_active());
        executor.stop().await;
    }

    #[tokio::test]
    async fn run_on_active_executor_is_a_no_op() {
        let executor = Arc::new(Executor::new(
            far_future_task(),
            lazy_store(),
            Arc::new(OutputLogBuffer::new()),
        ));
        executor.run().await;
        assert!(executor.is_active());
        // Idempotent: a second `run()` must not spawn a second timer loop.
        executor.run().await;
        assert!(executor.is_active());
        executor.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let executor = Arc::new(Executor::new(
            far_future_task(),
            lazy_store(),
            Arc::new(OutputLogBuffer::new()),
        ));
        executor.stop().await;
        assert!(!executor.is_active());
        executor.run().await;
        executor.stop().await;
        assert!(!executor.is_active());
        // Idempotent: stopping an already-idle executor is a no-op.
        executor.stop().await;
        assert!(!executor.is_active());
    }

    #[test]
    fn never_launched_is_the_initial_status() {
        let executor = Executor::new(far_future_task(), lazy_store(), Arc::new(OutputLogBuffer::new()));
        assert_eq!(executor.status(), ExecutorStatus::NeverLaunched);
    }
}
