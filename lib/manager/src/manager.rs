//! The execution manager and its `sync()` reconciliation loop. A
//! process-wide singleton registry mapping `task_id -> Executor`, kept
//! aligned with the persistent task set.

use crate::error::ManagerError;
use crate::executor::{Executor, ExecutorStatus};
use pscheduler_core::TaskId;
use pscheduler_executor::OutputLogBuffer;
use pscheduler_store::{Store, Task};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A snapshot of one executor, for read-only reporting.
#[derive(Debug, Clone)]
pub struct ExecutorSnapshot {
    /// The task this executor controls.
    pub task: Task,
    /// Whether the executor currently has a pending timer.
    pub active: bool,
    /// The executor's most recently reported status.
    pub status: ExecutorStatus,
}

/// Process-wide registry of executors, reconciled against the store.
///
/// `sync()` is serialized behind an internal mutex so at most one
/// reconciliation runs at a time.
pub struct Manager {
    store: Store,
    buffer: Arc<OutputLogBuffer>,
    executors: Mutex<HashMap<TaskId, Arc<Executor>>>,
}

impl Manager {
    /// Builds an empty manager over `store` and `buffer`. Call [`Manager::sync`]
    /// to populate it from the store.
    #[must_use]
    pub fn new(store: Store, buffer: Arc<OutputLogBuffer>) -> Self {
        Self {
            store,
            buffer,
            executors: Mutex::new(HashMap::new()),
        }
    }

    /// Reconciles the registry against the persistent task set:
    /// - unknown `task_id`s get a freshly built, inactive executor;
    /// - known ids whose task changed (per [`Task::semantically_eq`]) get
    ///   replaced — the replacement inherits the old executor's active/idle
    ///   state;
    /// - known ids whose task is unchanged are left alone;
    /// - ids present in the registry but absent from the store are stopped
    ///   and removed.
    pub async fn sync(&self) -> Result<(), ManagerError> {
        let tasks = self.store.list_tasks().await?;
        let mut executors = self.executors.lock().await;

        let mut seen = std::collections::HashSet::with_capacity(tasks.len());
        for task in tasks {
            seen.insert(task.task_id);

            match executors.get(&task.task_id) {
                None => {
                    let executor = Arc::new(Executor::new(
                        task,
                        self.store.clone(),
                        Arc::clone(&self.buffer),
                    ));
                    executors.insert(executor.task_id(), executor);
                }
                Some(existing) if !existing.task().semantically_eq(&task) => {
                    let was_active = existing.is_active();
                    let replacement = Arc::new(Executor::new(
                        task,
                        self.store.clone(),
                        Arc::clone(&self.buffer),
                    ));
                    if was_active {
                        replacement.run().await;
                    }
                    let old = executors.insert(replacement.task_id(), replacement);
                    if let Some(old) = old {
                        old.stop().await;
                    }
                }
                Some(_) => {}
            }
        }

        let stale: Vec<TaskId> = executors
            .keys()
            .copied()
            .filter(|id| !seen.contains(id))
            .collect();
        for id in stale {
            if let Some(executor) = executors.remove(&id) {
                executor.stop().await;
            }
        }

        Ok(())
    }

    /// Delegates to the executor's `run()`. Fails if `id` is not registered.
    pub async fn run_task(&self, id: TaskId) -> Result<(), ManagerError> {
        let executor = self.get(id).await?;
        executor.run().await;
        Ok(())
    }

    /// Delegates to the executor's `stop()`. Fails if `id` is not registered.
    pub async fn stop_task(&self, id: TaskId) -> Result<(), ManagerError> {
        let executor = self.get(id).await?;
        executor.stop().await;
        Ok(())
    }

    /// Runs every registered executor.
    pub async fn run_all(&self) {
        let executors: Vec<Arc<Executor>> = self.executors.lock().await.values().cloned().collect();
        for executor in executors {
            executor.run().await;
        }
    }

    /// Stops every registered executor.
    pub async fn stop_all(&self) {
        let executors: Vec<Arc<Executor>> = self.executors.lock().await.values().cloned().collect();
        for executor in executors {
            executor.stop().await;
        }
    }

    /// Snapshots every registered executor.
    pub async fn list(&self) -> Vec<ExecutorSnapshot> {
        self.executors
            .lock()
            .await
            .values()
            .map(|executor| ExecutorSnapshot {
                task: executor.task().clone(),
                active: executor.is_active(),
                status: executor.status(),
            })
            .collect()
    }

    /// The set of `task_id`s currently registered (tests, diagnostics).
    pub async fn registered_ids(&self) -> std::collections::HashSet<TaskId> {
        self.executors.lock().await.keys().copied().collect()
    }

    async fn get(&self, id: TaskId) -> Result<Arc<Executor>, ManagerError> {
        self.executors
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(ManagerError::TaskNotFound { task_id: id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pscheduler_trigger::{IntervalArgs, TriggerConfig};

    fn dummy_task(command: &str) -> Task {
        let now = chrono::Utc::now();
        Task {
            task_id: TaskId::new(),
            title: "t".to_string(),
            descr: None,
            command: command.to_string(),
            trigger: TriggerConfig::Interval {
                args: IntervalArgs {
                    seconds: Some(60),
                    ..Default::default()
                },
            },
            created_at: now,
            updated_at: now,
        }
    }

    // `Manager::sync` needs a live pool to call `list_tasks`, so its
    // replace-preserves-active-state and stale-removal bookkeeping isn't
    // exercised here; `Executor`'s own state-machine tests in executor.rs
    // cover the run/stop transitions that bookkeeping relies on. Here we
    // only check the parts that don't require a database.

    #[test]
    fn executor_snapshot_carries_task_and_status() {
        let task = dummy_task("echo hi");
        let snapshot = ExecutorSnapshot {
            task: task.clone(),
            active: false,
            status: ExecutorStatus::NeverLaunched,
        };
        assert_eq!(snapshot.task.task_id, task.task_id);
        assert!(!snapshot.active);
    }
}
