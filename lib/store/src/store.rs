//! The persistent store adapter: typed read/write operations for tasks,
//! process logs, and output logs, with transactional commit semantics and
//! rollback on failure.

use crate::error::StoreError;
use crate::models::{OutputLog, OutputStreamKind, ProcessLog, ProcessLogStatus, Task};
use chrono::{DateTime, Utc};
use pscheduler_core::{OutputLogId, ProcessLogId, TaskId};
use pscheduler_trigger::TriggerConfig;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// The fields an HTTP `POST /task` body supplies; the store adapter is the
/// sole validator of `trigger_type`/`trigger_args` during insert/update.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    /// Human-readable title. Must be non-empty.
    pub title: String,
    /// Optional free-text description.
    pub descr: Option<String>,
    /// Shell command line. Must be non-empty.
    pub command: String,
    /// `trigger_type` discriminator (`"cron"`, `"interval"`, or `"date"`).
    pub trigger_type: String,
    /// Type-specific `trigger_args` payload, serialized as text.
    pub trigger_args: String,
}

impl TaskDraft {
    fn validate_fields(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() {
            return Err(StoreError::EmptyField { field: "title" });
        }
        if self.command.trim().is_empty() {
            return Err(StoreError::EmptyField { field: "command" });
        }
        Ok(())
    }

    fn into_trigger(self) -> Result<(String, Option<String>, String, TriggerConfig), StoreError> {
        self.validate_fields()?;
        let trigger = TriggerConfig::from_parts(&self.trigger_type, &self.trigger_args)?;
        Ok((self.title, self.descr, self.command, trigger))
    }
}

#[derive(FromRow)]
struct TaskRow {
    task_id: String,
    title: String,
    descr: Option<String>,
    command: String,
    trigger_type: String,
    trigger_args: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn try_into_task(self) -> Result<Task, StoreError> {
        let task_id = TaskId::from_str(&self.task_id)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let trigger = TriggerConfig::from_parts(&self.trigger_type, &self.trigger_args)?;
        Ok(Task {
            task_id,
            title: self.title,
            descr: self.descr,
            command: self.command,
            trigger,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ProcessLogRow {
    process_log_id: String,
    task_id: String,
    status: String,
    start_date: DateTime<Utc>,
    finish_date: Option<DateTime<Utc>>,
    return_code: Option<i32>,
}

impl ProcessLogRow {
    fn try_into_process_log(self) -> Result<ProcessLog, StoreError> {
        let process_log_id = ProcessLogId::from_str(&self.process_log_id)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let task_id =
            TaskId::from_str(&self.task_id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let status = ProcessLogStatus::from_str(&self.status).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            )))
        })?;
        Ok(ProcessLog {
            process_log_id,
            task_id,
            status,
            start_date: self.start_date,
            finish_date: self.finish_date,
            return_code: self.return_code,
        })
    }
}

#[derive(FromRow)]
struct OutputLogRow {
    output_log_id: String,
    process_log_id: String,
    message: String,
    time: DateTime<Utc>,
    is_error: bool,
}

impl OutputLogRow {
    fn try_into_output_log(self) -> Result<OutputLog, StoreError> {
        let output_log_id = OutputLogId::from_str(&self.output_log_id)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let process_log_id = ProcessLogId::from_str(&self.process_log_id)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(OutputLog {
            output_log_id,
            process_log_id,
            message: self.message,
            time: self.time,
            kind: OutputStreamKind::from_is_error(self.is_error),
        })
    }
}

/// A line ready to be committed to the `output_log` table, carrying
/// everything but its assigned id (the buffer assigns the id at flush
/// time — see [`pscheduler_executor::buffer::OutputLogBuffer`]).
#[derive(Debug, Clone)]
pub struct PendingOutputLog {
    /// Primary key, assigned when the record is constructed.
    pub output_log_id: OutputLogId,
    /// The process log this line belongs to.
    pub process_log_id: ProcessLogId,
    /// One logical line, terminator preserved.
    pub message: String,
    /// When the line was observed on its stream.
    pub time: DateTime<Utc>,
    /// Which stream the line came from.
    pub kind: OutputStreamKind,
}

/// Typed read/write operations over the `task`, `process_log`, and
/// `output_log` tables.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool (for migrations, health checks, etc).
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---- tasks ----------------------------------------------------------

    /// Lists all tasks.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT task_id, title, descr, command, trigger_type, trigger_args,
                   created_at, updated_at
            FROM task
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskRow::try_into_task).collect()
    }

    /// Gets a task by id.
    pub async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            SELECT task_id, title, descr, command, trigger_type, trigger_args,
                   created_at, updated_at
            FROM task
            WHERE task_id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => r.try_into_task(),
            None => Err(StoreError::TaskNotFound { id }),
        }
    }

    /// Inserts a task from a draft, constructing the correct trigger
    /// variant and rejecting invalid `trigger_args`.
    pub async fn insert_task(&self, draft: TaskDraft) -> Result<Task, StoreError> {
        let (title, descr, command, trigger) = draft.into_trigger()?;
        let now = Utc::now();
        let task = Task {
            task_id: TaskId::new(),
            title,
            descr,
            command,
            trigger,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO task
                (task_id, title, descr, command, trigger_type, trigger_args, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(task.task_id.to_string())
        .bind(&task.title)
        .bind(&task.descr)
        .bind(&task.command)
        .bind(task.trigger.trigger_type().as_str())
        .bind(task.trigger.to_args_text())
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(task)
    }

    /// Full-replaces `command`, `title`, `descr`, `trigger_type`,
    /// `trigger_args` for an existing task.
    pub async fn update_task(&self, id: TaskId, draft: TaskDraft) -> Result<Task, StoreError> {
        let (title, descr, command, trigger) = draft.into_trigger()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let returned: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            UPDATE task
            SET title = $2, descr = $3, command = $4, trigger_type = $5,
                trigger_args = $6, updated_at = $7
            WHERE task_id = $1
            RETURNING created_at
            "#,
        )
        .bind(id.to_string())
        .bind(&title)
        .bind(&descr)
        .bind(&command)
        .bind(trigger.trigger_type().as_str())
        .bind(trigger.to_args_text())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((created_at,)) = returned else {
            tx.rollback().await?;
            return Err(StoreError::TaskNotFound { id });
        };
        tx.commit().await?;

        Ok(Task {
            task_id: id,
            title,
            descr,
            command,
            trigger,
            created_at,
            updated_at: now,
        })
    }

    /// Deletes a task by id. `ProcessLog`/`OutputLog` rows are left intact
    /// (not a cascading FK — logs outlive the task they were recorded for).
    pub async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM task WHERE task_id = $1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::TaskNotFound { id });
        }
        tx.commit().await?;
        Ok(())
    }

    // ---- process logs -----------------------------------------------------

    /// Lists all process logs, ordered by id (i.e. creation order, since
    /// ids are ULIDs).
    pub async fn list_process_logs(&self) -> Result<Vec<ProcessLog>, StoreError> {
        let rows: Vec<ProcessLogRow> = sqlx::query_as(
            r#"
            SELECT process_log_id, task_id, status, start_date, finish_date, return_code
            FROM process_log
            ORDER BY process_log_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(ProcessLogRow::try_into_process_log)
            .collect()
    }

    /// Gets a process log by id.
    pub async fn get_process_log(&self, id: ProcessLogId) -> Result<ProcessLog, StoreError> {
        let row: Option<ProcessLogRow> = sqlx::query_as(
            r#"
            SELECT process_log_id, task_id, status, start_date, finish_date, return_code
            FROM process_log
            WHERE process_log_id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => r.try_into_process_log(),
            None => Err(StoreError::ProcessLogNotFound { id }),
        }
    }

    /// Inserts a new process log, returning the persisted record. Used both
    /// to create `awaiting`/`started` logs ahead of a spawn and to record
    /// `missed` logs directly in terminal state.
    pub async fn insert_process_log(
        &self,
        task_id: TaskId,
        status: ProcessLogStatus,
        start_date: DateTime<Utc>,
        finish_date: Option<DateTime<Utc>>,
        return_code: Option<i32>,
    ) -> Result<ProcessLog, StoreError> {
        let log = ProcessLog {
            process_log_id: ProcessLogId::new(),
            task_id,
            status,
            start_date,
            finish_date,
            return_code,
        };

        sqlx::query(
            r#"
            INSERT INTO process_log
                (process_log_id, task_id, status, start_date, finish_date, return_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(log.process_log_id.to_string())
        .bind(log.task_id.to_string())
        .bind(log.status.as_str())
        .bind(log.start_date)
        .bind(log.finish_date)
        .bind(log.return_code)
        .execute(&self.pool)
        .await?;

        Ok(log)
    }

    /// Transitions a process log to a terminal status (`finished`/`failed`),
    /// recording `finish_date` and `return_code`.
    pub async fn finalize_process_log(
        &self,
        id: ProcessLogId,
        status: ProcessLogStatus,
        finish_date: DateTime<Utc>,
        return_code: Option<i32>,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE process_log
            SET status = $2, finish_date = $3, return_code = $4
            WHERE process_log_id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(finish_date)
        .bind(return_code)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::ProcessLogNotFound { id });
        }
        Ok(())
    }

    // ---- output logs --------------------------------------------------

    /// Lists output logs for `process_log_id`, optionally filtered to ids
    /// greater than `after` (the output-streaming endpoint's
    /// `?last_output_log_id=` query).
    pub async fn list_output_logs(
        &self,
        process_log_id: ProcessLogId,
        after: Option<OutputLogId>,
    ) -> Result<Vec<OutputLog>, StoreError> {
        let rows: Vec<OutputLogRow> = match after {
            Some(after) => {
                sqlx::query_as(
                    r#"
                    SELECT output_log_id, process_log_id, message, time, is_error
                    FROM output_log
                    WHERE process_log_id = $1 AND output_log_id > $2
                    ORDER BY output_log_id
                    "#,
                )
                .bind(process_log_id.to_string())
                .bind(after.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT output_log_id, process_log_id, message, time, is_error
                    FROM output_log
                    WHERE process_log_id = $1
                    ORDER BY output_log_id
                    "#,
                )
                .bind(process_log_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter()
            .map(OutputLogRow::try_into_output_log)
            .collect()
    }

    /// Inserts a batch of output log lines in a single transactional
    /// commit, preserving the caller's ordering.
    pub async fn insert_output_logs(&self, lines: &[PendingOutputLog]) -> Result<(), StoreError> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO output_log
                    (output_log_id, process_log_id, message, time, is_error)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(line.output_log_id.to_string())
            .bind(line.process_log_id.to_string())
            .bind(&line.message)
            .bind(line.time)
            .bind(line.kind.is_error())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
