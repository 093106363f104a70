//! Domain record types for the `task`, `process_log`, and `output_log`
//! tables.

use chrono::{DateTime, Utc};
use pscheduler_core::{OutputLogId, ProcessLogId, TaskId};
use pscheduler_trigger::TriggerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A persistent task record: "what to run" plus "when to run it".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Primary key, assigned on insert.
    pub task_id: TaskId,
    /// Non-empty human-readable title.
    pub title: String,
    /// Optional free-text description.
    pub descr: Option<String>,
    /// Non-empty shell command line.
    pub command: String,
    /// The trigger that produces this task's run instants.
    pub trigger: TriggerConfig,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Two tasks are semantically equal iff `(command, trigger_type,
    /// trigger_args)` are equal — the equality the manager uses to detect
    /// "unchanged" during reconciliation.
    #[must_use]
    pub fn semantically_eq(&self, other: &Task) -> bool {
        self.command == other.command && self.trigger == other.trigger
    }
}

/// Lifecycle status of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessLogStatus {
    /// Created for a scheduled run, process not yet spawned.
    Awaiting,
    /// Process spawned, still running.
    Started,
    /// Process exited with return code 0.
    Finished,
    /// Process exited with a non-zero return code, or failed to spawn.
    Failed,
    /// The scheduled instant was already in the past when computed; no
    /// process was spawned.
    Missed,
}

impl ProcessLogStatus {
    /// The string stored in the `status` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Awaiting => "awaiting",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Missed => "missed",
        }
    }
}

impl fmt::Display for ProcessLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProcessLogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting" => Ok(Self::Awaiting),
            "started" => Ok(Self::Started),
            "finished" => Ok(Self::Finished),
            "failed" => Ok(Self::Failed),
            "missed" => Ok(Self::Missed),
            other => Err(format!("unknown process log status '{other}'")),
        }
    }
}

/// A persistent record of one execution attempt and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessLog {
    /// Primary key.
    pub process_log_id: ProcessLogId,
    /// The task this execution belongs to. Not a cascading FK — logs
    /// outlive the task they were recorded for.
    pub task_id: TaskId,
    /// Current lifecycle status.
    pub status: ProcessLogStatus,
    /// When this execution was scheduled/started.
    pub start_date: DateTime<Utc>,
    /// When this execution reached a terminal status.
    pub finish_date: Option<DateTime<Utc>>,
    /// The process's exit code, once known.
    pub return_code: Option<i32>,
}

/// Which stream an [`OutputLog`] line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStreamKind {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputStreamKind {
    /// The `is_error` column value for this stream.
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(self, Self::Stderr)
    }

    /// Recovers the stream kind from the `is_error` column value.
    #[must_use]
    pub fn from_is_error(is_error: bool) -> Self {
        if is_error {
            Self::Stderr
        } else {
            Self::Stdout
        }
    }
}

/// A persistent record of one line of a child process's stdout or stderr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLog {
    /// Primary key.
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

#[cfg(test)]
mod tests {
    use super::*;
    use pscheduler_trigger::IntervalArgs;

    fn make_task(command: &str, trigger: TriggerConfig) -> Task {
        let now = Utc::now();
        Task {
            task_id: TaskId::new(),
            title: "t".to_string(),
            descr: None,
            command: command.to_string(),
            trigger,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn semantic_equality_ignores_id_and_timestamps() {
        let trigger = TriggerConfig::Interval {
            args: IntervalArgs {
                seconds: Some(1),
                ..Default::default()
            },
        };
        let a = make_task("echo hi", trigger.clone());
        let b = make_task("echo hi", trigger);
        assert!(a.semantically_eq(&b));
        assert_ne!(a.task_id, b.task_id);
    }

    #[test]
    fn semantic_equality_detects_command_change() {
        let trigger = TriggerConfig::Interval {
            args: IntervalArgs {
                seconds: Some(1),
                ..Default::default()
            },
        };
        let a = make_task("echo a", trigger.clone());
        let b = make_task("echo b", trigger);
        assert!(!a.semantically_eq(&b));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ProcessLogStatus::Awaiting,
            ProcessLogStatus::Started,
            ProcessLogStatus::Finished,
            ProcessLogStatus::Failed,
            ProcessLogStatus::Missed,
        ] {
            let parsed: ProcessLogStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn output_stream_kind_round_trips_is_error() {
        assert_eq!(
            OutputStreamKind::from_is_error(OutputStreamKind::Stderr.is_error()),
            OutputStreamKind::Stderr
        );
        assert_eq!(
            OutputStreamKind::from_is_error(OutputStreamKind::Stdout.is_error()),
            OutputStreamKind::Stdout
        );
    }
}
