//! The HTTP control plane: thin handlers over the store adapter and the
//! execution manager. Every mutating `/task` handler commits its store
//! change first, then calls `manager.sync()`.

use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use pscheduler_core::{OutputLogId, ProcessLogId, TaskId};
use pscheduler_manager::{ExecutorSnapshot, Manager};
use pscheduler_store::{OutputLog, ProcessLog, ProcessLogStatus, Store, Task, TaskDraft};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The persistent store adapter.
    pub store: Store,
    /// The process-wide executor registry.
    pub manager: Arc<Manager>,
}

/// Builds the task scheduler's HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/task", get(list_tasks).post(create_task))
        .route(
            "/task/{id}",
            get(get_task).post(update_task).delete(delete_task),
        )
        .route("/executor", get(list_executors))
        .route("/executor/{id}", get(get_executor))
        .route("/run_executor/{id}", post(run_executor))
        .route("/stop_executor/{id}", post(stop_executor))
        .route("/process_log", get(list_process_logs))
        .route("/execution/output/{process_log_id}", get(execution_output))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    TaskId::from_str(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

fn parse_process_log_id(raw: &str) -> Result<ProcessLogId, ApiError> {
    ProcessLogId::from_str(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

fn parse_output_log_id(raw: &str) -> Result<OutputLogId, ApiError> {
    OutputLogId::from_str(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// The body accepted by `POST /task` and `POST /task/{id}`.
///
/// `trigger_args` is accepted either as a bare JSON string (cron
/// expression, ISO-8601 date) or as a JSON object (interval fields);
/// either form is flattened to the text payload the store adapter expects.
#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    title: String,
    #[serde(default)]
    descr: Option<String>,
    command: String,
    trigger_type: String,
    trigger_args: serde_json::Value,
}

impl TaskRequest {
    fn into_draft(self) -> TaskDraft {
        let trigger_args = match self.trigger_args {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        TaskDraft {
            title: self.title,
            descr: self.descr,
            command: self.command,
            trigger_type: self.trigger_type,
            trigger_args,
        }
    }
}

#[derive(Serialize)]
struct TaskListResponse {
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct TaskResponse {
    task: Task,
}

#[derive(Serialize)]
struct CreatedResponse {
    task_id: TaskId,
}

#[derive(Serialize)]
struct TaskIdResponse {
    task_id: TaskId,
}

#[derive(Serialize)]
struct ExecutorView {
    task: Task,
    active: bool,
    status: String,
}

#[derive(Serialize)]
struct ExecutorListResponse {
    task_executors: Vec<ExecutorView>,
}

#[derive(Serialize)]
struct ExecutorResponse {
    task_executor: ExecutorView,
}

impl From<ExecutorSnapshot> for ExecutorView {
    fn from(snapshot: ExecutorSnapshot) -> Self {
        Self {
            task: snapshot.task,
            active: snapshot.active,
            status: snapshot.status.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ProcessLogListResponse {
    process_logs: Vec<ProcessLog>,
}

#[derive(Deserialize)]
struct OutputQuery {
    last_output_log_id: Option<String>,
}

#[derive(Serialize)]
struct OutputResponse {
    output_logs: Vec<OutputLog>,
    last_output_log_id: Option<OutputLogId>,
    status: ProcessLogStatus,
    return_code: Option<i32>,
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<TaskListResponse>, ApiError> {
    let tasks = state.store.list_tasks().await?;
    Ok(Json(TaskListResponse { tasks }))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let task = state.store.get_task(id).await?;
    Ok(Json(TaskResponse { task }))
}

async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<TaskRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let task = state.store.insert_task(body.into_draft()).await?;
    state.manager.sync().await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { task_id: task.task_id })))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TaskRequest>,
) -> Result<StatusCode, ApiError> {
    let id = parse_task_id(&id)?;
    state.store.update_task(id, body.into_draft()).await?;
    state.manager.sync().await?;
    Ok(StatusCode::OK)
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_task_id(&id)?;
    state.store.delete_task(id).await?;
    state.manager.sync().await?;
    Ok(StatusCode::OK)
}

async fn list_executors(State(state): State<AppState>) -> Json<ExecutorListResponse> {
    let task_executors = state.manager.list().await.into_iter().map(Into::into).collect();
    Json(ExecutorListResponse { task_executors })
}

/// `GET /executor/{id}`: looks up a single executor snapshot by task id.
///
/// Not part of the documented control-plane surface, but kept for
/// symmetry with `GET /task/{id}`.
async fn get_executor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExecutorResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let snapshot = state
        .manager
        .list()
        .await
        .into_iter()
        .find(|snapshot| snapshot.task.task_id == id)
        .ok_or_else(|| ApiError::not_found(format!("executor not found for task {id}")))?;
    Ok(Json(ExecutorResponse {
        task_executor: snapshot.into(),
    }))
}

async fn run_executor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskIdResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    state.manager.run_task(id).await?;
    Ok(Json(TaskIdResponse { task_id: id }))
}

async fn stop_executor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskIdResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    state.manager.stop_task(id).await?;
    Ok(Json(TaskIdResponse { task_id: id }))
}

async fn list_process_logs(
    State(state): State<AppState>,
) -> Result<Json<ProcessLogListResponse>, ApiError> {
    let process_logs = state.store.list_process_logs().await?;
    Ok(Json(ProcessLogListResponse { process_logs }))
}

async fn execution_output(
    State(state): State<AppState>,
    Path(process_log_id): Path<String>,
    Query(query): Query<OutputQuery>,
) -> Result<Json<OutputResponse>, ApiError> {
    let process_log_id = parse_process_log_id(&process_log_id)?;
    let after = query
        .last_output_log_id
        .map(|raw| parse_output_log_id(&raw))
        .transpose()?;

    let log = state.store.get_process_log(process_log_id).await?;
    let output_logs = state.store.list_output_logs(process_log_id, after).await?;
    let last_output_log_id = output_logs.last().map(|line| line.output_log_id).or(after);

    Ok(Json(OutputResponse {
        output_logs,
        last_output_log_id,
        status: log.status,
        return_code: log.return_code,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_request_flattens_string_trigger_args() {
        let request = TaskRequest {
            title: "t".to_string(),
            descr: None,
            command: "echo hi".to_string(),
            trigger_type: "cron".to_string(),
            trigger_args: serde_json::Value::String("0 7 * * *".to_string()),
        };
        let draft = request.into_draft();
        assert_eq!(draft.trigger_args, "0 7 * * *");
    }

    #[test]
    fn task_request_flattens_object_trigger_args() {
        let request = TaskRequest {
            title: "t".to_string(),
            descr: None,
            command: "echo hi".to_string(),
            trigger_type: "interval".to_string(),
            trigger_args: serde_json::json!({"seconds": 1}),
        };
        let draft = request.into_draft();
        let parsed: serde_json::Value = serde_json::from_str(&draft.trigger_args).unwrap();
        assert_eq!(parsed["seconds"], 1);
    }
}
