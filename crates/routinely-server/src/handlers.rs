//! REST handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use routinely_assistant::AssistantError;
use routinely_scheduler::{normalize_time, SchedulerError};
use routinely_storage::StorageError;
use routinely_types::{ChatMessage, NewTask, ParsedTask, RepeatKind, SchedulerStatus, Task, TaskPatch};

use crate::AppState;

/// JSON error envelope: `{"error": "..."}` with an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let status = match err {
            StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ─── Tasks ──────────────────────────────────────────────

/// GET /api/tasks
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.store.list_tasks().await?))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(mut new_task): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    new_task.time = normalize_time(&new_task.time)
        .map_err(|_| ApiError::bad_request(format!("Invalid time format: '{}'", new_task.time)))?;
    if new_task.title.trim().is_empty() {
        return Err(ApiError::bad_request("Task title cannot be empty"));
    }

    let task = state.store.create_task(new_task).await?;
    refresh_after_change(&state).await;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .store
        .get_task(id)
        .await?
        .ok_or(StorageError::NotFound(id))?;
    Ok(Json(task))
}

/// PUT /api/tasks/{id}
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(mut patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    if let Some(time) = &patch.time {
        let normalized = normalize_time(time)
            .map_err(|_| ApiError::bad_request(format!("Invalid time format: '{time}'")))?;
        patch.time = Some(normalized);
    }

    let task = state.store.update_task(id, patch).await?;
    refresh_after_change(&state).await;
    Ok(Json(task))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.delete_task(id).await? {
        return Err(StorageError::NotFound(id).into());
    }
    refresh_after_change(&state).await;
    Ok(Json(json!({"deleted": true})))
}

/// POST /api/tasks/{id}/complete
pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    state.store.set_completed(id, true).await?;
    refresh_after_change(&state).await;
    let task = state
        .store
        .get_task(id)
        .await?
        .ok_or(StorageError::NotFound(id))?;
    Ok(Json(task))
}

// ─── Assistant ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub text: String,
}

/// POST /api/parse: turn a natural-language command into a stored task.
pub async fn parse_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ParseRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("Text cannot be empty"));
    }

    let parsed = state.assistant.parse_task(&request.text).await;
    let task = state.store.create_task(new_task_from(&parsed)).await?;
    refresh_after_change(&state).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({"task": task, "parsed": parsed})),
    ))
}

fn new_task_from(parsed: &ParsedTask) -> NewTask {
    NewTask {
        title: parsed.title.clone(),
        time: parsed.time.clone(),
        date: parsed.date,
        repeat: RepeatKind::Once,
        priority: parsed.priority,
        category: parsed.category,
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// POST /api/chat
///
/// AI failures degrade to a friendly message in the response body rather
/// than an HTTP error; the exchange is persisted either way.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatMessage>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }

    let (total_tasks, active_tasks) = state.store.task_counts().await.unwrap_or((0, 0));
    let context = routinely_assistant::ChatContext {
        user_name: request.user_name,
        total_tasks,
        active_tasks,
    };

    let response = match state.assistant.chat(&request.message, &context).await {
        Ok(text) => text,
        Err(AssistantError::Timeout) => "AI response timed out. Please try again.".to_string(),
        Err(AssistantError::Connection) => {
            "Failed to connect to local AI. Make sure Ollama is running.".to_string()
        }
        Err(e) => {
            warn!("Chat failed: {e}");
            "Something went wrong talking to the AI. Please try again.".to_string()
        }
    };

    let saved = state.store.save_chat(&request.message, &response).await?;
    Ok(Json(saved))
}

// ─── Scheduler ──────────────────────────────────────────

/// POST /api/scheduler/start
pub async fn scheduler_start(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SchedulerStatus>, ApiError> {
    state.scheduler.start().await?;
    Ok(Json(state.scheduler.status().await))
}

/// POST /api/scheduler/stop
pub async fn scheduler_stop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SchedulerStatus>, ApiError> {
    state.scheduler.stop().await?;
    Ok(Json(state.scheduler.status().await))
}

/// POST /api/scheduler/refresh
pub async fn scheduler_refresh(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SchedulerStatus>, ApiError> {
    state.scheduler.refresh().await?;
    Ok(Json(state.scheduler.status().await))
}

/// GET /api/scheduler/status
pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

/// Rebuild the trigger set after a task mutation. Best-effort: a store
/// hiccup here must not fail the mutation that already committed.
async fn refresh_after_change(state: &AppState) {
    if let Err(e) = state.scheduler.refresh().await {
        warn!("Trigger refresh after task change failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::NaiveDate;
    use routinely_assistant::{Assistant, OllamaClient};
    use routinely_notify::{NullDesktopSink, NullSpeechSink};
    use routinely_scheduler::{Notifier, Scheduler};
    use routinely_storage::TaskStore;
    use routinely_types::{Category, Priority};

    fn test_state() -> Arc<AppState> {
        let store = Arc::new(TaskStore::open_in_memory().unwrap());
        let notifier = Arc::new(Notifier::new(
            store.clone(),
            Arc::new(NullDesktopSink),
            Arc::new(NullSpeechSink),
            1,
            Duration::ZERO,
        ));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            notifier,
            Duration::from_millis(50),
        ));
        // Nothing listens on this port; AI paths exercise their fallbacks.
        let assistant = Arc::new(Assistant::new(OllamaClient::new(
            "http://127.0.0.1:59999",
            "phi3",
        )));
        Arc::new(AppState {
            store,
            scheduler,
            assistant,
            auth_token: None,
        })
    }

    fn sample_new_task(title: &str, time: &str) -> NewTask {
        NewTask {
            title: title.into(),
            time: time.into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            repeat: RepeatKind::Daily,
            priority: Priority::Medium,
            category: Category::Other,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_tasks() {
        let state = test_state();

        let (status, Json(task)) =
            create_task(State(state.clone()), Json(sample_new_task("Gym", "6:40 pm")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task.time, "18:40");

        let Json(tasks) = list_tasks(State(state)).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Gym");
    }

    #[tokio::test]
    async fn test_create_task_invalid_time() {
        let state = test_state();
        let err = create_task(State(state), Json(sample_new_task("Gym", "25:99")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_task_empty_title() {
        let state = test_state();
        let err = create_task(State(state), Json(sample_new_task("  ", "09:00")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_task_not_found() {
        let state = test_state();
        let err = get_task(State(state), Path(999)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_task_patch() {
        let state = test_state();
        let (_, Json(task)) =
            create_task(State(state.clone()), Json(sample_new_task("Gym", "09:00")))
                .await
                .unwrap();

        let patch = TaskPatch {
            time: Some("7 30 am".into()),
            priority: Some(Priority::High),
            ..Default::default()
        };
        let Json(updated) = update_task(State(state), Path(task.id), Json(patch))
            .await
            .unwrap();
        assert_eq!(updated.time, "07:30");
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.title, "Gym");
    }

    #[tokio::test]
    async fn test_delete_task() {
        let state = test_state();
        let (_, Json(task)) =
            create_task(State(state.clone()), Json(sample_new_task("Tmp", "09:00")))
                .await
                .unwrap();

        let Json(body) = delete_task(State(state.clone()), Path(task.id))
            .await
            .unwrap();
        assert_eq!(body["deleted"], true);

        let err = delete_task(State(state), Path(task.id)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_complete_task_drops_trigger() {
        let state = test_state();
        let (_, Json(task)) =
            create_task(State(state.clone()), Json(sample_new_task("Gym", "09:00")))
                .await
                .unwrap();
        assert_eq!(state.scheduler.status().await.total_triggers, 1);

        let Json(completed) = complete_task(State(state.clone()), Path(task.id))
            .await
            .unwrap();
        assert!(completed.completed);
        assert_eq!(state.scheduler.status().await.total_triggers, 0);
    }

    #[tokio::test]
    async fn test_parse_creates_task_via_fallback() {
        let state = test_state();
        let request = ParseRequest {
            text: "Call mom at 3pm tomorrow".into(),
        };
        let (status, Json(body)) = parse_task(State(state.clone()), Json(request))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["task"]["title"], "Call mom");
        assert_eq!(body["task"]["time"], "15:00");
        assert_eq!(body["parsed"]["category"], "personal");

        let Json(tasks) = list_tasks(State(state)).await.unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_parse_empty_text_rejected() {
        let state = test_state();
        let err = parse_task(State(state), Json(ParseRequest { text: "  ".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_unreachable_ai_degrades_and_persists() {
        let state = test_state();
        let request = ChatRequest {
            message: "plan my day".into(),
            user_name: None,
        };
        let Json(saved) = chat(State(state.clone()), Json(request)).await.unwrap();
        assert!(
            saved.response.contains("Ollama") || saved.response.contains("timed out"),
            "unexpected response: {}",
            saved.response
        );

        let chats = state.store.list_chats(10).await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].message, "plan my day");
    }

    #[tokio::test]
    async fn test_scheduler_lifecycle_endpoints() {
        let state = test_state();

        let Json(status) = scheduler_start(State(state.clone())).await.unwrap();
        assert!(status.running);

        let Json(status) = scheduler_status(State(state.clone())).await;
        assert!(status.running);

        let Json(status) = scheduler_stop(State(state)).await.unwrap();
        assert!(!status.running);
        assert_eq!(status.total_triggers, 0);
    }
}
