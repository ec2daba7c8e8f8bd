use crate::notify::{ApiAction, ApiEvent, NotificationSink, ResourceType};
use crate::participant::Participant;
use crate::task::{PopulatedTask, TaskDraft, TaskService, TaskServiceError};
use crate::user::User;
use crate::web::api::v1::{ApiError, ErrorResponse};
use axum::{
    Extension, Router,
    body::Bytes,
    extract::{Path, State},
    response::Json,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Shared state of the task handlers.
#[derive(Clone)]
pub struct TaskState {
    pub service: TaskService,
    pub notifier: Arc<dyn NotificationSink>,
}

impl TaskState {
    /// Publishes a change made by `actor`. Failing to encode the task only
    /// costs the notification.
    fn publish(&self, action: ApiAction, actor: &User, task: &TaskJson) {
        match serde_json::to_value(task) {
            Ok(resource) => self.notifier.emit(ApiEvent::new(
                action,
                ResourceType::Task,
                resource,
                actor.id(),
            )),
            Err(err) => tracing::error!("Failed to encode task {} for notification: {}", task.id, err),
        }
    }
}

/// JSON representation of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserJson {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
}

impl From<&User> for UserJson {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            username: user.username().to_string(),
            display_name: user.display_name().to_string(),
        }
    }
}

/// JSON representation of a task participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ParticipantJson {
    /// ID of the participant record, not of the user
    pub id: Uuid,
    /// Project the participant belongs to
    pub project: Uuid,
    pub active: bool,
    pub user: UserJson,
}

/// JSON representation of a task with creator and participants resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskJson {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub project: Uuid,
    pub creator: UserJson,
    /// Participants in the order they were added
    pub participants: Vec<ParticipantJson>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&PopulatedTask> for TaskJson {
    fn from(populated: &PopulatedTask) -> Self {
        let task = populated.task();
        Self {
            id: task.id(),
            title: task.title().to_string(),
            description: task.description().map(str::to_string),
            start: task.schedule().map(|schedule| schedule.start()),
            end: task.schedule().map(|schedule| schedule.end()),
            project: task.project_id(),
            creator: UserJson::from(populated.creator()),
            participants: populated
                .participants()
                .iter()
                .map(|assigned| ParticipantJson {
                    id: assigned.participant().id(),
                    project: assigned.participant().project_id(),
                    active: assigned.participant().is_active(),
                    user: UserJson::from(assigned.user()),
                })
                .collect(),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
        }
    }
}

/// API response carrying a single task.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskResponse {
    pub data: TaskJson,
}

/// API response carrying the tasks of a project.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskListResponse {
    pub data: Vec<TaskJson>,
}

impl From<TaskServiceError> for ApiError {
    fn from(err: TaskServiceError) -> Self {
        match err {
            TaskServiceError::MissingTitle => ApiError::RequiredParameterMissing,
            TaskServiceError::EitherBothDatesOrNone => ApiError::EitherBothDatesOrNone,
            TaskServiceError::InvalidDate(_) => ApiError::InvalidDate,
            TaskServiceError::EndDateBeforeStart => ApiError::EndDateBeforeStart,
            TaskServiceError::TaskNotFound(_) | TaskServiceError::ParticipantNotFound(_) => {
                ApiError::NotFound
            }
            TaskServiceError::WrongProject { .. } => ApiError::PermissionError,
            TaskServiceError::AlreadyParticipant(_) => ApiError::AlreadyIsAParticipant,
            TaskServiceError::CreationFailed(err) => {
                tracing::error!("Failed to create task: {}", err);
                ApiError::CreationFailed
            }
            TaskServiceError::Store(err) => {
                tracing::error!("Task storage failed: {}", err);
                ApiError::InternalServerError
            }
        }
    }
}

/// Reads a create or update body. An empty body is an empty draft, which
/// then fails title validation. Only a JSON object is a draft.
fn parse_draft(body: &[u8]) -> Result<TaskDraft, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TaskDraft::default());
    }
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|err| {
        tracing::debug!("Rejected task body: {}", err);
        ApiError::InvalidRequestBody
    })?;
    if !value.is_object() {
        tracing::debug!("Rejected task body that is not an object");
        return Err(ApiError::InvalidRequestBody);
    }
    serde_json::from_value(value).map_err(|err| {
        tracing::debug!("Rejected task body: {}", err);
        ApiError::InvalidRequestBody
    })
}

/// IDs that do not parse cannot name an existing record.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

/// Handler for GET /api/v1/projects/{project}/tasks
#[tracing::instrument(skip(state, participant), fields(project = %participant.project_id()))]
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project}/tasks",
    params(("project" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Tasks of the project, oldest first", body = TaskListResponse),
        (status = 401, description = "Missing or invalid token, or unknown user", body = ErrorResponse),
        (status = 403, description = "Caller is not an active participant", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Extension(participant): Extension<Participant>,
) -> Result<Json<TaskListResponse>, ApiError> {
    let tasks = state.service.list_tasks(participant.project_id()).await?;
    Ok(Json(TaskListResponse {
        data: tasks.iter().map(TaskJson::from).collect(),
    }))
}

/// Handler for POST /api/v1/projects/{project}/tasks
#[tracing::instrument(skip_all, fields(project = %participant.project_id(), user = %user.id()))]
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project}/tasks",
    params(("project" = Uuid, Path, description = "Project ID")),
    request_body = TaskDraft,
    responses(
        (status = 200, description = "Task created", body = TaskResponse),
        (status = 400, description = "Invalid task", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token, or unknown user", body = ErrorResponse),
        (status = 403, description = "Caller is not an active participant", body = ErrorResponse),
        (status = 500, description = "Task could not be created", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<User>,
    Extension(participant): Extension<Participant>,
    body: Bytes,
) -> Result<Json<TaskResponse>, ApiError> {
    let draft = parse_draft(&body)?;
    let task = state
        .service
        .create_task(participant.project_id(), &user, draft)
        .await?;

    let data = TaskJson::from(&task);
    state.publish(ApiAction::Create, &user, &data);
    Ok(Json(TaskResponse { data }))
}

/// Handler for PUT /api/v1/projects/{project}/tasks/{task}
#[tracing::instrument(skip_all, fields(project = %participant.project_id(), task = %task))]
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project}/tasks/{task}",
    params(
        ("project" = Uuid, Path, description = "Project ID"),
        ("task" = Uuid, Path, description = "Task ID")
    ),
    request_body = TaskDraft,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 400, description = "Invalid task", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token, or unknown user", body = ErrorResponse),
        (status = 403, description = "Caller or task is outside the project", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<User>,
    Extension(participant): Extension<Participant>,
    Path((_project, task)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<TaskResponse>, ApiError> {
    let task_id = parse_id(&task)?;
    let draft = parse_draft(&body)?;
    let task = state
        .service
        .update_task(participant.project_id(), task_id, draft)
        .await?;

    let data = TaskJson::from(&task);
    state.publish(ApiAction::Update, &user, &data);
    Ok(Json(TaskResponse { data }))
}

/// Handler for POST /api/v1/projects/{project}/tasks/{task}/participants/{participant}
#[tracing::instrument(
    skip_all,
    fields(project = %caller.project_id(), task = %task, participant = %participant)
)]
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project}/tasks/{task}/participants/{participant}",
    params(
        ("project" = Uuid, Path, description = "Project ID"),
        ("task" = Uuid, Path, description = "Task ID"),
        ("participant" = Uuid, Path, description = "ID of a participant of the same project")
    ),
    responses(
        (status = 200, description = "Participant added", body = TaskResponse),
        (status = 401, description = "Missing or invalid token, or unknown user", body = ErrorResponse),
        (status = 403, description = "Caller or task is outside the project", body = ErrorResponse),
        (status = 404, description = "Task or participant not found", body = ErrorResponse),
        (status = 409, description = "Participant already assigned", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn add_participant_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<User>,
    Extension(caller): Extension<Participant>,
    Path((_project, task, participant)): Path<(String, String, String)>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task_id = parse_id(&task)?;
    let participant_id = parse_id(&participant)?;
    let task = state
        .service
        .add_participant(caller.project_id(), task_id, participant_id)
        .await?;

    let data = TaskJson::from(&task);
    state.publish(ApiAction::Update, &user, &data);
    Ok(Json(TaskResponse { data }))
}

/// Handler for DELETE /api/v1/projects/{project}/tasks/{task}
#[tracing::instrument(skip_all, fields(project = %participant.project_id(), task = %task))]
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project}/tasks/{task}",
    params(
        ("project" = Uuid, Path, description = "Project ID"),
        ("task" = Uuid, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task deleted, returned as it was before removal", body = TaskResponse),
        (status = 401, description = "Missing or invalid token, or unknown user", body = ErrorResponse),
        (status = 403, description = "Caller or task is outside the project", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<User>,
    Extension(participant): Extension<Participant>,
    Path((_project, task)): Path<(String, String)>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task_id = parse_id(&task)?;
    let snapshot = state
        .service
        .delete_task(participant.project_id(), task_id)
        .await?;

    let data = TaskJson::from(&snapshot);
    state.publish(ApiAction::Delete, &user, &data);
    Ok(Json(TaskResponse { data }))
}

/// Creates the task routes. Every route expects the guard chain to have put
/// the caller's [`User`] and [`Participant`] into the request extensions.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route(
            "/projects/{project}/tasks",
            get(list_tasks_handler).post(create_task_handler),
        )
        .route(
            "/projects/{project}/tasks/{task}",
            put(update_task_handler).delete(delete_task_handler),
        )
        .route(
            "/projects/{project}/tasks/{task}/participants/{participant}",
            post(add_participant_handler),
        )
        .with_state(state)
}
