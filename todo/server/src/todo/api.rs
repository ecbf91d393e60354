use crate::entities::todo::{Category, Priority};
use crate::todo::{Statistics, Todo, TodoDraft, TodoFilter, TodoService, TodoServiceError};
use crate::web::api::ErrorResponse;
use axum::{
    Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::ActiveEnum;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug)]
pub struct TodoState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

/// JSON representation of a Todo for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoJson {
    /// Unique identifier, assigned on creation
    id: i32,
    /// Short summary of what needs doing
    task: String,
    description: Option<String>,
    completed: bool,
    priority: Priority,
    category: Category,
    due_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Set while the todo is completed, null otherwise
    completed_at: Option<DateTime<Utc>>,
    /// Position in the user's manual ordering
    display_order: i32,
    /// Free-form tags
    tags: Option<String>,
}

impl From<Todo> for TodoJson {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id,
            task: todo.task,
            description: todo.description,
            completed: todo.completed,
            priority: todo.priority,
            category: todo.category,
            due_date: todo.due_date,
            created_at: todo.created_at,
            updated_at: todo.updated_at,
            completed_at: todo.completed_at,
            display_order: todo.display_order,
            tags: todo.tags,
        }
    }
}

/// Request body for creating or replacing a todo.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoRequest {
    /// Required, must not be blank
    #[serde(default)]
    task: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    category: Category,
    /// RFC 3339, or a local timestamp without offset which is read as UTC
    #[serde(default, deserialize_with = "deserialize_due_date")]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Option<String>,
    /// Omit to append on create, or to keep the current position on update
    #[serde(default)]
    display_order: Option<i32>,
}

impl From<TodoRequest> for TodoDraft {
    fn from(request: TodoRequest) -> Self {
        Self {
            task: request.task,
            description: request.description,
            completed: request.completed,
            priority: request.priority,
            category: request.category,
            due_date: request.due_date,
            tags: request.tags,
            display_order: request.display_order,
        }
    }
}

/// Query parameters for listing todos. Only one filter is applied, see
/// [`TodoFilter::resolve`].
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TodoQuery {
    /// Completion state to match
    completed: Option<bool>,
    /// Priority to match
    priority: Option<Priority>,
    /// Category to match
    category: Option<Category>,
    /// Case-insensitive text to find in task or description; overrides every other filter
    search: Option<String>,
}

/// One entry of a reorder request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderEntry {
    id: i32,
}

/// JSON representation of todo statistics.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsJson {
    total: u64,
    completed: u64,
    pending: u64,
    /// Pending todos whose due date has passed
    overdue: u64,
    by_priority: BTreeMap<String, u64>,
    by_category: BTreeMap<String, u64>,
}

impl From<Statistics> for StatisticsJson {
    fn from(statistics: Statistics) -> Self {
        Self {
            total: statistics.total,
            completed: statistics.completed,
            pending: statistics.pending,
            overdue: statistics.overdue,
            by_priority: statistics
                .by_priority
                .into_iter()
                .map(|(priority, count)| (priority.to_value(), count))
                .collect(),
            by_category: statistics
                .by_category
                .into_iter()
                .map(|(category, count)| (category.to_value(), count))
                .collect(),
        }
    }
}

/// Custom error type for the todo API handlers.
///
/// Extractor rejections are folded in here so malformed input gets the same
/// JSON error body as a failed validation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] TodoServiceError),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error(transparent)]
    Query(#[from] QueryRejection),
    #[error(transparent)]
    Path(#[from] PathRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_response) = match &self {
            ApiError::Service(TodoServiceError::TodoNotFound(_)) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("NOT_FOUND", self.to_string()),
            ),
            ApiError::Service(TodoServiceError::Validation(message)) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_FAILED", message.clone()),
            ),
            ApiError::Service(TodoServiceError::Database(err)) => {
                tracing::error!("Database error while handling todo request: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "INTERNAL_ERROR",
                        "An unexpected error occurred while processing your request. Please try again later.",
                    ),
                )
            }
            ApiError::Json(rejection) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_FAILED", rejection.body_text()),
            ),
            ApiError::Query(rejection) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_FAILED", rejection.body_text()),
            ),
            ApiError::Path(rejection) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_FAILED", rejection.body_text()),
            ),
        };
        (status_code, Json(error_response)).into_response()
    }
}

/// Handler for GET /api/todos - Lists todos, optionally filtered.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/todos",
    params(TodoQuery),
    responses(
        (status = 200, description = "Todos matching the filter", body = Vec<TodoJson>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn list_todos_handler(
    State(state): State<TodoState>,
    query: Result<Query<TodoQuery>, QueryRejection>,
) -> Result<Json<Vec<TodoJson>>, ApiError> {
    let Query(query) = query?;
    let filter = TodoFilter::resolve(query.completed, query.priority, query.category, query.search);
    let todos = TodoService::new(&state.db).list_todos(filter).await?;
    Ok(Json(todos.into_iter().map(TodoJson::from).collect()))
}

/// Handler for GET /api/todos/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/todos/{id}",
    params(("id" = i32, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "The todo", body = TodoJson),
        (status = 404, description = "No todo with this ID", body = ErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn get_todo_handler(
    State(state): State<TodoState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<TodoJson>, ApiError> {
    let Path(id) = id?;
    let todo = TodoService::new(&state.db).get_todo_by_id(id).await?;
    Ok(Json(TodoJson::from(todo)))
}

/// Handler for POST /api/todos.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/todos",
    request_body = TodoRequest,
    responses(
        (status = 201, description = "Todo created", body = TodoJson),
        (status = 400, description = "Invalid todo", body = ErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn create_todo_handler(
    State(state): State<TodoState>,
    request: Result<Json<TodoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TodoJson>), ApiError> {
    let Json(request) = request?;
    let todo = TodoService::new(&state.db)
        .create_todo(TodoDraft::from(request))
        .await?;
    Ok((StatusCode::CREATED, Json(TodoJson::from(todo))))
}

/// Handler for PUT /api/todos/{id} - Replaces every mutable field.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/api/todos/{id}",
    params(("id" = i32, Path, description = "Todo ID")),
    request_body = TodoRequest,
    responses(
        (status = 200, description = "Todo updated", body = TodoJson),
        (status = 400, description = "Invalid todo", body = ErrorResponse),
        (status = 404, description = "No todo with this ID", body = ErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn update_todo_handler(
    State(state): State<TodoState>,
    id: Result<Path<i32>, PathRejection>,
    request: Result<Json<TodoRequest>, JsonRejection>,
) -> Result<Json<TodoJson>, ApiError> {
    let Path(id) = id?;
    let Json(request) = request?;
    let todo = TodoService::new(&state.db)
        .update_todo_by_id(id, TodoDraft::from(request))
        .await?;
    Ok(Json(TodoJson::from(todo)))
}

/// Handler for PATCH /api/todos/{id}/toggle.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    patch,
    path = "/api/todos/{id}/toggle",
    params(("id" = i32, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Completion flipped", body = TodoJson),
        (status = 404, description = "No todo with this ID", body = ErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn toggle_todo_handler(
    State(state): State<TodoState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<TodoJson>, ApiError> {
    let Path(id) = id?;
    let todo = TodoService::new(&state.db).toggle_todo_by_id(id).await?;
    Ok(Json(TodoJson::from(todo)))
}

/// Handler for PATCH /api/todos/reorder - Positions todos in list order.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    patch,
    path = "/api/todos/reorder",
    request_body = Vec<ReorderEntry>,
    responses(
        (status = 200, description = "Todos reordered; unknown IDs are skipped")
    ),
    tag = "Todos"
)]
pub async fn reorder_todos_handler(
    State(state): State<TodoState>,
    entries: Result<Json<Vec<ReorderEntry>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(entries) = entries?;
    let ids: Vec<i32> = entries.iter().map(|entry| entry.id).collect();
    TodoService::new(&state.db).reorder_todos(&ids).await?;
    Ok(StatusCode::OK)
}

/// Handler for DELETE /api/todos/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/todos/{id}",
    params(("id" = i32, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Todo deleted"),
        (status = 404, description = "No todo with this ID", body = ErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn delete_todo_handler(
    State(state): State<TodoState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    TodoService::new(&state.db).delete_todo_by_id(id).await?;
    Ok(StatusCode::OK)
}

/// Handler for DELETE /api/todos/completed.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/todos/completed",
    responses(
        (status = 200, description = "Completed todos deleted")
    ),
    tag = "Todos"
)]
pub async fn delete_completed_todos_handler(
    State(state): State<TodoState>,
) -> Result<StatusCode, ApiError> {
    TodoService::new(&state.db).delete_completed_todos().await?;
    Ok(StatusCode::OK)
}

/// Handler for GET /api/todos/statistics.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/todos/statistics",
    responses(
        (status = 200, description = "Aggregate counts", body = StatisticsJson)
    ),
    tag = "Todos"
)]
pub async fn statistics_handler(
    State(state): State<TodoState>,
) -> Result<Json<StatisticsJson>, ApiError> {
    let statistics = TodoService::new(&state.db).get_statistics().await?;
    Ok(Json(StatisticsJson::from(statistics)))
}

/// Creates and returns the todos API router.
pub fn create_api_router(state: TodoState) -> Router {
    Router::new()
        .route("/todos", get(list_todos_handler).post(create_todo_handler))
        .route("/todos/statistics", get(statistics_handler))
        .route("/todos/completed", delete(delete_completed_todos_handler))
        .route("/todos/reorder", patch(reorder_todos_handler))
        .route(
            "/todos/{id}",
            get(get_todo_handler)
                .put(update_todo_handler)
                .delete(delete_todo_handler),
        )
        .route("/todos/{id}/toggle", patch(toggle_todo_handler))
        .with_state(state)
}

fn deserialize_due_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.filter(|text| !text.is_empty())
        .map(|text| parse_due_date(&text).map_err(serde::de::Error::custom))
        .transpose()
}

/// Parses an RFC 3339 timestamp, or a local one without offset taken as UTC.
fn parse_due_date(text: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Ok(date_time.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid due date '{}'", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn can_parse_rfc3339_due_date() {
        let parsed = parse_due_date("2025-03-01T09:30:00+02:00").unwrap();

        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 7, 30, 0).unwrap());
    }

    #[test]
    fn can_parse_local_due_date_as_utc() {
        let parsed = parse_due_date("2025-03-01T09:30:00").unwrap();

        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn can_reject_malformed_due_date() {
        assert!(parse_due_date("next tuesday").is_err());
    }

    #[test]
    fn can_default_missing_request_fields() {
        let request: TodoRequest = serde_json::from_str(r#"{"task": "Buy milk"}"#).unwrap();
        let draft = TodoDraft::from(request);

        assert_eq!(draft, TodoDraft::new("Buy milk"));
    }

    #[test]
    fn can_read_camel_case_request_fields() {
        let request: TodoRequest = serde_json::from_str(
            r#"{"task": "Dentist", "priority": "URGENT", "category": "HEALTH",
                "dueDate": "2025-03-01T09:30", "displayOrder": 4, "completed": true}"#,
        )
        .unwrap();
        let draft = TodoDraft::from(request);

        assert_eq!(draft.priority, Priority::Urgent);
        assert_eq!(draft.category, Category::Health);
        assert_eq!(
            draft.due_date,
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap())
        );
        assert_eq!(draft.display_order, Some(4));
        assert!(draft.completed);
    }

    #[tokio::test]
    async fn can_map_not_found_to_404() {
        let response = ApiError::from(TodoServiceError::TodoNotFound(42)).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "NOT_FOUND");
        assert_eq!(json["message"], "Todo with ID 42 not found");
    }

    #[tokio::test]
    async fn can_map_validation_failure_to_400() {
        let response =
            ApiError::from(TodoServiceError::Validation("task must not be empty".to_string()))
                .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "VALIDATION_FAILED");
        assert_eq!(json["message"], "task must not be empty");
    }

    #[tokio::test]
    async fn can_hide_database_details_behind_500() {
        let response = ApiError::from(TodoServiceError::Database(sea_orm::DbErr::Custom(
            "connection reset".to_string(),
        )))
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_text = std::str::from_utf8(&body).unwrap();
        assert!(!body_text.contains("connection reset"));
        assert!(body_text.contains("INTERNAL_ERROR"));
    }
}
