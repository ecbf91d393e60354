use crate::todo::api::{self as todo_api, TodoState};
use axum::Router;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// JSON response for API errors
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code, e.g. `NOT_FOUND`
    pub error: String,
    /// Human-readable explanation
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        todo_api::list_todos_handler,
        todo_api::get_todo_handler,
        todo_api::create_todo_handler,
        todo_api::update_todo_handler,
        todo_api::toggle_todo_handler,
        todo_api::reorder_todos_handler,
        todo_api::delete_todo_handler,
        todo_api::delete_completed_todos_handler,
        todo_api::statistics_handler,
    ),
    components(schemas(
        todo_api::TodoJson,
        todo_api::TodoRequest,
        todo_api::ReorderEntry,
        todo_api::StatisticsJson,
        ErrorResponse,
    )),
    tags((name = "Todos", description = "Todo management"))
)]
pub struct ApiDoc;

/// Creates the API routes for JSON API endpoints, plus the OpenAPI document
/// and Swagger UI that describe them.
pub fn create_api_router(todo_state: TodoState) -> Router {
    Router::new()
        .nest("/api", todo_api::create_api_router(todo_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
