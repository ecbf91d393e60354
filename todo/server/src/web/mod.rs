use axum::Router;
use axum::http::{HeaderValue, Method, header};
use migration::MigratorTrait;
use sea_orm::Database;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{self, Config};
use crate::todo::api::TodoState;

pub mod api;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<sea_orm::DatabaseConnection>,
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: config::Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let state = AppState {
        config: Arc::new(config),
        db: Arc::new(db),
    };
    let app = create_app(state)?;

    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the full application router with tracing and CORS layers.
pub fn create_app(state: AppState) -> anyhow::Result<Router> {
    let allowed_origin = HeaderValue::from_str(&state.config.allowed_origin)?;
    let todo_state = TodoState {
        db: state.db.clone(),
    };

    let app = Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .merge(api::create_api_router(todo_state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(allowed_origin)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::PATCH,
                            Method::DELETE,
                        ])
                        .allow_headers([header::CONTENT_TYPE]),
                ),
        );
    Ok(app)
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}
