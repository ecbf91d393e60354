#![allow(dead_code)]

use chrono::Utc;
use migration::MigratorTrait;
use sea_orm::{ActiveValue, ConnectOptions, Database, DatabaseConnection};
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::{postgres, testcontainers};
use todo_server::entities::todo::{self, Category, Priority};
use todo_server::todo::TodoRepository;

/// Opens a private in-memory SQLite database with migrations applied.
pub async fn setup_db() -> anyhow::Result<DatabaseConnection> {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().try_init();
    let mut options = ConnectOptions::new("sqlite::memory:");
    // Every pooled connection would get its own in-memory database.
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn setup_container() -> anyhow::Result<testcontainers::ContainerAsync<postgres::Postgres>>
{
    let container = postgres::Postgres::default().start().await?;
    Ok(container)
}

pub async fn setup_postgres_db(
    container: &testcontainers::ContainerAsync<postgres::Postgres>,
) -> anyhow::Result<DatabaseConnection> {
    let _ = tracing_subscriber::fmt().try_init();
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let db_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
    let db = Database::connect(&db_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// An unsaved todo with every required column filled in.
pub fn new_todo(task: &str) -> todo::ActiveModel {
    let now = Utc::now();
    todo::ActiveModel {
        task: ActiveValue::Set(task.to_string()),
        completed: ActiveValue::Set(false),
        priority: ActiveValue::Set(Priority::Medium),
        category: ActiveValue::Set(Category::Personal),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
        display_order: ActiveValue::Set(0),
        ..Default::default()
    }
}

/// Stores a todo through the repository so lifecycle stamping applies.
pub async fn seed(db: &DatabaseConnection, active_model: todo::ActiveModel) -> todo::Model {
    TodoRepository::new(db)
        .save(active_model)
        .await
        .expect("Failed to seed todo")
}
