use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Todos {
    Table,
    Id,
    Task,
    Description,
    Completed,
    Priority,
    Category,
    DueDate,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
    DisplayOrder,
    Tags,
}

/// Wide enough for the longest symbolic enum name (`EDUCATION`).
const ENUM_NAME_LEN: u32 = 16;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Todos::Table)
                    .if_not_exists()
                    .col(pk_auto(Todos::Id))
                    .col(string(Todos::Task))
                    .col(text_null(Todos::Description))
                    .col(boolean(Todos::Completed).default(false))
                    .col(string_len(Todos::Priority, ENUM_NAME_LEN).default("MEDIUM"))
                    .col(string_len(Todos::Category, ENUM_NAME_LEN).default("PERSONAL"))
                    .col(timestamp_with_time_zone_null(Todos::DueDate))
                    .col(
                        timestamp_with_time_zone(Todos::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Todos::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Todos::CompletedAt))
                    .col(integer(Todos::DisplayOrder).default(0))
                    .col(string_null(Todos::Tags))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Todos::Table).to_owned())
            .await
    }
}
