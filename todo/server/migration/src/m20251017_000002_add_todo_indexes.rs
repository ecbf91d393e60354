use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const IDX_DISPLAY_ORDER: &str = "idx_todos_display_order";
const IDX_COMPLETED: &str = "idx_todos_completed";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name(IDX_DISPLAY_ORDER)
                    .table(Todos::Table)
                    .col(Todos::DisplayOrder)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_COMPLETED)
                    .table(Todos::Table)
                    .col(Todos::Completed)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_COMPLETED)
                    .table(Todos::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name(IDX_DISPLAY_ORDER)
                    .table(Todos::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Todos {
    Table,
    DisplayOrder,
    Completed,
}
