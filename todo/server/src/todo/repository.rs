use crate::entities::todo::{self, Category, Priority};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::*;

/// Relational store for todo rows.
///
/// Works over anything that can run statements, so the same queries serve a
/// plain connection and an open transaction.
pub struct TodoRepository<'a, C: ConnectionTrait = DatabaseConnection> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TodoRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Retrieves every row in primary key order.
    #[tracing::instrument(skip(self))]
    pub async fn find_all(&self) -> Result<Vec<todo::Model>, DbErr> {
        todo::Entity::find()
            .order_by_asc(todo::Column::Id)
            .all(self.db)
            .await
    }

    /// Retrieves every row by ascending display order, ties broken by id.
    #[tracing::instrument(skip(self))]
    pub async fn find_all_ordered_by_display_order(&self) -> Result<Vec<todo::Model>, DbErr> {
        todo::Entity::find()
            .order_by_asc(todo::Column::DisplayOrder)
            .order_by_asc(todo::Column::Id)
            .all(self.db)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: i32) -> Result<Option<todo::Model>, DbErr> {
        todo::Entity::find_by_id(id).one(self.db).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_completed(&self, completed: bool) -> Result<Vec<todo::Model>, DbErr> {
        self.find_matching(Condition::all().add(todo::Column::Completed.eq(completed)))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_priority(&self, priority: Priority) -> Result<Vec<todo::Model>, DbErr> {
        self.find_matching(Condition::all().add(todo::Column::Priority.eq(priority)))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_category(&self, category: Category) -> Result<Vec<todo::Model>, DbErr> {
        self.find_matching(Condition::all().add(todo::Column::Category.eq(category)))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_completed_and_priority(
        &self,
        completed: bool,
        priority: Priority,
    ) -> Result<Vec<todo::Model>, DbErr> {
        self.find_matching(
            Condition::all()
                .add(todo::Column::Completed.eq(completed))
                .add(todo::Column::Priority.eq(priority)),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_completed_and_category(
        &self,
        completed: bool,
        category: Category,
    ) -> Result<Vec<todo::Model>, DbErr> {
        self.find_matching(
            Condition::all()
                .add(todo::Column::Completed.eq(completed))
                .add(todo::Column::Category.eq(category)),
        )
        .await
    }

    /// Finds rows whose task or description contains `text`, ignoring case.
    ///
    /// Case folding of the columns is done by the engine's `LOWER()`.
    /// PostgreSQL folds all of Unicode, SQLite only folds ASCII letters.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, text: &str) -> Result<Vec<todo::Model>, DbErr> {
        let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
        self.find_matching(
            Condition::any()
                .add(
                    Expr::expr(Func::lower(Expr::col(todo::Column::Task)))
                        .like(LikeExpr::new(pattern.clone()).escape('\\')),
                )
                .add(
                    Expr::expr(Func::lower(Expr::col(todo::Column::Description)))
                        .like(LikeExpr::new(pattern).escape('\\')),
                ),
        )
        .await
    }

    /// Returns the largest display order, or `None` when the table is empty.
    #[tracing::instrument(skip(self))]
    pub async fn find_max_display_order(&self) -> Result<Option<i32>, DbErr> {
        let max = todo::Entity::find()
            .select_only()
            .column_as(todo::Column::DisplayOrder.max(), "max_display_order")
            .into_tuple::<Option<i32>>()
            .one(self.db)
            .await?;
        Ok(max.flatten())
    }

    #[tracing::instrument(skip(self))]
    pub async fn count(&self) -> Result<u64, DbErr> {
        todo::Entity::find().count(self.db).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn count_by_completed(&self, completed: bool) -> Result<u64, DbErr> {
        todo::Entity::find()
            .filter(todo::Column::Completed.eq(completed))
            .count(self.db)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn count_by_priority(&self, priority: Priority) -> Result<u64, DbErr> {
        todo::Entity::find()
            .filter(todo::Column::Priority.eq(priority))
            .count(self.db)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn count_by_category(&self, category: Category) -> Result<u64, DbErr> {
        todo::Entity::find()
            .filter(todo::Column::Category.eq(category))
            .count(self.db)
            .await
    }

    /// Counts rows with the given completion flag that were due strictly before `instant`.
    #[tracing::instrument(skip(self))]
    pub async fn count_by_completed_and_due_date_before(
        &self,
        completed: bool,
        instant: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        todo::Entity::find()
            .filter(todo::Column::Completed.eq(completed))
            .filter(todo::Column::DueDate.lt(instant))
            .count(self.db)
            .await
    }

    /// Removes every row with the given completion flag in a single statement.
    ///
    /// # Returns
    ///
    /// The number of rows removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_by_completed(&self, completed: bool) -> Result<u64, DbErr> {
        let result = todo::Entity::delete_many()
            .filter(todo::Column::Completed.eq(completed))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Inserts the row when its id is unset and updates it otherwise.
    ///
    /// Timestamps and `completed_at` are stamped here before anything is
    /// written, see [`stamp_before_save`].
    #[tracing::instrument(skip(self, active_model))]
    pub async fn save(&self, mut active_model: todo::ActiveModel) -> Result<todo::Model, DbErr> {
        stamp_before_save(&mut active_model, Utc::now());
        if active_model.id.is_not_set() {
            active_model.insert(self.db).await
        } else {
            active_model.update(self.db).await
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn exists_by_id(&self, id: i32) -> Result<bool, DbErr> {
        let matches = todo::Entity::find_by_id(id).count(self.db).await?;
        Ok(matches > 0)
    }

    /// Deletes the row with the given id, returning how many rows went away.
    #[tracing::instrument(skip(self))]
    pub async fn delete_by_id(&self, id: i32) -> Result<u64, DbErr> {
        let result = todo::Entity::delete_by_id(id).exec(self.db).await?;
        Ok(result.rows_affected)
    }

    async fn find_matching(&self, condition: Condition) -> Result<Vec<todo::Model>, DbErr> {
        todo::Entity::find()
            .filter(condition)
            .order_by_asc(todo::Column::Id)
            .all(self.db)
            .await
    }
}

/// Applies the lifecycle rules every write must honor.
///
/// * `created_at` is only set for rows that have no id yet.
/// * `updated_at` always moves to `now`.
/// * `completed_at` is set when the row is completed without one, and
///   cleared whenever the row is not completed.
pub(crate) fn stamp_before_save(active_model: &mut todo::ActiveModel, now: DateTime<Utc>) {
    if active_model.id.is_not_set() {
        active_model.created_at = ActiveValue::Set(now);
    }
    active_model.updated_at = ActiveValue::Set(now);

    let completed = current_value(&active_model.completed).unwrap_or(false);
    let completed_at = current_value(&active_model.completed_at).flatten();
    match (completed, completed_at) {
        (true, None) => active_model.completed_at = ActiveValue::Set(Some(now)),
        (false, Some(_)) => active_model.completed_at = ActiveValue::Set(None),
        _ => {}
    }
}

fn current_value<V>(value: &ActiveValue<V>) -> Option<V>
where
    V: Into<Value> + Clone,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v.clone()),
        ActiveValue::NotSet => None,
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
