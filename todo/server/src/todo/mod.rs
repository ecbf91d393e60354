use crate::entities::todo::{self, Category, Priority};
use chrono::{DateTime, Utc};
use sea_orm::*;
use std::collections::BTreeMap;

pub mod api;
pub mod repository;

pub use repository::TodoRepository;

/// Longest task accepted, matching the width of the `task` column.
pub const MAX_TASK_LEN: usize = 255;

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Todo {
    pub id: i32,
    pub task: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub category: Category,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub display_order: i32,
    pub tags: Option<String>,
}

impl From<todo::Model> for Todo {
    fn from(model: todo::Model) -> Self {
        Self {
            id: model.id,
            task: model.task,
            description: model.description,
            completed: model.completed,
            priority: model.priority,
            category: model.category,
            due_date: model.due_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
            completed_at: model.completed_at,
            display_order: model.display_order,
            tags: model.tags,
        }
    }
}

/// The fields a client controls when creating or replacing a todo.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct TodoDraft {
    pub task: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub category: Category,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<String>,
    /// `None` lets the service pick a position.
    pub display_order: Option<i32>,
}

impl TodoDraft {
    /// Creates a draft with the given task and every other field at its default.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            description: None,
            completed: false,
            priority: Priority::default(),
            category: Category::default(),
            due_date: None,
            tags: None,
            display_order: None,
        }
    }

    fn validate(&self) -> Result<(), TodoServiceError> {
        if self.task.trim().is_empty() {
            return Err(TodoServiceError::Validation(
                "task must not be empty".to_string(),
            ));
        }
        if self.task.chars().count() > MAX_TASK_LEN {
            return Err(TodoServiceError::Validation(format!(
                "task must be at most {} characters",
                MAX_TASK_LEN
            )));
        }
        Ok(())
    }

    /// Copies the mutable fields onto an active model. A missing display
    /// order leaves whatever the model already holds.
    fn apply_to(self, active_model: &mut todo::ActiveModel) {
        active_model.task = ActiveValue::Set(self.task);
        active_model.description = ActiveValue::Set(self.description);
        active_model.completed = ActiveValue::Set(self.completed);
        active_model.priority = ActiveValue::Set(self.priority);
        active_model.category = ActiveValue::Set(self.category);
        active_model.due_date = ActiveValue::Set(self.due_date);
        active_model.tags = ActiveValue::Set(self.tags);
        if let Some(display_order) = self.display_order {
            active_model.display_order = ActiveValue::Set(display_order);
        }
    }
}

/// The lookup a list request resolves to.
#[derive(Debug, PartialEq, Clone, Eq)]
pub enum TodoFilter {
    Search(String),
    CompletedAndPriority(bool, Priority),
    CompletedAndCategory(bool, Category),
    Completed(bool),
    Priority(Priority),
    Category(Category),
    All,
}

impl TodoFilter {
    /// Picks exactly one lookup from the optional list parameters.
    ///
    /// Precedence, first match wins: a non-empty search, completed with
    /// priority, completed with category, completed, priority, category,
    /// then everything by display order.
    pub fn resolve(
        completed: Option<bool>,
        priority: Option<Priority>,
        category: Option<Category>,
        search: Option<String>,
    ) -> Self {
        match (search.filter(|text| !text.is_empty()), completed, priority, category) {
            (Some(text), _, _, _) => Self::Search(text),
            (None, Some(completed), Some(priority), _) => {
                Self::CompletedAndPriority(completed, priority)
            }
            (None, Some(completed), None, Some(category)) => {
                Self::CompletedAndCategory(completed, category)
            }
            (None, Some(completed), None, None) => Self::Completed(completed),
            (None, None, Some(priority), _) => Self::Priority(priority),
            (None, None, None, Some(category)) => Self::Category(category),
            (None, None, None, None) => Self::All,
        }
    }
}

/// Aggregate counts over all todos.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Statistics {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub overdue: u64,
    pub by_priority: BTreeMap<Priority, u64>,
    pub by_category: BTreeMap<Category, u64>,
}

impl Statistics {
    /// Folds a snapshot of todos into statistics in one pass.
    ///
    /// Both breakdowns carry every enum value, zero when nothing matches.
    pub fn tally<'t>(todos: impl IntoIterator<Item = &'t Todo>, now: DateTime<Utc>) -> Self {
        let mut statistics = Self {
            total: 0,
            completed: 0,
            pending: 0,
            overdue: 0,
            by_priority: Priority::iter().map(|priority| (priority, 0)).collect(),
            by_category: Category::iter().map(|category| (category, 0)).collect(),
        };

        for todo in todos {
            statistics.total += 1;
            if todo.completed {
                statistics.completed += 1;
            } else if todo.due_date.is_some_and(|due_date| due_date < now) {
                statistics.overdue += 1;
            }
            *statistics.by_priority.entry(todo.priority).or_default() += 1;
            *statistics.by_category.entry(todo.category).or_default() += 1;
        }
        statistics.pending = statistics.total - statistics.completed;
        statistics
    }
}

/// Error type for TodoService operations.
#[derive(Debug, thiserror::Error)]
pub enum TodoServiceError {
    /// The id does not resolve to a stored todo.
    #[error("Todo with ID {0} not found")]
    TodoNotFound(i32),
    /// The request broke a field constraint.
    #[error("Invalid todo: {0}")]
    Validation(String),
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub struct TodoService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl TodoService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TodoService<'_> {
        TodoService { db }
    }

    fn repository(&self) -> TodoRepository<'_> {
        TodoRepository::new(self.db)
    }

    /// Lists todos through the single lookup the filter selects.
    #[tracing::instrument(skip(self))]
    pub async fn list_todos(&self, filter: TodoFilter) -> Result<Vec<Todo>, TodoServiceError> {
        let repository = self.repository();
        let models = match filter {
            TodoFilter::Search(text) => repository.search(&text).await?,
            TodoFilter::CompletedAndPriority(completed, priority) => {
                repository
                    .find_by_completed_and_priority(completed, priority)
                    .await?
            }
            TodoFilter::CompletedAndCategory(completed, category) => {
                repository
                    .find_by_completed_and_category(completed, category)
                    .await?
            }
            TodoFilter::Completed(completed) => repository.find_by_completed(completed).await?,
            TodoFilter::Priority(priority) => repository.find_by_priority(priority).await?,
            TodoFilter::Category(category) => repository.find_by_category(category).await?,
            TodoFilter::All => repository.find_all_ordered_by_display_order().await?,
        };
        Ok(models.into_iter().map(Todo::from).collect())
    }

    /// Retrieves a todo by its ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_todo_by_id(&self, id: i32) -> Result<Todo, TodoServiceError> {
        let model = self
            .repository()
            .find_by_id(id)
            .await?
            .ok_or(TodoServiceError::TodoNotFound(id))?;
        Ok(Todo::from(model))
    }

    /// Creates a todo. Without an explicit display order it goes after the
    /// current last one, or at 0 when there are no todos.
    ///
    /// # Returns
    ///
    /// The stored todo, with its generated ID and timestamps.
    #[tracing::instrument(skip(self))]
    pub async fn create_todo(&self, mut draft: TodoDraft) -> Result<Todo, TodoServiceError> {
        draft.validate()?;
        let repository = self.repository();
        if draft.display_order.is_none() {
            let next = match repository.find_max_display_order().await? {
                Some(max) => max.checked_add(1).ok_or_else(|| {
                    TodoServiceError::Validation(
                        "no display order left after the current last todo".to_string(),
                    )
                })?,
                None => 0,
            };
            draft.display_order = Some(next);
        }

        let mut active_model = <todo::ActiveModel as Default>::default();
        draft.apply_to(&mut active_model);
        let created = repository.save(active_model).await?;
        tracing::info!("Created todo {}", created.id);
        Ok(Todo::from(created))
    }

    /// Replaces every mutable field of an existing todo.
    #[tracing::instrument(skip(self))]
    pub async fn update_todo_by_id(
        &self,
        id: i32,
        draft: TodoDraft,
    ) -> Result<Todo, TodoServiceError> {
        draft.validate()?;
        let repository = self.repository();
        let existing = repository
            .find_by_id(id)
            .await?
            .ok_or(TodoServiceError::TodoNotFound(id))?;

        let mut active_model: todo::ActiveModel = existing.into();
        draft.apply_to(&mut active_model);
        let updated = repository.save(active_model).await?;
        Ok(Todo::from(updated))
    }

    /// Flips the completion flag of a todo.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_todo_by_id(&self, id: i32) -> Result<Todo, TodoServiceError> {
        let repository = self.repository();
        let existing = repository
            .find_by_id(id)
            .await?
            .ok_or(TodoServiceError::TodoNotFound(id))?;

        let completed = !existing.completed;
        let mut active_model: todo::ActiveModel = existing.into();
        active_model.completed = ActiveValue::Set(completed);
        let toggled = repository.save(active_model).await?;
        Ok(Todo::from(toggled))
    }

    /// Gives each listed todo its index as display order.
    ///
    /// IDs that do not exist are skipped. All writes share one transaction,
    /// so a failure leaves the previous order untouched.
    ///
    /// # Returns
    ///
    /// The number of todos that were reordered.
    #[tracing::instrument(skip(self))]
    pub async fn reorder_todos(&self, ids: &[i32]) -> Result<usize, TodoServiceError> {
        let txn = self.db.begin().await?;
        let repository = TodoRepository::new(&txn);
        let mut reordered = 0;

        for (index, &id) in ids.iter().enumerate() {
            let Some(existing) = repository.find_by_id(id).await? else {
                tracing::warn!("Skipping reorder of todo {}: not found", id);
                continue;
            };
            let display_order = i32::try_from(index).map_err(|_| {
                TodoServiceError::Validation("reorder list is too long".to_string())
            })?;
            let mut active_model: todo::ActiveModel = existing.into();
            active_model.display_order = ActiveValue::Set(display_order);
            repository.save(active_model).await?;
            reordered += 1;
        }

        txn.commit().await?;
        Ok(reordered)
    }

    /// Deletes a todo by its ID.
    #[tracing::instrument(skip(self))]
    pub async fn delete_todo_by_id(&self, id: i32) -> Result<(), TodoServiceError> {
        let repository = self.repository();
        if !repository.exists_by_id(id).await? {
            return Err(TodoServiceError::TodoNotFound(id));
        }
        repository.delete_by_id(id).await?;
        Ok(())
    }

    /// Deletes every completed todo, returning how many were removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_completed_todos(&self) -> Result<u64, TodoServiceError> {
        let deleted = self.repository().delete_by_completed(true).await?;
        tracing::info!("Deleted {} completed todos", deleted);
        Ok(deleted)
    }

    /// Computes statistics from a single read of every todo.
    #[tracing::instrument(skip(self))]
    pub async fn get_statistics(&self) -> Result<Statistics, TodoServiceError> {
        let todos: Vec<Todo> = self
            .repository()
            .find_all()
            .await?
            .into_iter()
            .map(Todo::from)
            .collect();
        Ok(Statistics::tally(&todos, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    mod filter_tests {
        use super::*;

        #[test]
        fn can_prefer_search_over_every_other_parameter() {
            let filter = TodoFilter::resolve(
                Some(true),
                Some(Priority::High),
                Some(Category::Work),
                Some("milk".to_string()),
            );

            assert_eq!(filter, TodoFilter::Search("milk".to_string()));
        }

        #[test]
        fn can_ignore_empty_search() {
            let filter = TodoFilter::resolve(Some(false), None, None, Some(String::new()));

            assert_eq!(filter, TodoFilter::Completed(false));
        }

        #[test]
        fn can_prefer_completed_and_priority_over_completed_and_category() {
            let filter =
                TodoFilter::resolve(Some(true), Some(Priority::High), Some(Category::Work), None);

            assert_eq!(filter, TodoFilter::CompletedAndPriority(true, Priority::High));
        }

        #[test]
        fn can_combine_completed_and_category() {
            let filter = TodoFilter::resolve(Some(false), None, Some(Category::Health), None);

            assert_eq!(
                filter,
                TodoFilter::CompletedAndCategory(false, Category::Health)
            );
        }

        #[test]
        fn can_prefer_priority_over_category_without_completed() {
            let filter =
                TodoFilter::resolve(None, Some(Priority::Low), Some(Category::Shopping), None);

            assert_eq!(filter, TodoFilter::Priority(Priority::Low));
        }

        #[test]
        fn can_filter_by_category_alone() {
            let filter = TodoFilter::resolve(None, None, Some(Category::Other), None);

            assert_eq!(filter, TodoFilter::Category(Category::Other));
        }

        #[test]
        fn can_fall_back_to_all() {
            assert_eq!(TodoFilter::resolve(None, None, None, None), TodoFilter::All);
        }
    }

    mod statistics_tests {
        use super::*;

        fn now() -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
        }

        fn todo(
            id: i32,
            completed: bool,
            priority: Priority,
            category: Category,
            due_date: Option<DateTime<Utc>>,
        ) -> Todo {
            Todo {
                id,
                task: format!("Task {}", id),
                description: None,
                completed,
                priority,
                category,
                due_date,
                created_at: now(),
                updated_at: now(),
                completed_at: completed.then(now),
                display_order: id,
                tags: None,
            }
        }

        #[test]
        fn can_tally_empty_snapshot_with_full_breakdowns() {
            let statistics = Statistics::tally(std::iter::empty(), now());

            assert_eq!(statistics.total, 0);
            assert_eq!(statistics.pending, 0);
            assert_eq!(statistics.by_priority.len(), 4);
            assert_eq!(statistics.by_category.len(), 6);
            assert!(statistics.by_priority.values().all(|&count| count == 0));
            assert!(statistics.by_category.values().all(|&count| count == 0));
        }

        #[test]
        fn can_tally_totals_and_overdue() {
            let yesterday = now() - Duration::days(1);
            let tomorrow = now() + Duration::days(1);
            let todos = vec![
                todo(1, true, Priority::High, Category::Work, Some(yesterday)),
                todo(2, false, Priority::High, Category::Work, Some(yesterday)),
                todo(3, false, Priority::Low, Category::Health, Some(tomorrow)),
                todo(4, false, Priority::Urgent, Category::Other, None),
            ];

            let statistics = Statistics::tally(&todos, now());

            assert_eq!(statistics.total, 4);
            assert_eq!(statistics.completed, 1);
            assert_eq!(statistics.pending, 3);
            assert_eq!(statistics.overdue, 1);
            assert_eq!(statistics.by_priority[&Priority::High], 2);
            assert_eq!(statistics.by_priority[&Priority::Medium], 0);
            assert_eq!(statistics.by_category[&Category::Work], 2);
            assert_eq!(statistics.by_category[&Category::Personal], 0);
            assert_eq!(statistics.by_priority.values().sum::<u64>(), 4);
            assert_eq!(statistics.by_category.values().sum::<u64>(), 4);
        }
    }

    mod draft_tests {
        use super::*;

        #[test]
        fn can_reject_blank_task() {
            let result = TodoDraft::new("   ").validate();

            assert!(matches!(result, Err(TodoServiceError::Validation(_))));
        }

        #[test]
        fn can_reject_overlong_task() {
            let result = TodoDraft::new("x".repeat(MAX_TASK_LEN + 1)).validate();

            assert!(matches!(result, Err(TodoServiceError::Validation(_))));
        }

        #[test]
        fn can_keep_display_order_when_draft_omits_it() {
            let mut active_model = todo::ActiveModel {
                display_order: ActiveValue::Unchanged(5),
                ..Default::default()
            };

            TodoDraft::new("Keep position").apply_to(&mut active_model);

            assert_eq!(active_model.display_order, ActiveValue::Unchanged(5));
            assert_eq!(
                active_model.task,
                ActiveValue::Set("Keep position".to_string())
            );
        }
    }
}
