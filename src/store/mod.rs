//! Persistence behind a trait, so handlers and the auth service do not care
//! whether they talk to PostgreSQL or to the in-process store used by tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Category, NewCategory, NewTask, NewUser, Task, TaskChanges, TaskFilter, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Trait for storage backends.
///
/// Every task operation takes the owning user's id; a task owned by someone else
/// is indistinguishable from one that does not exist.
#[async_trait]
pub trait Store: Send + Sync {
    /// Round trip to the backing store, used by the readiness probe.
    async fn ping(&self) -> Result<(), AppError>;

    /// Inserts a user. An email that is already taken is a `Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Inserts a category. A name that is already taken is a `Conflict`.
    async fn create_category(&self, category: NewCategory) -> Result<Category, AppError>;

    /// All categories, ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, AppError>;

    /// Inserts a task for `owner`, resolving its category by name.
    async fn create_task(&self, owner: Uuid, task: NewTask) -> Result<Task, AppError>;

    /// The owner's tasks matching `filter`, newest first.
    async fn list_tasks(&self, owner: Uuid, filter: &TaskFilter) -> Result<Vec<Task>, AppError>;

    async fn find_task(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, AppError>;

    /// Applies `changes` to one of the owner's tasks; `None` if there is no such task.
    async fn update_task(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, AppError>;

    /// Deletes one of the owner's tasks; `false` if there was no such task.
    async fn delete_task(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError>;
}

pub(crate) fn email_taken() -> AppError {
    AppError::Conflict("Email already registered".into())
}

pub(crate) fn category_taken(name: &str) -> AppError {
    AppError::Conflict(format!("Category '{}' already exists", name))
}
