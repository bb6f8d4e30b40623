//! In-process [`Store`] used by the integration tests and for running the API
//! without a database.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{category_taken, email_taken, Store};
use crate::clock::{Clock, SystemClock};
use crate::error::AppError;
use crate::models::{Category, NewCategory, NewTask, NewUser, Task, TaskChanges, TaskFilter, User};
use crate::validation::normalize_category_name;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    categories: HashMap<String, Category>,
    /// Insertion order, oldest first.
    tasks: Vec<Task>,
}

impl Tables {
    fn category_named(&mut self, name: &str, now: chrono::DateTime<chrono::Utc>) -> Category {
        self.categories
            .entry(name.to_string())
            .or_insert_with(|| Category {
                id: Uuid::new_v4(),
                name: name.to_string(),
                color: None,
                created_at: now,
            })
            .clone()
    }

    fn owned_task_mut(&mut self, owner: Uuid, id: Uuid) -> Option<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id && task.user_id == owner)
    }
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
            offline: AtomicBool::new(false),
        }
    }

    /// Makes [`Store::ping`] fail until called again with `false`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("memory store is offline".into()));
        }
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(email_taken());
        }
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            created_at: self.clock.now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, AppError> {
        let mut tables = self.tables.write().await;
        if tables.categories.contains_key(&category.name) {
            return Err(category_taken(&category.name));
        }
        let created = Category {
            id: Uuid::new_v4(),
            name: category.name.clone(),
            color: category.color,
            created_at: self.clock.now(),
        };
        tables.categories.insert(category.name, created.clone());
        Ok(created)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_task(&self, owner: Uuid, task: NewTask) -> Result<Task, AppError> {
        let now = self.clock.now();
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&owner) {
            return Err(AppError::NotFound("User not found".into()));
        }
        let category = tables.category_named(&normalize_category_name(&task.category), now);
        let mut task = task;
        task.category = category.name;
        let task = Task::new(task, owner, category.id, now);
        tables.tasks.push(task.clone());
        Ok(task)
    }

    async fn list_tasks(&self, owner: Uuid, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .iter()
            .rev()
            .filter(|task| task.user_id == owner && filter.matches(task))
            .cloned()
            .collect();
        // Stable, so tasks created at the same instant stay newest-inserted first.
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn find_task(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .iter()
            .find(|task| task.id == id && task.user_id == owner)
            .cloned())
    }

    async fn update_task(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, AppError> {
        let now = self.clock.now();
        let mut tables = self.tables.write().await;
        if tables.owned_task_mut(owner, id).is_none() {
            return Ok(None);
        }
        let category = changes
            .category
            .as_deref()
            .map(|name| tables.category_named(&normalize_category_name(name), now))
            .map(|category| (category.id, category.name));

        let Some(task) = tables.owned_task_mut(owner, id) else {
            return Ok(None);
        };
        task.apply(changes, category, now);
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables
            .tasks
            .retain(|task| !(task.id == id && task.user_id == owner));
        Ok(tables.tasks.len() != before)
    }
}
