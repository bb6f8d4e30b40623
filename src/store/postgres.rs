use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::{category_taken, email_taken, Store};
use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{Category, NewCategory, NewTask, NewUser, Task, TaskChanges, TaskFilter, User};
use crate::validation::normalize_category_name;

const USER_COLUMNS: &str = "id, email, password_hash, created_at";
const CATEGORY_COLUMNS: &str = "id, name, color, created_at";

/// Task rows always come back joined with their category's name.
const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.status, t.priority, t.due_date, \
     t.completed_at, t.category_id, c.name AS category_name, t.user_id, t.created_at, t.updated_at \
     FROM tasks t JOIN categories c ON c.id = t.category_id";

/// [`Store`] backed by PostgreSQL through a `sqlx` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Get-or-create on an open connection, so it can join a transaction.
///
/// `ON CONFLICT DO NOTHING` followed by a read means concurrent callers never
/// fail and all see the single surviving row.
async fn category_named(conn: &mut PgConnection, name: &str) -> Result<Category, sqlx::Error> {
    sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
        .bind(Uuid::new_v4())
        .bind(name)
        .execute(&mut *conn)
        .await?;

    sqlx::query_as::<_, Category>(&format!(
        "SELECT {} FROM categories WHERE name = $1",
        CATEGORY_COLUMNS
    ))
    .bind(name)
    .fetch_one(&mut *conn)
    .await
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(email_taken()),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, AppError> {
        let result = sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (id, name, color, created_at) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&category.name)
        .bind(&category.color)
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(e) if is_unique_violation(&e) => Err(category_taken(&category.name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories ORDER BY name",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn create_task(&self, owner: Uuid, task: NewTask) -> Result<Task, AppError> {
        let mut tx = self.pool.begin().await?;
        let category = category_named(&mut tx, &normalize_category_name(&task.category)).await?;
        let mut task = task;
        task.category = category.name;
        let task = Task::new(task, owner, category.id, self.clock.now());

        sqlx::query(
            "INSERT INTO tasks (id, title, description, status, priority, due_date, completed_at, \
             user_id, category_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.completed_at)
        .bind(task.user_id)
        .bind(task.category_id)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn list_tasks(&self, owner: Uuid, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        // Conditions are appended in the same order their values are bound below.
        let mut sql = format!("{} WHERE t.user_id = $1", TASK_SELECT);
        let mut param_count = 2;

        if filter.status.is_some() {
            sql.push_str(&format!(" AND t.status = ${}", param_count));
            param_count += 1;
        }
        if filter.priority.is_some() {
            sql.push_str(&format!(" AND t.priority = ${}", param_count));
            param_count += 1;
        }
        if filter.category.is_some() {
            sql.push_str(&format!(" AND c.name = ${}", param_count));
            param_count += 1;
        }
        if filter.due_date.is_some() {
            sql.push_str(&format!(
                " AND (t.due_date AT TIME ZONE 'UTC')::date = ${}",
                param_count
            ));
            param_count += 1;
        }
        if filter.due_from.is_some() {
            sql.push_str(&format!(" AND t.due_date >= ${}", param_count));
            param_count += 1;
        }
        if filter.due_to.is_some() {
            sql.push_str(&format!(" AND t.due_date <= ${}", param_count));
        }
        sql.push_str(" ORDER BY t.created_at DESC");

        let mut query = sqlx::query_as::<_, Task>(&sql).bind(owner);
        if let Some(status) = filter.status {
            query = query.bind(status);
        }
        if let Some(priority) = filter.priority {
            query = query.bind(priority);
        }
        if let Some(category) = &filter.category {
            query = query.bind(category);
        }
        if let Some(day) = filter.due_date {
            query = query.bind(day);
        }
        if let Some(from) = filter.due_from {
            query = query.bind(from);
        }
        if let Some(to) = filter.due_to {
            query = query.bind(to);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn find_task(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "{} WHERE t.id = $1 AND t.user_id = $2",
            TASK_SELECT
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    async fn update_task(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, AppError> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, Task>(&format!(
            "{} WHERE t.id = $1 AND t.user_id = $2 FOR UPDATE OF t",
            TASK_SELECT
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut task) = current else {
            return Ok(None);
        };

        let category = match changes.category.as_deref() {
            Some(name) => {
                let category = category_named(&mut tx, &normalize_category_name(name)).await?;
                Some((category.id, category.name))
            }
            None => None,
        };
        task.apply(changes, category, self.clock.now());

        sqlx::query(
            "UPDATE tasks SET title = $1, description = $2, status = $3, priority = $4, \
             due_date = $5, completed_at = $6, category_id = $7, updated_at = $8 \
             WHERE id = $9 AND user_id = $10",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.completed_at)
        .bind(task.category_id)
        .bind(task.updated_at)
        .bind(task.id)
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(task))
    }

    async fn delete_task(&self, owner: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::models::{TaskPriority, TaskStatus};

    async fn connect() -> PgStore {
        dotenv::dotenv().ok();
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.expect("Failed to connect to database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        PgStore::new(pool, Arc::new(SystemClock))
    }

    #[ignore]
    #[actix_rt::test]
    async fn test_task_lifecycle_against_postgres() {
        let store = connect().await;
        let email = format!("pg-{}@example.com", Uuid::new_v4());
        let user = store
            .create_user(NewUser {
                email: email.clone(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(
            store
                .create_user(NewUser {
                    email,
                    password_hash: "hash".to_string(),
                })
                .await,
            Err(AppError::Conflict(_))
        ));

        let task = store
            .create_task(
                user.id,
                NewTask {
                    title: "Postgres task".to_string(),
                    description: None,
                    status: TaskStatus::Pending,
                    priority: TaskPriority::High,
                    due_date: None,
                    category: "personal".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(task.category_name, "personal");

        let listed = store
            .list_tasks(
                user.id,
                &TaskFilter {
                    priority: Some(TaskPriority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let updated = store
            .update_task(
                user.id,
                task.id,
                TaskChanges {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(updated.completed_at.is_some());

        assert!(store.delete_task(user.id, task.id).await.unwrap());
        assert!(store.find_task(user.id, task.id).await.unwrap().is_none());
    }
}
