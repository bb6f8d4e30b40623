use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{
    normalize_category_name, task_category_or_default, validate_new_task_priority,
    validate_task_category, validate_task_priority, validate_task_status,
};

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet.
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        })
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        })
    }
}

/// Represents a task entity as stored in the database and returned by the API.
/// `category_name` is joined in from `categories`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    /// Set when the task last entered `completed`.
    pub completed_at: Option<DateTime<Utc>>,
    pub category_id: Uuid,
    pub category_name: String,
    /// Identifier of the user who owns the task.
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for `POST /tasks`.
///
/// `status` and `priority` are taken as strings so that a value outside the enum is
/// reported as a field error rather than a body decoding failure.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// Must be between 1 and 255 characters.
    #[validate(length(min = 1, max = 255))]
    pub title: String,

    pub description: Option<String>,

    /// Defaults to `pending`.
    #[validate(custom = "validate_task_status")]
    pub status: Option<String>,

    /// Blank or absent means `medium`.
    #[validate(custom = "validate_new_task_priority")]
    pub priority: Option<String>,

    pub due_date: Option<DateTime<Utc>>,

    /// Category name; blank or absent means `personal`. Created if it does not exist.
    #[serde(alias = "category_name")]
    #[validate(custom = "validate_task_category")]
    pub category: Option<String>,
}

/// Payload for `PUT /tasks/{id}`. Absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,

    pub description: Option<String>,

    #[validate(custom = "validate_task_status")]
    pub status: Option<String>,

    #[validate(custom = "validate_task_priority")]
    pub priority: Option<String>,

    pub due_date: Option<DateTime<Utc>>,

    /// A blank string moves the task back to `personal`.
    #[serde(alias = "category_name")]
    #[validate(custom = "validate_task_category")]
    pub category: Option<String>,
}

/// Query parameters accepted by `GET /tasks`. Anything else is rejected.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Category name, matched after normalisation.
    pub category: Option<String>,
    /// Tasks due on this UTC calendar day.
    pub due_date: Option<NaiveDate>,
    /// Tasks due at or after this instant.
    pub due_from: Option<DateTime<Utc>>,
    /// Tasks due at or before this instant.
    pub due_to: Option<DateTime<Utc>>,
}

/// A validated task ready to be stored.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    /// Normalised category name, resolved with get-or-create.
    pub category: String,
}

/// A validated partial update.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    /// Normalised category name, resolved with get-or-create.
    pub category: Option<String>,
}

/// Normalised filters for listing a user's tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
}

// The string fields below have already passed the `validate_task_*` checks.
fn parse_or_default<T: FromStr + Default>(value: Option<&str>) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

impl TaskInput {
    pub fn into_new_task(self) -> Result<NewTask, validator::ValidationErrors> {
        self.validate()?;
        Ok(NewTask {
            title: self.title,
            description: self.description,
            status: parse_or_default(self.status.as_deref()),
            priority: parse_or_default(self.priority.as_deref()),
            due_date: self.due_date,
            category: task_category_or_default(self.category.as_deref()),
        })
    }
}

impl TaskUpdate {
    pub fn into_changes(self) -> Result<TaskChanges, validator::ValidationErrors> {
        self.validate()?;
        Ok(TaskChanges {
            title: self.title,
            description: self.description,
            status: self.status.as_deref().and_then(|s| s.parse().ok()),
            priority: self.priority.as_deref().and_then(|p| p.parse().ok()),
            due_date: self.due_date,
            category: self
                .category
                .as_deref()
                .map(|name| task_category_or_default(Some(name))),
        })
    }
}

impl TaskQuery {
    pub fn into_filter(self) -> TaskFilter {
        TaskFilter {
            status: self.status,
            priority: self.priority,
            category: self
                .category
                .map(|name| normalize_category_name(&name))
                .filter(|name| !name.is_empty()),
            due_date: self.due_date,
            due_from: self.due_from,
            due_to: self.due_to,
        }
    }
}

impl TaskFilter {
    /// In-process equivalent of the SQL `WHERE` clause built by the Postgres store.
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if self.priority.is_some_and(|priority| task.priority != priority) {
            return false;
        }
        if let Some(category) = &self.category {
            if &task.category_name != category {
                return false;
            }
        }
        if let Some(day) = self.due_date {
            if task.due_date.map(|due| due.date_naive()) != Some(day) {
                return false;
            }
        }
        if let Some(from) = self.due_from {
            if !task.due_date.is_some_and(|due| due >= from) {
                return false;
            }
        }
        if let Some(to) = self.due_to {
            if !task.due_date.is_some_and(|due| due <= to) {
                return false;
            }
        }
        true
    }
}

impl Task {
    /// Creates a new `Task` owned by `user_id` in the given category.
    pub fn new(input: NewTask, user_id: Uuid, category_id: Uuid, now: DateTime<Utc>) -> Self {
        let completed_at = (input.status == TaskStatus::Completed).then_some(now);
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            status: input.status,
            priority: input.priority,
            due_date: input.due_date,
            completed_at,
            category_id,
            category_name: input.category,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update. The category, if changed, must already be resolved.
    ///
    /// Entering `completed` stamps `completed_at` unless it is already set; leaving it
    /// clears the stamp.
    pub fn apply(
        &mut self,
        changes: TaskChanges,
        category: Option<(Uuid, String)>,
        now: DateTime<Utc>,
    ) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = Some(description);
        }
        if let Some(priority) = changes.priority {
            self.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(status) = changes.status {
            if status == TaskStatus::Completed {
                self.completed_at.get_or_insert(now);
            } else {
                self.completed_at = None;
            }
            self.status = status;
        }
        if let Some((category_id, category_name)) = category {
            self.category_id = category_id;
            self.category_name = category_name;
        }
        self.updated_at = now;
    }
}
