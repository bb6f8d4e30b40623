use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{TaskInput, TaskQuery, TaskUpdate},
    state::AppState,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".into())
}

/// Retrieves a list of tasks for the authenticated user.
///
/// Tasks are ordered by creation date in descending order.
///
/// ## Query Parameters:
/// - `status` (optional): `pending`, `in_progress` or `completed`.
/// - `priority` (optional): `low`, `medium` or `high`.
/// - `category` (optional): Category name, matched case-insensitively.
/// - `due_date` (optional): A calendar date; matches tasks due on that UTC day.
/// - `due_from`, `due_to` (optional): Inclusive RFC 3339 bounds on the due date.
///
/// Any other parameter is rejected with `422`.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query_params: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    let filter = query_params.into_inner().into_filter();
    let tasks = state.store.list_tasks(user.0, &filter).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task for the authenticated user.
///
/// ## Request Body:
/// - `title`: 1 to 255 characters (required).
/// - `description` (optional).
/// - `status` (optional): Defaults to `pending`.
/// - `priority` (optional): Defaults to `medium`.
/// - `due_date` (optional): RFC 3339 timestamp.
/// - `category` (optional): Category name, created if missing. Defaults to `personal`.
///
/// ## Responses:
/// - `201 Created`: Returns the newly created `Task` object as JSON.
/// - `422 Unprocessable Entity`: If input validation on `TaskInput` fails.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    let new_task = task_data.into_inner().into_new_task()?;
    let task = state.store.create_task(user.0, new_task).await?;
    log::debug!("User {} created task {}", user.0, task.id);
    Ok(HttpResponse::Created().json(task))
}

/// Retrieves a specific task by its ID.
///
/// ## Responses:
/// - `200 OK`: Returns the `Task` object as JSON if found and owned by the user.
/// - `404 Not Found`: If the task does not exist or is not owned by the authenticated user.
#[get("/{id}")]
pub async fn get_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = state
        .store
        .find_task(user.0, task_id.into_inner())
        .await?
        .ok_or_else(task_not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Updates an existing task.
///
/// Only the supplied fields change. A blank `category` moves the task back to
/// `personal`.
///
/// ## Responses:
/// - `200 OK`: Returns the updated `Task` object as JSON.
/// - `404 Not Found`: If the task does not exist or is not owned by the authenticated user.
/// - `422 Unprocessable Entity`: If input validation on `TaskUpdate` fails.
#[put("/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskUpdate>,
) -> Result<impl Responder, AppError> {
    let changes = task_data.into_inner().into_changes()?;
    let task = state
        .store
        .update_task(user.0, task_id.into_inner(), changes)
        .await?
        .ok_or_else(task_not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Deletes a task by its ID.
///
/// ## Responses:
/// - `204 No Content`: On successful deletion.
/// - `404 Not Found`: If the task does not exist or is not owned by the authenticated user.
#[delete("/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    if !state.store.delete_task(user.0, task_id.into_inner()).await? {
        return Err(task_not_found());
    }
    Ok(HttpResponse::NoContent().finish())
}
