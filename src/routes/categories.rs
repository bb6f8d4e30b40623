use crate::{auth::AuthenticatedUser, error::AppError, models::CategoryInput, state::AppState};
use actix_web::{get, post, web, HttpResponse, Responder};

/// Lists every category, ordered by name.
#[get("")]
pub async fn list_categories(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let categories = state.store.list_categories().await?;
    Ok(HttpResponse::Ok().json(categories))
}

/// Creates a category.
///
/// ## Responses:
/// - `201 Created`: Returns the new `Category`.
/// - `409 Conflict`: A category with the same normalised name exists.
/// - `422 Unprocessable Entity`: Name shorter than 3 characters or malformed color.
#[post("")]
pub async fn create_category(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    category_data: web::Json<CategoryInput>,
) -> Result<impl Responder, AppError> {
    let new_category = category_data.into_inner().into_new_category()?;
    let category = state.store.create_category(new_category).await?;
    log::info!("User {} created category '{}'", user.0, category.name);
    Ok(HttpResponse::Created().json(category))
}
