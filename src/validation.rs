//! Field rules shared by the request payloads in [`crate::models`].
//!
//! The `validator` derive handles lengths, emails and patterns; the functions here
//! cover the rules it cannot express (password composition, trimmed category names,
//! enum membership) and turn actix payload errors into the same 422 shape.

use actix_web::{
    error::{JsonPayloadError, QueryPayloadError},
    HttpRequest,
};
use regex::Regex;
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

use crate::error::AppError;
use crate::models::task::{TaskPriority, TaskStatus};

/// Characters that satisfy the "special character" password rule.
pub const PASSWORD_SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

pub const CATEGORY_NAME_MIN_LENGTH: usize = 3;
pub const CATEGORY_NAME_MAX_LENGTH: usize = 100;

/// Category assigned to tasks created without one.
pub const DEFAULT_CATEGORY: &str = "personal";

lazy_static::lazy_static! {
    pub static ref COLOR_REGEX: Regex = Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap();
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Composition rules for passwords. Length is checked by the `length` attribute.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(rule(
            "password_uppercase",
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(rule(
            "password_lowercase",
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(rule(
            "password_digit",
            "Password must contain at least one digit",
        ));
    }
    if !password
        .chars()
        .any(|c| PASSWORD_SPECIAL_CHARACTERS.contains(c))
    {
        return Err(rule(
            "password_special",
            "Password must contain at least one special character",
        ));
    }
    Ok(())
}

/// Trimmed, lowercased form used for storage and uniqueness.
pub fn normalize_category_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn validate_category_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length < CATEGORY_NAME_MIN_LENGTH {
        return Err(rule(
            "category_name_length",
            "Category name must be at least 3 characters long",
        ));
    }
    if length > CATEGORY_NAME_MAX_LENGTH {
        return Err(rule(
            "category_name_length",
            "Category name must be at most 100 characters long",
        ));
    }
    Ok(())
}

/// A task's category may be blank, meaning the default category.
pub fn validate_task_category(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Ok(());
    }
    validate_category_name(name)
}

/// Resolves an optional task category to its normalised name, blank meaning default.
pub fn task_category_or_default(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => normalize_category_name(name),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

pub fn validate_task_status(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<TaskStatus>()
        .map(|_| ())
        .map_err(|_| rule("task_status", "Status must be one of: pending, in_progress, completed"))
}

pub fn validate_task_priority(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<TaskPriority>()
        .map(|_| ())
        .map_err(|_| rule("task_priority", "Priority must be one of: low, medium, high"))
}

/// Priority rule for new tasks, where a blank value means the default.
pub fn validate_new_task_priority(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    validate_task_priority(value)
}

/// Builds a single-field `ValidationErrors`.
pub fn field_error(
    field: &'static str,
    code: &'static str,
    message: impl Into<Cow<'static, str>>,
) -> ValidationErrors {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    let mut errors = ValidationErrors::new();
    errors.add(field, error);
    errors
}

/// `JsonConfig` error handler: undecodable bodies are reported as 422 on `body`.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let app_error = match err {
        JsonPayloadError::Deserialize(e) => {
            AppError::ValidationError(field_error("body", "invalid_body", e.to_string()))
        }
        JsonPayloadError::ContentType => {
            AppError::BadRequest("Content type must be application/json".into())
        }
        other => AppError::BadRequest(other.to_string()),
    };
    app_error.into()
}

/// `QueryConfig` error handler: bad or unknown query parameters are reported as 422 on `query`.
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::ValidationError(field_error("query", "invalid_query", err.to_string())).into()
}
