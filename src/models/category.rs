use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::validation::{normalize_category_name, validate_category_name, COLOR_REGEX};

/// A task category, shared by all users.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    /// Trimmed and lowercased; unique.
    pub name: String,
    /// `#RRGGBB`, if one was given.
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST /categories`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CategoryInput {
    /// At least 3 characters once trimmed; stored lowercased.
    #[validate(custom = "validate_category_name")]
    pub name: String,

    #[validate(regex(path = "COLOR_REGEX", message = "Color must be a hex value like #1A2B3C"))]
    pub color: Option<String>,
}

/// A validated category ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub color: Option<String>,
}

impl CategoryInput {
    /// Validates the payload and normalises the name.
    pub fn into_new_category(self) -> Result<NewCategory, validator::ValidationErrors> {
        self.validate()?;
        Ok(NewCategory {
            name: normalize_category_name(&self.name),
            color: self.color,
        })
    }
}

impl NewCategory {
    /// A category created implicitly by a task, without a color.
    pub fn named(name: &str) -> Self {
        Self {
            name: normalize_category_name(name),
            color: None,
        }
    }
}
