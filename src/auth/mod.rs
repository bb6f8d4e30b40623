pub mod extractors;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod service;
pub mod token;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::User;

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::PasswordHasher;
pub use rate_limit::RateLimiter;
pub use service::AuthService;
pub use token::{Claims, TokenError, TokenKind, TokenService};

/// Scheme name returned alongside issued tokens.
pub const BEARER: &str = "bearer";

/// Response structure after a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Short-lived token for the `Authorization: Bearer` header.
    pub access_token: String,
    /// Long-lived token accepted only by `POST /auth/refresh`.
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: BEARER.to_string(),
        }
    }
}

/// Response structure after a successful refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl AccessTokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: BEARER.to_string(),
        }
    }
}

/// Response structure after a successful registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// The unique identifier of the new user.
    pub user_id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for RegisterResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}
