use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{
    password::PasswordHasher, rate_limit::RateLimiter, token::TokenService, AccessTokenResponse,
    TokenResponse,
};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::AppError;
use crate::models::{
    user::normalize_email, LoginRequest, NewUser, RefreshRequest, RegisterRequest, User,
};
use crate::store::Store;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Registration, login, token refresh and bearer-token authentication.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    tokens: TokenService,
    limiter: Arc<RateLimiter>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        hasher: PasswordHasher,
        tokens: TokenService,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            limiter,
        }
    }

    /// Builds the service from configuration, sharing `clock` between token
    /// issuance and the login rate limiter.
    pub fn from_config(config: &Config, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let tokens = TokenService::new(
            &config.jwt_secret,
            Duration::minutes(config.access_token_minutes),
            Duration::minutes(config.refresh_token_minutes),
            Arc::clone(&clock),
        );
        let hasher = PasswordHasher::new(
            config.bcrypt_cost,
            config.hasher_workers,
            config.hasher_queue_capacity,
        );
        let limiter = RateLimiter::new(
            config.login_rate_limit,
            Duration::seconds(config.login_rate_window_secs as i64),
            clock,
        );
        Self::new(store, hasher, tokens, Arc::new(limiter))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Creates an account. Nothing is stored unless every field rule passes.
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        request.validate()?;
        let email = normalize_email(&request.email);

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let password_hash = self.hasher.hash(request.password).await?;
        // The store reports a concurrent registration of the same email as a conflict too.
        let user = self
            .store
            .create_user(NewUser {
                email,
                password_hash,
            })
            .await?;

        log::info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Records a login attempt for `client_key`, failing once the window is full.
    ///
    /// Runs before the request body is even decoded, so a throttled client learns
    /// nothing about the credentials it sent.
    pub fn check_login_rate(&self, client_key: &str) -> Result<(), AppError> {
        if self.limiter.allow(client_key) {
            return Ok(());
        }
        let retry_after = self
            .limiter
            .retry_after(client_key)
            .map(|wait| wait.num_seconds().max(1))
            .unwrap_or(1);
        Err(AppError::TooManyRequests(format!(
            "Too many login attempts, retry in {} seconds",
            retry_after
        )))
    }

    /// Exchanges credentials for an access/refresh token pair. Callers charge the
    /// attempt with [`AuthService::check_login_rate`] first.
    pub async fn verify_credentials(
        &self,
        request: LoginRequest,
    ) -> Result<TokenResponse, AppError> {
        request.validate()?;
        let email = normalize_email(&request.email);

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            log::debug!("Login failed: no account for {}", email);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        };

        if !self
            .hasher
            .verify(request.password, user.password_hash.clone())
            .await?
        {
            log::debug!("Login failed: wrong password for user {}", user.id);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        log::info!("User {} logged in", user.id);
        Ok(TokenResponse::bearer(
            self.tokens.issue_access(user.id)?,
            self.tokens.issue_refresh(user.id)?,
        ))
    }

    /// Issues a fresh access token for a valid refresh token.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<AccessTokenResponse, AppError> {
        request.validate()?;
        let claims = self.tokens.verify_refresh(&request.refresh_token)?;
        let user_id = self.existing_user(claims.sub).await?;
        Ok(AccessTokenResponse::bearer(self.tokens.issue_access(user_id)?))
    }

    /// Resolves a bearer access token to the id of an existing user.
    pub async fn authenticate(&self, token: &str) -> Result<Uuid, AppError> {
        let claims = self.tokens.verify_access(token)?;
        self.existing_user(claims.sub).await
    }

    async fn existing_user(&self, user_id: Uuid) -> Result<Uuid, AppError> {
        match self.store.find_user_by_id(user_id).await? {
            Some(user) => Ok(user.id),
            None => Err(AppError::Unauthorized("User no longer exists".into())),
        }
    }
}
