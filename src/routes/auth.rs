use crate::{
    auth::RegisterResponse,
    error::AppError,
    models::{LoginRequest, RefreshRequest, RegisterRequest},
    state::AppState,
};
use actix_web::{post, web, HttpRequest, HttpResponse, Responder};

/// Key used for login rate limiting: the peer IP address.
fn client_key(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Register a new user
///
/// ## Responses:
/// - `201 Created`: `{user_id, email, created_at}`.
/// - `409 Conflict`: The email is already registered.
/// - `422 Unprocessable Entity`: Invalid email or weak password.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let user = state.auth.register(register_data.into_inner()).await?;
    Ok(HttpResponse::Created().json(RegisterResponse::from(user)))
}

/// Login user
///
/// Authenticates a user and returns an access/refresh token pair. Every request
/// counts against the caller's rate limit, including ones whose body cannot be
/// decoded, and the limit is enforced before the body is looked at.
///
/// ## Responses:
/// - `200 OK`: `{access_token, refresh_token, token_type: "bearer"}`.
/// - `401 Unauthorized`: Unknown email or wrong password.
/// - `422 Unprocessable Entity`: Malformed body or invalid email.
/// - `429 Too Many Requests`: Too many attempts from this client in the last minute.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: Result<web::Json<LoginRequest>, actix_web::Error>,
    req: HttpRequest,
) -> Result<impl Responder, actix_web::Error> {
    state.auth.check_login_rate(&client_key(&req))?;
    let tokens = state
        .auth
        .verify_credentials(login_data?.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Exchange a refresh token for a new access token.
///
/// ## Responses:
/// - `200 OK`: `{access_token, token_type: "bearer"}`.
/// - `401 Unauthorized`: Invalid, expired or non-refresh token.
#[post("/refresh")]
pub async fn refresh(
    state: web::Data<AppState>,
    refresh_data: web::Json<RefreshRequest>,
) -> Result<impl Responder, AppError> {
    let token = state.auth.refresh(refresh_data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(token))
}
