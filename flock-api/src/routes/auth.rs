/// Authentication endpoints
///
/// - `POST /v1/auth/login` - Exchange email and password for tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for a new access token
/// - `GET /v1/auth/me` - The caller's role and church scope
/// - `POST /v1/auth/password` - Change the caller's password
///
/// Accounts are created by administrators (see `users`); there is no
/// self-registration.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use flock_shared::{
    auth::{access::AccessContext, jwt, password},
    models::user::User,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 256, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,

    pub role: String,

    /// Access token (8h)
    pub access_token: String,

    /// Refresh token (14d)
    pub refresh_token: String,

    pub token_type: &'static str,

    /// Seconds until the access token expires
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// The caller as the access resolver sees it
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub access: AccessContext,

    /// Churches in scope; null means every church
    pub church_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(max = 256, message = "Password must be at most 256 characters"))]
    pub new_password: String,
}

/// Login endpoint
///
/// ```text
/// POST /v1/auth/login
/// { "email": "secretary@example.org", "password": "..." }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Malformed email
/// - `401 Unauthorized`: Unknown email or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;

    let access_claims = jwt::Claims::new(user.id, jwt::TokenType::Access);
    let refresh_claims = jwt::Claims::new(user.id, jwt::TokenType::Refresh);

    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;
    let refresh_token = jwt::create_token(&refresh_claims, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(LoginResponse {
        user_id: user.id,
        role: user.role.to_string(),
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: access_claims.expires_in_seconds(),
    }))
}

/// Token refresh endpoint
///
/// The refresh token is checked before the database is consulted; a token
/// whose user has since been deleted is rejected.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let (access_token, claims) = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    if User::find_by_id(&state.db, claims.sub).await?.is_none() {
        return Err(ApiError::Unauthorized("User no longer exists".to_string()));
    }

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: claims.expires_in_seconds(),
    }))
}

pub async fn me(Extension(ctx): Extension<AccessContext>) -> Json<MeResponse> {
    let church_ids = ctx.church_ids();
    Json(MeResponse {
        access: ctx,
        church_ids,
    })
}

/// Replaces the caller's password after checking the current one
pub async fn change_password(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    req.validate()?;
    password::validate_password_strength(&req.new_password)
        .map_err(|message| ApiError::invalid_field("new_password", message))?;

    let user = User::find_by_id(&state.db, ctx.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    if !password::verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::invalid_field(
            "current_password",
            "Current password is incorrect",
        ));
    }

    let hash = password::hash_password(&req.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
