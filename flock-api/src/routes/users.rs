/// User administration (superadmin, admin)
///
/// - `GET /v1/users` - List
/// - `POST /v1/users` - Create; returns a generated temporary password once
///   when none was supplied
/// - `GET /v1/users/:id` - Get, with the assignment list
/// - `PUT /v1/users/:id` - Update role, placement and assignment list
///
/// Only a superadmin may grant the superadmin role or edit a superadmin.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use flock_shared::{
    auth::{
        access::AccessContext,
        authorization::{found, require},
        password,
    },
    models::{
        pagination::{Page, PageParams},
        church::Church,
        user::{CreateUser, Role, UpdateUser, User},
    },
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    pub role: Role,

    pub church_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub field_id: Option<Uuid>,

    #[serde(default)]
    pub assigned_church_ids: Vec<Uuid>,

    /// Generated when absent
    #[validate(length(max = 256, message = "Password must be at most 256 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,

    pub assigned_church_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreatedUser {
    #[serde(flatten)]
    pub detail: UserDetail,

    /// Shown once; only present when the password was generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

async fn load_detail(pool: &PgPool, user: User) -> ApiResult<UserDetail> {
    let assigned_church_ids = User::assigned_church_ids(pool, user.id).await?;
    Ok(UserDetail {
        user,
        assigned_church_ids,
    })
}

fn check_role_grant(ctx: &AccessContext, role: Role) -> ApiResult<()> {
    if role == Role::Unknown {
        return Err(ApiError::invalid_field("role", "Unknown role"));
    }
    require(ctx.role.can_assign_role(role), &format!("assign the {} role", role))?;
    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<User>>> {
    require(ctx.role.can_manage_users(), "manage users")?;
    page.validate()?;
    Ok(Json(User::list(&state.db, page).await?))
}

/// Rejects an assignment list naming churches that do not exist
async fn check_assignments(pool: &PgPool, church_ids: &[Uuid]) -> ApiResult<()> {
    let missing = Church::missing_ids(pool, church_ids).await?;
    if missing.is_empty() {
        return Ok(());
    }

    let missing: Vec<String> = missing.iter().map(Uuid::to_string).collect();
    Err(ApiError::invalid_field(
        "assigned_church_ids",
        format!("Unknown church ids: {}", missing.join(", ")),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserDetail>> {
    require(ctx.role.can_manage_users(), "manage users")?;
    let user = found(User::find_by_id(&state.db, id).await?, "User")?;
    Ok(Json(load_detail(&state.db, user).await?))
}

/// Creates a staff account
///
/// # Errors
///
/// - `403 Forbidden`: Caller may not manage users or grant the role
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed or password too weak
pub async fn create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<CreatedUser>)> {
    require(ctx.role.can_manage_users(), "manage users")?;
    req.validate()?;
    check_role_grant(&ctx, req.role)?;

    let (plain_password, temporary_password) = match req.password {
        Some(chosen) => {
            password::validate_password_strength(&chosen)
                .map_err(|message| ApiError::invalid_field("password", message))?;
            (chosen, None)
        }
        None => {
            let generated = password::generate_temporary_password();
            (generated.clone(), Some(generated))
        }
    };
    let password_hash = password::hash_password(&plain_password)?;

    check_assignments(&state.db, &req.assigned_church_ids).await?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            name: req.name,
            role: req.role,
            church_id: req.church_id,
            district_id: req.district_id,
            field_id: req.field_id,
            assigned_church_ids: req.assigned_church_ids,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, role = %user.role, created_by = %ctx.user_id, "User created");

    let detail = load_detail(&state.db, user).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedUser {
            detail,
            temporary_password,
        }),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateUser>,
) -> ApiResult<Json<UserDetail>> {
    require(ctx.role.can_manage_users(), "manage users")?;
    data.validate()?;

    let existing = found(User::find_by_id(&state.db, id).await?, "User")?;
    require(
        existing.role != Role::Superadmin || ctx.role == Role::Superadmin,
        "edit a superadmin",
    )?;
    if let Some(role) = data.role {
        check_role_grant(&ctx, role)?;
    }
    if let Some(church_ids) = &data.assigned_church_ids {
        check_assignments(&state.db, church_ids).await?;
    }

    let user = found(User::update(&state.db, id, data).await?, "User")?;
    tracing::info!(user_id = %user.id, role = %user.role, updated_by = %ctx.user_id, "User updated");
    Ok(Json(load_detail(&state.db, user).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flock_shared::auth::scope::ChurchScope;

    fn ctx(role: Role) -> AccessContext {
        AccessContext {
            user_id: Uuid::new_v4(),
            email: "admin@example.org".to_string(),
            role,
            church_id: None,
            district_id: None,
            field_id: None,
            scope: ChurchScope::All,
        }
    }

    #[test]
    fn test_admin_cannot_grant_superadmin() {
        assert!(check_role_grant(&ctx(Role::Admin), Role::Pastor).is_ok());
        assert!(matches!(
            check_role_grant(&ctx(Role::Admin), Role::Superadmin),
            Err(ApiError::Forbidden(_))
        ));
        assert!(check_role_grant(&ctx(Role::Superadmin), Role::Superadmin).is_ok());
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(matches!(
            check_role_grant(&ctx(Role::Superadmin), Role::Unknown),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"email":"not-an-email","role":"pastor"}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());

        let req: CreateUserRequest = serde_json::from_str(
            r#"{"email":"pastor@example.org","role":"pastor","district_id":"6f1c1f5e-2a4b-4c57-9a43-5d0e8f0f2b11"}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
        assert!(req.assigned_church_ids.is_empty());
    }
}
