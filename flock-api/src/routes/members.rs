/// Member endpoints
///
/// - `GET /v1/members` - List (search, church, status, spiritual status)
/// - `POST /v1/members` - Create
/// - `GET /v1/members/:id` - Get
/// - `PUT /v1/members/:id` - Update
/// - `DELETE /v1/members/:id` - Delete (superadmin, admin)
///
/// A member's church changes only through an approved transfer.

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
        authorization::{found, require, require_church},
    },
    models::{
        member::{CreateMember, Member, MemberFilter, UpdateMember},
        pagination::{Page, PageParams},
    },
};
use uuid::Uuid;
use validator::Validate;

pub async fn list_members(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(page): Query<PageParams>,
    Query(filter): Query<MemberFilter>,
) -> ApiResult<Json<Page<Member>>> {
    page.validate()?;
    Ok(Json(Member::list(&state.db, &ctx.scope, &filter, page).await?))
}

pub async fn get_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Member>> {
    let member = found(Member::find_in_scope(&state.db, id, &ctx.scope).await?, "Member")?;
    Ok(Json(member))
}

/// Creates a member in a church inside the caller's scope
///
/// # Errors
///
/// - `403 Forbidden`: Role may not edit members
/// - `422 Unprocessable Entity`: Validation failed (age outside 0-150, bad email, ...)
/// - `404 Not Found`: Church outside the caller's scope
pub async fn create_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(data): Json<CreateMember>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    require(ctx.role.can_edit_members(), "create members")?;
    data.validate()?;
    require_church(&ctx, data.church_id)?;

    let member = Member::create(&state.db, data).await?;
    tracing::info!(
        member_id = %member.id,
        church_id = %member.church_id,
        created_by = %ctx.user_id,
        "Member created"
    );
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn update_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateMember>,
) -> ApiResult<Json<Member>> {
    require(ctx.role.can_edit_members(), "edit members")?;
    data.validate()?;
    found(Member::find_in_scope(&state.db, id, &ctx.scope).await?, "Member")?;

    let member = found(Member::update(&state.db, id, data).await?, "Member")?;
    tracing::info!(member_id = %member.id, updated_by = %ctx.user_id, "Member updated");
    Ok(Json(member))
}

pub async fn delete_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require(ctx.role.can_delete_members(), "delete members")?;
    found(Member::find_in_scope(&state.db, id, &ctx.scope).await?, "Member")?;

    if !Member::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }

    tracing::info!(member_id = %id, deleted_by = %ctx.user_id, "Member deleted");
    Ok(StatusCode::NO_CONTENT)
}
