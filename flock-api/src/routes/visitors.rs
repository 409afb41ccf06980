/// Visitor endpoints
///
/// - `GET /v1/visitors` - List (search, follow-up status, visit date range)
/// - `POST /v1/visitors` - Create
/// - `GET /v1/visitors/:id` - Get
/// - `PUT /v1/visitors/:id` - Update
/// - `PATCH /v1/visitors/:id/follow-up` - Change follow-up status

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
        member::Member,
        pagination::{Page, PageParams},
        visitor::{CreateVisitor, UpdateFollowUp, UpdateVisitor, Visitor, VisitorFilter},
    },
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// The inviting member, when given, must belong to the visitor's church
async fn check_inviter(pool: &PgPool, church_id: Uuid, invited_by: Option<Uuid>) -> ApiResult<()> {
    let Some(member_id) = invited_by else {
        return Ok(());
    };

    match Member::find_by_id(pool, member_id).await? {
        Some(member) if member.church_id == church_id => Ok(()),
        _ => Err(ApiError::invalid_field(
            "invited_by",
            "Inviting member must belong to the visitor's church",
        )),
    }
}

pub async fn list_visitors(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(page): Query<PageParams>,
    Query(filter): Query<VisitorFilter>,
) -> ApiResult<Json<Page<Visitor>>> {
    page.validate()?;
    Ok(Json(Visitor::list(&state.db, &ctx.scope, &filter, page).await?))
}

pub async fn get_visitor(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Visitor>> {
    let visitor = found(Visitor::find_in_scope(&state.db, id, &ctx.scope).await?, "Visitor")?;
    Ok(Json(visitor))
}

pub async fn create_visitor(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(data): Json<CreateVisitor>,
) -> ApiResult<(StatusCode, Json<Visitor>)> {
    require(ctx.role.can_manage_visitors(), "manage visitors")?;
    data.validate()?;
    require_church(&ctx, data.church_id)?;
    check_inviter(&state.db, data.church_id, data.invited_by).await?;

    let visitor = Visitor::create(&state.db, data).await?;
    tracing::info!(visitor_id = %visitor.id, church_id = %visitor.church_id, "Visitor recorded");
    Ok((StatusCode::CREATED, Json(visitor)))
}

pub async fn update_visitor(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateVisitor>,
) -> ApiResult<Json<Visitor>> {
    require(ctx.role.can_manage_visitors(), "manage visitors")?;
    data.validate()?;

    let visitor = found(Visitor::find_in_scope(&state.db, id, &ctx.scope).await?, "Visitor")?;
    check_inviter(&state.db, visitor.church_id, data.invited_by).await?;

    let visitor = found(Visitor::update(&state.db, id, data).await?, "Visitor")?;
    Ok(Json(visitor))
}

pub async fn update_follow_up(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateFollowUp>,
) -> ApiResult<Json<Visitor>> {
    require(ctx.role.can_manage_visitors(), "manage visitors")?;
    data.validate()?;
    found(Visitor::find_in_scope(&state.db, id, &ctx.scope).await?, "Visitor")?;

    let visitor = found(Visitor::update_follow_up(&state.db, id, data).await?, "Visitor")?;
    tracing::info!(
        visitor_id = %visitor.id,
        follow_up_status = %visitor.follow_up_status,
        updated_by = %ctx.user_id,
        "Visitor follow-up updated"
    );
    Ok(Json(visitor))
}
