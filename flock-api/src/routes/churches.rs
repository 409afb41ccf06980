/// Church endpoints
///
/// - `GET /v1/churches` - List churches in scope
/// - `POST /v1/churches` - Create (superadmin, admin)
/// - `GET /v1/churches/:id` - Get one church in scope
/// - `PUT /v1/churches/:id` - Update (superadmin, admin)
/// - `DELETE /v1/churches/:id` - Delete (superadmin, admin)
///
/// Church secretaries do not get a list: they are redirected to their own
/// church. Members may not list churches at all.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use flock_shared::{
    auth::{
        access::AccessContext,
        authorization::{found, require},
    },
    models::{
        church::{Church, ChurchFilter, CreateChurch, UpdateChurch},
        pagination::PageParams,
        region::District,
        user::Role,
    },
};
use uuid::Uuid;
use validator::Validate;

/// What a caller gets from the church list endpoint
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ListAccess {
    List,
    RedirectTo(Uuid),
    Denied,
}

pub(crate) fn list_access(ctx: &AccessContext) -> ListAccess {
    if ctx.role.can_list_churches() {
        return ListAccess::List;
    }
    match (ctx.role, ctx.church_id) {
        (Role::ChurchSecretary, Some(church_id)) => ListAccess::RedirectTo(church_id),
        _ => ListAccess::Denied,
    }
}

pub async fn list_churches(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ChurchFilter>,
) -> ApiResult<Response> {
    match list_access(&ctx) {
        ListAccess::List => {}
        ListAccess::RedirectTo(church_id) => {
            return Ok(Redirect::to(&format!("/v1/churches/{}", church_id)).into_response());
        }
        ListAccess::Denied => return Err(ApiError::Forbidden("Not permitted to list churches".to_string())),
    }

    page.validate()?;
    let churches = Church::list(&state.db, &ctx.scope, &filter, page).await?;
    Ok(Json(churches).into_response())
}

pub async fn get_church(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Church>> {
    let church = found(Church::find_in_scope(&state.db, id, &ctx.scope).await?, "Church")?;
    Ok(Json(church))
}

pub async fn create_church(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(data): Json<CreateChurch>,
) -> ApiResult<(StatusCode, Json<Church>)> {
    require(ctx.role.can_manage_churches(), "manage churches")?;
    data.validate()?;

    let church = Church::create(&state.db, data)
        .await?
        .ok_or_else(|| ApiError::invalid_field("district_id", "District does not exist"))?;

    tracing::info!(church_id = %church.id, created_by = %ctx.user_id, "Church created");
    Ok((StatusCode::CREATED, Json(church)))
}

pub async fn update_church(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateChurch>,
) -> ApiResult<Json<Church>> {
    require(ctx.role.can_manage_churches(), "manage churches")?;
    data.validate()?;

    if let Some(district_id) = data.district_id {
        if District::find_by_id(&state.db, district_id).await?.is_none() {
            return Err(ApiError::invalid_field("district_id", "District does not exist"));
        }
    }

    let church = found(Church::update(&state.db, id, data).await?, "Church")?;
    tracing::info!(church_id = %church.id, updated_by = %ctx.user_id, "Church updated");
    Ok(Json(church))
}

/// Deletes a church that no longer has members or other records
///
/// # Errors
///
/// - `409 Conflict`: Rows still reference the church
pub async fn delete_church(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require(ctx.role.can_manage_churches(), "manage churches")?;

    if !Church::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Church not found".to_string()));
    }

    tracing::info!(church_id = %id, deleted_by = %ctx.user_id, "Church deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flock_shared::auth::scope::ChurchScope;

    fn ctx(role: Role, church_id: Option<Uuid>) -> AccessContext {
        AccessContext {
            user_id: Uuid::new_v4(),
            email: "user@example.org".to_string(),
            role,
            church_id,
            district_id: None,
            field_id: None,
            scope: church_id.map(|id| ChurchScope::from_ids([id])).unwrap_or_else(ChurchScope::none),
        }
    }

    #[test]
    fn test_secretary_redirected_to_own_church() {
        let church_id = Uuid::new_v4();
        assert_eq!(
            list_access(&ctx(Role::ChurchSecretary, Some(church_id))),
            ListAccess::RedirectTo(church_id)
        );
    }

    #[test]
    fn test_secretary_without_church_denied() {
        assert_eq!(list_access(&ctx(Role::ChurchSecretary, None)), ListAccess::Denied);
    }

    #[test]
    fn test_member_denied() {
        assert_eq!(list_access(&ctx(Role::Member, Some(Uuid::new_v4()))), ListAccess::Denied);
        assert_eq!(list_access(&ctx(Role::Unknown, None)), ListAccess::Denied);
    }

    #[test]
    fn test_other_roles_list() {
        for role in [Role::Superadmin, Role::Admin, Role::Pastor, Role::Bibleworker, Role::Coordinator] {
            assert_eq!(list_access(&ctx(role, None)), ListAccess::List);
        }
    }
}
