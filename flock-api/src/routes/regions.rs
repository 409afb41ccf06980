/// Fields and districts
///
/// Readable by every authenticated user; only superadmins and admins create
/// them.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use flock_shared::{
    auth::{access::AccessContext, authorization::require},
    models::region::{District, Field},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct NameRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
}

pub async fn list_fields(State(state): State<AppState>) -> ApiResult<Json<Vec<Field>>> {
    Ok(Json(Field::list(&state.db).await?))
}

pub async fn create_field(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(req): Json<NameRequest>,
) -> ApiResult<(StatusCode, Json<Field>)> {
    require(ctx.role.can_manage_churches(), "manage fields")?;
    req.validate()?;

    let field = Field::create(&state.db, req.name.trim()).await?;
    tracing::info!(field_id = %field.id, created_by = %ctx.user_id, "Field created");
    Ok((StatusCode::CREATED, Json(field)))
}

pub async fn list_districts(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> ApiResult<Json<Vec<District>>> {
    if Field::find_by_id(&state.db, field_id).await?.is_none() {
        return Err(ApiError::NotFound("Field not found".to_string()));
    }
    Ok(Json(District::list_by_field(&state.db, field_id).await?))
}

pub async fn create_district(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(field_id): Path<Uuid>,
    Json(req): Json<NameRequest>,
) -> ApiResult<(StatusCode, Json<District>)> {
    require(ctx.role.can_manage_churches(), "manage districts")?;
    req.validate()?;

    if Field::find_by_id(&state.db, field_id).await?.is_none() {
        return Err(ApiError::NotFound("Field not found".to_string()));
    }

    let district = District::create(&state.db, field_id, req.name.trim()).await?;
    tracing::info!(district_id = %district.id, field_id = %field_id, "District created");
    Ok((StatusCode::CREATED, Json(district)))
}
