/// Missionary report endpoints
///
/// - `GET /v1/missionary-reports` - List (church, year)
/// - `POST /v1/missionary-reports` - Submit; replaces the church's report for the same month
/// - `GET /v1/missionary-reports/:id` - Get
/// - `PUT /v1/missionary-reports/:id` - Correct counters or notes

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use flock_shared::{
    auth::{
        access::AccessContext,
        authorization::{found, require, require_church},
    },
    models::{
        missionary_report::{
            MissionaryReport, MissionaryReportFilter, SubmitMissionaryReport,
            UpdateMissionaryReport,
        },
        pagination::{Page, PageParams},
    },
};
use uuid::Uuid;
use validator::Validate;

pub async fn list_reports(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(page): Query<PageParams>,
    Query(filter): Query<MissionaryReportFilter>,
) -> ApiResult<Json<Page<MissionaryReport>>> {
    page.validate()?;
    Ok(Json(MissionaryReport::list(&state.db, &ctx.scope, &filter, page).await?))
}

pub async fn get_report(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MissionaryReport>> {
    let report = found(
        MissionaryReport::find_in_scope(&state.db, id, &ctx.scope).await?,
        "Missionary report",
    )?;
    Ok(Json(report))
}

pub async fn submit_report(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(data): Json<SubmitMissionaryReport>,
) -> ApiResult<Json<MissionaryReport>> {
    require(ctx.role.can_submit_missionary_reports(), "submit missionary reports")?;
    data.validate()?;
    require_church(&ctx, data.church_id)?;

    let report = MissionaryReport::upsert(&state.db, data, ctx.user_id).await?;
    tracing::info!(
        report_id = %report.id,
        church_id = %report.church_id,
        year = report.period_year,
        month = report.period_month,
        submitted_by = %ctx.user_id,
        "Missionary report submitted"
    );
    Ok(Json(report))
}

pub async fn update_report(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateMissionaryReport>,
) -> ApiResult<Json<MissionaryReport>> {
    require(ctx.role.can_submit_missionary_reports(), "submit missionary reports")?;
    data.validate()?;
    found(
        MissionaryReport::find_in_scope(&state.db, id, &ctx.scope).await?,
        "Missionary report",
    )?;

    let report = found(
        MissionaryReport::update(&state.db, id, data, ctx.user_id).await?,
        "Missionary report",
    )?;
    Ok(Json(report))
}
