/// Attendance endpoints
///
/// - `GET /v1/attendance` - List (church, service type, date range, confirmed)
/// - `POST /v1/attendance` - Record one unconfirmed row
/// - `POST /v1/attendance/confirm` - Record and confirm a batch
///
/// The batch is not atomic: the response carries one outcome per row.

use crate::{app::AppState, error::ApiResult, routes::BulkBody};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use flock_shared::{
    auth::access::AccessContext,
    models::{
        attendance::{Attendance, AttendanceFilter, RecordAttendance},
        pagination::{Page, PageParams},
    },
    workflows::{self, BulkReport},
};
use validator::Validate;

pub async fn list_attendance(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(page): Query<PageParams>,
    Query(filter): Query<AttendanceFilter>,
) -> ApiResult<Json<Page<Attendance>>> {
    page.validate()?;
    Ok(Json(Attendance::list(&state.db, &ctx.scope, &filter, page).await?))
}

pub async fn record_attendance(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(data): Json<RecordAttendance>,
) -> ApiResult<(StatusCode, Json<Attendance>)> {
    let row = workflows::attendance::record_attendance(&state.db, &ctx, data).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn confirm_attendance(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(body): Json<BulkBody<RecordAttendance>>,
) -> ApiResult<Json<BulkReport>> {
    let report = workflows::attendance::bulk_confirm_attendance(&state.db, &ctx, body.rows).await?;
    Ok(Json(report))
}
