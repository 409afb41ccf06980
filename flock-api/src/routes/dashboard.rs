/// Dashboard and calendar
///
/// - `GET /v1/dashboard?weeks=8` - Counters and weekly attendance over the caller's scope
/// - `GET /v1/calendar?start=YYYY-MM-DD&end=YYYY-MM-DD` - Visible events in a range (at most 366 days)

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use flock_shared::{
    auth::access::AccessContext,
    reporting::{
        calendar::{load_calendar, Calendar, CalendarQuery},
        dashboard::{load_dashboard, DashboardParams, DashboardStats},
    },
};
use validator::Validate;

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<Json<DashboardStats>> {
    params.validate()?;
    Ok(Json(load_dashboard(&state.db, &ctx.scope, params).await?))
}

pub async fn calendar(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<Json<Calendar>> {
    query.validate()?;
    Ok(Json(load_calendar(&state.db, &ctx.scope, query).await?))
}
