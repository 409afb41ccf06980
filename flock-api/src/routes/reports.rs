/// Ad-hoc member report
///
/// ```text
/// POST /v1/reports/members
/// {
///   "fields": ["full_name", "age", "church_name"],
///   "filters": { "status": "active", "min_age": 18 }
/// }
/// ```
///
/// Each row holds only the requested fields. Unknown field names are rejected
/// when the body is parsed.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use flock_shared::{
    auth::access::AccessContext,
    reporting::member_report::{run_member_report, MemberReport, MemberReportRequest},
};
use validator::Validate;

pub async fn member_report(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(request): Json<MemberReportRequest>,
) -> ApiResult<Json<MemberReport>> {
    request.validate()?;

    let report = run_member_report(&state.db, &ctx.scope, &request).await?;
    tracing::info!(
        user_id = %ctx.user_id,
        rows = report.rows.len(),
        truncated = report.truncated,
        "Member report run"
    );
    Ok(Json(report))
}
