/// Dashboard counters and weekly attendance
///
/// Every number is computed over the caller's scope only.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::auth::scope::ChurchScope;
use crate::models::attendance::Attendance;
use crate::models::member::MemberStatus;
use crate::models::transfer::TransferRequest;
use crate::models::visitor::FollowUpStatus;

pub const DEFAULT_WEEKS: i32 = 8;

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct DashboardParams {
    #[serde(default = "default_weeks")]
    #[validate(range(min = 1, max = 52, message = "weeks must be between 1 and 52"))]
    pub weeks: i32,
}

fn default_weeks() -> i32 {
    DEFAULT_WEEKS
}

impl Default for DashboardParams {
    fn default() -> Self {
        Self {
            weeks: DEFAULT_WEEKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyAttendance {
    /// Monday of the week
    pub week_start: NaiveDate,
    pub attended: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub churches: i64,
    pub members_total: i64,
    pub members_by_status: BTreeMap<&'static str, i64>,
    pub visitors_by_follow_up: BTreeMap<&'static str, i64>,
    pub pending_transfers: i64,
    pub weekly_attendance: Vec<WeeklyAttendance>,
}

/// Builds a zero-filled count map over `keys` from grouped rows
///
/// Rows whose key is not listed are ignored.
fn count_map(keys: &[&'static str], rows: Vec<(String, i64)>) -> BTreeMap<&'static str, i64> {
    let mut counts: BTreeMap<&'static str, i64> = keys.iter().map(|key| (*key, 0)).collect();
    for (key, count) in rows {
        if let Some(slot) = keys.iter().find(|k| **k == key).and_then(|k| counts.get_mut(k)) {
            *slot += count;
        }
    }
    counts
}

async fn grouped_counts(
    pool: &PgPool,
    scope: &ChurchScope,
    table: &str,
    column: &str,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT t.{column}, COUNT(*) FROM {table} t WHERE TRUE"
    ));
    scope.push_filter(&mut query, "t.church_id");
    query.push(format!(" GROUP BY t.{column}"));

    query.build_query_as::<(String, i64)>().fetch_all(pool).await
}

pub async fn load_dashboard(
    pool: &PgPool,
    scope: &ChurchScope,
    params: DashboardParams,
) -> Result<DashboardStats, sqlx::Error> {
    let mut churches = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM churches c WHERE c.is_active");
    scope.push_filter(&mut churches, "c.id");
    let churches: i64 = churches.build_query_scalar().fetch_one(pool).await?;

    let member_statuses: Vec<&'static str> = MemberStatus::ALL.iter().map(|s| s.as_str()).collect();
    let members_by_status = count_map(
        &member_statuses,
        grouped_counts(pool, scope, "members", "status").await?,
    );

    let follow_up_statuses: Vec<&'static str> =
        FollowUpStatus::ALL.iter().map(|s| s.as_str()).collect();
    let visitors_by_follow_up = count_map(
        &follow_up_statuses,
        grouped_counts(pool, scope, "visitors", "follow_up_status").await?,
    );

    let pending_transfers = TransferRequest::count_pending(pool, scope).await?;

    let weekly_attendance = Attendance::weekly_counts(pool, scope, params.weeks)
        .await?
        .into_iter()
        .map(|(week_start, attended)| WeeklyAttendance {
            week_start,
            attended,
        })
        .collect();

    Ok(DashboardStats {
        churches,
        members_total: members_by_status.values().sum(),
        members_by_status,
        visitors_by_follow_up,
        pending_transfers,
        weekly_attendance,
    })
}
