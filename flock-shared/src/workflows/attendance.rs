/// Attendance recording and bulk confirmation
///
/// Every row is checked the same way whether it arrives alone or in a batch:
/// the form must validate, the church must be in the caller's scope, and the
/// attendee must belong to that church. An attendee of any other church is
/// reported as not found, exactly like an id that does not exist.

use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::{check_batch_size, outcome, BulkReport, WorkflowError};
use crate::auth::access::AccessContext;
use crate::auth::authorization::{require, require_church, AuthzError};
use crate::models::attendance::{Attendance, Attendee, RecordAttendance};
use crate::models::member::Member;
use crate::models::visitor::Visitor;

async fn check_row(
    pool: &PgPool,
    ctx: &AccessContext,
    data: &RecordAttendance,
) -> Result<(), WorkflowError> {
    data.validate()?;
    require_church(ctx, data.church_id)?;

    let (attendee_church, kind): (Option<Uuid>, &'static str) = match data.attendee() {
        Some(Attendee::Member(id)) => (
            Member::find_by_id(pool, id).await?.map(|member| member.church_id),
            "Member",
        ),
        Some(Attendee::Visitor(id)) => (
            Visitor::find_by_id(pool, id).await?.map(|visitor| visitor.church_id),
            "Visitor",
        ),
        None => {
            return Err(WorkflowError::Invalid(
                "Exactly one of member_id or visitor_id is required".to_string(),
            ))
        }
    };

    if attendee_church != Some(data.church_id) {
        return Err(AuthzError::NotFound(kind).into());
    }
    Ok(())
}

/// Records a single unconfirmed attendance row
pub async fn record_attendance(
    pool: &PgPool,
    ctx: &AccessContext,
    data: RecordAttendance,
) -> Result<Attendance, WorkflowError> {
    require(ctx.role.can_record_attendance(), "record attendance")?;
    check_row(pool, ctx, &data).await?;

    let row = Attendance::upsert(pool, &data, false, ctx.user_id).await?;
    tracing::debug!(attendance_id = %row.id, church_id = %row.church_id, "Attendance recorded");
    Ok(row)
}

/// Records and confirms a batch of attendance rows
pub async fn bulk_confirm_attendance(
    pool: &PgPool,
    ctx: &AccessContext,
    rows: Vec<RecordAttendance>,
) -> Result<BulkReport, WorkflowError> {
    require(ctx.role.can_record_attendance(), "confirm attendance")?;
    check_batch_size(rows.len())?;

    let mut outcomes = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let result = match check_row(pool, ctx, &row).await {
            Ok(()) => Attendance::upsert(pool, &row, true, ctx.user_id)
                .await
                .map_err(WorkflowError::from),
            Err(err) => Err(err),
        };
        outcomes.push(outcome(index, result, |attendance| attendance.id));
    }

    let report = BulkReport::from_rows(outcomes);
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        confirmed_by = %ctx.user_id,
        "Bulk attendance confirmation processed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::scope::ChurchScope;
    use crate::models::attendance::ServiceType;
    use crate::models::user::Role;
    use crate::workflows::RowResult;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn ctx(role: Role, scope: ChurchScope) -> AccessContext {
        AccessContext {
            user_id: Uuid::new_v4(),
            email: "deacon@example.org".to_string(),
            role,
            church_id: None,
            district_id: None,
            field_id: None,
            scope,
        }
    }

    fn row(church_id: Uuid, member_id: Option<Uuid>, visitor_id: Option<Uuid>) -> RecordAttendance {
        RecordAttendance {
            church_id,
            member_id,
            visitor_id,
            service_date: NaiveDate::from_ymd_opt(2025, 6, 7).unwrap(),
            service_type: ServiceType::SabbathSchool,
            attended: true,
        }
    }

    fn lazy_pool() -> PgPool {
        PgPool::connect_lazy("postgres://localhost/flock_unused").unwrap()
    }

    #[tokio::test]
    async fn test_members_cannot_record() {
        let pool = lazy_pool();
        let church = Uuid::new_v4();
        let err = record_attendance(
            &pool,
            &ctx(Role::Member, ChurchScope::from_ids([church])),
            row(church, Some(Uuid::new_v4()), None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Authz(AuthzError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_bulk_rows_fail_independently_without_database() {
        let pool = lazy_pool();
        let own = Uuid::new_v4();
        let caller = ctx(Role::ChurchSecretary, ChurchScope::from_ids([own]));

        let report = bulk_confirm_attendance(
            &pool,
            &caller,
            vec![
                row(own, None, None),
                row(Uuid::new_v4(), Some(Uuid::new_v4()), None),
                row(own, Some(Uuid::new_v4()), Some(Uuid::new_v4())),
            ],
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 3);
        assert!(matches!(&report.rows[0].result, RowResult::Error { reason } if reason.contains("member_id")));
        assert_eq!(
            report.rows[1].result,
            RowResult::Error { reason: "Church not found".to_string() }
        );
        assert_eq!(report.rows[2].index, 2);
    }
}
