/// Service attendance rows
///
/// Each row records one attendee (a member or a visitor, never both) at one
/// service. A second recording of the same attendee, date and service type
/// updates the existing row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::pagination::{Page, PageParams};
use super::text_enum;
use crate::auth::scope::ChurchScope;

text_enum! {
    /// Kind of service attended
    pub enum ServiceType {
        SabbathSchool => "sabbath_school",
        DivineService => "divine_service",
        PrayerMeeting => "prayer_meeting",
        Youth => "youth",
        Special => "special",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub church_id: Uuid,
    pub member_id: Option<Uuid>,
    pub visitor_id: Option<Uuid>,
    pub service_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub service_type: ServiceType,
    pub attended: bool,
    pub confirmed: bool,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The person an attendance row is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attendee {
    Member(Uuid),
    Visitor(Uuid),
}

fn validate_one_attendee(record: &RecordAttendance) -> Result<(), ValidationError> {
    match record.attendee() {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("attendee")
            .with_message("Exactly one of member_id or visitor_id is required".into())),
    }
}

/// One attendance entry, as recorded singly or inside a bulk confirmation
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_one_attendee"))]
pub struct RecordAttendance {
    pub church_id: Uuid,

    pub member_id: Option<Uuid>,

    pub visitor_id: Option<Uuid>,

    pub service_date: NaiveDate,

    pub service_type: ServiceType,

    #[serde(default = "default_attended")]
    pub attended: bool,
}

fn default_attended() -> bool {
    true
}

impl RecordAttendance {
    /// The single attendee, or None when zero or two ids are set
    pub fn attendee(&self) -> Option<Attendee> {
        match (self.member_id, self.visitor_id) {
            (Some(member_id), None) => Some(Attendee::Member(member_id)),
            (None, Some(visitor_id)) => Some(Attendee::Visitor(visitor_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceFilter {
    pub church_id: Option<Uuid>,
    pub service_type: Option<ServiceType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub confirmed: Option<bool>,
}

impl AttendanceFilter {
    fn push(&self, builder: &mut QueryBuilder<'_, Postgres>, scope: &ChurchScope) {
        scope.restrict_to(self.church_id).push_filter(builder, "a.church_id");

        if let Some(service_type) = self.service_type {
            builder.push(" AND a.service_type = ");
            builder.push_bind(service_type.as_str());
        }
        if let Some(from) = self.from {
            builder.push(" AND a.service_date >= ");
            builder.push_bind(from);
        }
        if let Some(to) = self.to {
            builder.push(" AND a.service_date <= ");
            builder.push_bind(to);
        }
        if let Some(confirmed) = self.confirmed {
            builder.push(" AND a.confirmed = ");
            builder.push_bind(confirmed);
        }
    }
}

const ATTENDANCE_COLUMNS: &str = "id, church_id, member_id, visitor_id, service_date, service_type, \
                                  attended, confirmed, recorded_by, created_at, updated_at";

impl Attendance {
    pub async fn list(
        pool: &PgPool,
        scope: &ChurchScope,
        filter: &AttendanceFilter,
        page: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        if scope.is_empty() {
            return Ok(Page::empty(page));
        }

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE TRUE"
        ));
        filter.push(&mut query, scope);
        query.push(" ORDER BY a.service_date DESC, a.service_type LIMIT ");
        query.push_bind(page.limit);
        query.push(" OFFSET ");
        query.push_bind(page.offset);

        let rows = query.build_query_as::<Attendance>().fetch_all(pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM attendance a WHERE TRUE");
        filter.push(&mut count, scope);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok(Page::new(rows, total, page))
    }

    /// Records attendance, updating the existing row for the same attendee and service
    ///
    /// The row always ends up owned by the recording church, so a member who
    /// transferred is not left on the old church's books. Within the same
    /// church `confirmed` is only ever raised on conflict and a later
    /// unconfirmed recording cannot undo a confirmation; a confirmation made
    /// by another church is not carried over.
    pub async fn upsert(
        pool: &PgPool,
        data: &RecordAttendance,
        confirmed: bool,
        recorded_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let conflict_target = match data.attendee() {
            Some(Attendee::Visitor(_)) => {
                "(visitor_id, service_date, service_type) WHERE visitor_id IS NOT NULL"
            }
            _ => "(member_id, service_date, service_type) WHERE member_id IS NOT NULL",
        };

        sqlx::query_as::<_, Attendance>(&format!(
            "INSERT INTO attendance (church_id, member_id, visitor_id, service_date, service_type,
                                     attended, confirmed, recorded_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT {conflict_target}
             DO UPDATE SET
                 church_id = EXCLUDED.church_id,
                 attended = EXCLUDED.attended,
                 confirmed = CASE
                     WHEN attendance.church_id = EXCLUDED.church_id
                         THEN attendance.confirmed OR EXCLUDED.confirmed
                     ELSE EXCLUDED.confirmed
                 END,
                 recorded_by = EXCLUDED.recorded_by,
                 updated_at = NOW()
             RETURNING {ATTENDANCE_COLUMNS}"
        ))
        .bind(data.church_id)
        .bind(data.member_id)
        .bind(data.visitor_id)
        .bind(data.service_date)
        .bind(data.service_type.as_str())
        .bind(data.attended)
        .bind(confirmed)
        .bind(recorded_by)
        .fetch_one(pool)
        .await
    }

    /// Weekly attended counts for the last `weeks` weeks, oldest first
    ///
    /// Weeks with no rows are present with a zero count.
    pub async fn weekly_counts(
        pool: &PgPool,
        scope: &ChurchScope,
        weeks: i32,
    ) -> Result<Vec<(NaiveDate, i64)>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT w.week_start::date, COUNT(a.id)
             FROM generate_series(
                 date_trunc('week', CURRENT_DATE) - make_interval(weeks => ",
        );
        query.push_bind(weeks - 1);
        query.push(
            "), date_trunc('week', CURRENT_DATE), INTERVAL '1 week') AS w(week_start)
             LEFT JOIN attendance a
                 ON a.service_date >= w.week_start::date
                AND a.service_date < (w.week_start + INTERVAL '1 week')::date
                AND a.attended",
        );
        scope.push_filter(&mut query, "a.church_id");
        query.push(" GROUP BY w.week_start ORDER BY w.week_start");

        query
            .build_query_as::<(NaiveDate, i64)>()
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(member_id: Option<Uuid>, visitor_id: Option<Uuid>) -> RecordAttendance {
        RecordAttendance {
            church_id: Uuid::new_v4(),
            member_id,
            visitor_id,
            service_date: NaiveDate::from_ymd_opt(2025, 6, 7).unwrap(),
            service_type: ServiceType::DivineService,
            attended: true,
        }
    }

    #[test]
    fn test_exactly_one_attendee() {
        let id = Uuid::new_v4();
        assert_eq!(record(Some(id), None).attendee(), Some(Attendee::Member(id)));
        assert_eq!(record(None, Some(id)).attendee(), Some(Attendee::Visitor(id)));
        assert_eq!(record(None, None).attendee(), None);
        assert_eq!(record(Some(id), Some(id)).attendee(), None);
    }

    #[test]
    fn test_validation_rejects_zero_or_two_attendees() {
        assert!(record(Some(Uuid::new_v4()), None).validate().is_ok());
        assert!(record(None, None).validate().is_err());
        assert!(record(Some(Uuid::new_v4()), Some(Uuid::new_v4())).validate().is_err());
    }

    #[test]
    fn test_attended_defaults_to_true() {
        let body = format!(
            r#"{{"church_id":"{}","member_id":"{}","service_date":"2025-06-07","service_type":"youth"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let parsed: RecordAttendance = serde_json::from_str(&body).unwrap();
        assert!(parsed.attended);
        assert_eq!(parsed.service_type, ServiceType::Youth);
    }

    #[test]
    fn test_malformed_date_rejected() {
        let body = format!(
            r#"{{"church_id":"{}","member_id":"{}","service_date":"07/06/2025","service_type":"youth"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        assert!(serde_json::from_str::<RecordAttendance>(&body).is_err());
    }

    #[test]
    fn test_filter_sql() {
        let filter = AttendanceFilter {
            service_type: Some(ServiceType::SabbathSchool),
            confirmed: Some(false),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM attendance a WHERE TRUE");
        filter.push(&mut builder, &ChurchScope::from_ids([Uuid::new_v4()]));
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM attendance a WHERE TRUE AND a.church_id = ANY($1) \
             AND a.service_type = $2 AND a.confirmed = $3"
        );
    }
}
