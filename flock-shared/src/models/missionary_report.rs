/// Monthly missionary activity reports
///
/// One report per church per month. Submitting again for the same period
/// replaces the counters of the existing report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::pagination::{Page, PageParams};
use crate::auth::scope::ChurchScope;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MissionaryReport {
    pub id: Uuid,
    pub church_id: Uuid,
    pub period_year: i32,
    pub period_month: i32,
    pub bible_studies: i32,
    pub home_visits: i32,
    pub literature_distributed: i32,
    pub baptisms: i32,
    pub prayer_meetings: i32,
    pub community_services: i32,
    pub notes: Option<String>,
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitMissionaryReport {
    pub church_id: Uuid,

    #[validate(range(min = 2000, max = 2100, message = "Year must be between 2000 and 2100"))]
    pub period_year: i32,

    #[validate(range(min = 1, max = 12, message = "Month must be between 1 and 12"))]
    pub period_month: i32,

    #[serde(default)]
    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub bible_studies: i32,

    #[serde(default)]
    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub home_visits: i32,

    #[serde(default)]
    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub literature_distributed: i32,

    #[serde(default)]
    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub baptisms: i32,

    #[serde(default)]
    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub prayer_meetings: i32,

    #[serde(default)]
    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub community_services: i32,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Counter corrections on an existing report
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMissionaryReport {
    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub bible_studies: Option<i32>,

    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub home_visits: Option<i32>,

    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub literature_distributed: Option<i32>,

    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub baptisms: Option<i32>,

    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub prayer_meetings: Option<i32>,

    #[validate(range(min = 0, message = "Counters cannot be negative"))]
    pub community_services: Option<i32>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissionaryReportFilter {
    pub church_id: Option<Uuid>,
    pub year: Option<i32>,
}

impl MissionaryReportFilter {
    fn push(&self, builder: &mut QueryBuilder<'_, Postgres>, scope: &ChurchScope) {
        scope.restrict_to(self.church_id).push_filter(builder, "r.church_id");

        if let Some(year) = self.year {
            builder.push(" AND r.period_year = ");
            builder.push_bind(year);
        }
    }
}

const REPORT_COLUMNS: &str = "id, church_id, period_year, period_month, bible_studies, home_visits, \
                              literature_distributed, baptisms, prayer_meetings, \
                              community_services, notes, submitted_by, created_at, updated_at";

impl MissionaryReport {
    /// Inserts the report for its period, or replaces the existing one
    pub async fn upsert(
        pool: &PgPool,
        data: SubmitMissionaryReport,
        submitted_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MissionaryReport>(&format!(
            "INSERT INTO missionary_reports (church_id, period_year, period_month, bible_studies,
                                             home_visits, literature_distributed, baptisms,
                                             prayer_meetings, community_services, notes,
                                             submitted_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (church_id, period_year, period_month) DO UPDATE SET
                 bible_studies = EXCLUDED.bible_studies,
                 home_visits = EXCLUDED.home_visits,
                 literature_distributed = EXCLUDED.literature_distributed,
                 baptisms = EXCLUDED.baptisms,
                 prayer_meetings = EXCLUDED.prayer_meetings,
                 community_services = EXCLUDED.community_services,
                 notes = EXCLUDED.notes,
                 submitted_by = EXCLUDED.submitted_by,
                 updated_at = NOW()
             RETURNING {REPORT_COLUMNS}"
        ))
        .bind(data.church_id)
        .bind(data.period_year)
        .bind(data.period_month)
        .bind(data.bible_studies)
        .bind(data.home_visits)
        .bind(data.literature_distributed)
        .bind(data.baptisms)
        .bind(data.prayer_meetings)
        .bind(data.community_services)
        .bind(data.notes)
        .bind(submitted_by)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MissionaryReport>(&format!(
            "SELECT {REPORT_COLUMNS} FROM missionary_reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_in_scope(
        pool: &PgPool,
        id: Uuid,
        scope: &ChurchScope,
    ) -> Result<Option<Self>, sqlx::Error> {
        Ok(Self::find_by_id(pool, id)
            .await?
            .filter(|report| scope.contains(report.church_id)))
    }

    pub async fn list(
        pool: &PgPool,
        scope: &ChurchScope,
        filter: &MissionaryReportFilter,
        page: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        if scope.is_empty() {
            return Ok(Page::empty(page));
        }

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {REPORT_COLUMNS} FROM missionary_reports r WHERE TRUE"
        ));
        filter.push(&mut query, scope);
        query.push(" ORDER BY r.period_year DESC, r.period_month DESC LIMIT ");
        query.push_bind(page.limit);
        query.push(" OFFSET ");
        query.push_bind(page.offset);

        let reports = query.build_query_as::<MissionaryReport>().fetch_all(pool).await?;

        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM missionary_reports r WHERE TRUE");
        filter.push(&mut count, scope);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok(Page::new(reports, total, page))
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateMissionaryReport,
        submitted_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MissionaryReport>(&format!(
            "UPDATE missionary_reports SET
                 bible_studies = COALESCE($2, bible_studies),
                 home_visits = COALESCE($3, home_visits),
                 literature_distributed = COALESCE($4, literature_distributed),
                 baptisms = COALESCE($5, baptisms),
                 prayer_meetings = COALESCE($6, prayer_meetings),
                 community_services = COALESCE($7, community_services),
                 notes = COALESCE($8, notes),
                 submitted_by = $9,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {REPORT_COLUMNS}"
        ))
        .bind(id)
        .bind(data.bible_studies)
        .bind(data.home_visits)
        .bind(data.literature_distributed)
        .bind(data.baptisms)
        .bind(data.prayer_meetings)
        .bind(data.community_services)
        .bind(data.notes)
        .bind(submitted_by)
        .fetch_optional(pool)
        .await
    }
}
