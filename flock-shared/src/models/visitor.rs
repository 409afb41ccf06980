/// Visitor model and follow-up tracking

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::like_pattern;
use super::pagination::{Page, PageParams};
use super::text_enum;
use crate::auth::scope::ChurchScope;

text_enum! {
    /// Where a visitor stands in the follow-up pipeline
    pub enum FollowUpStatus {
        Pending => "pending",
        Contacted => "contacted",
        Scheduled => "scheduled",
        Completed => "completed",
        NotInterested => "not_interested",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Visitor {
    pub id: Uuid,
    pub church_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub visit_date: NaiveDate,
    /// Member who brought the visitor
    pub invited_by: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub follow_up_status: FollowUpStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateVisitor {
    pub church_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub full_name: String,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,

    pub visit_date: NaiveDate,

    pub invited_by: Option<Uuid>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateVisitor {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub full_name: Option<String>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,

    pub visit_date: Option<NaiveDate>,

    pub invited_by: Option<Uuid>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Follow-up status change, optionally with a note
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateFollowUp {
    pub follow_up_status: FollowUpStatus,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitorFilter {
    pub search: Option<String>,
    pub church_id: Option<Uuid>,
    pub follow_up_status: Option<FollowUpStatus>,
    pub visited_from: Option<NaiveDate>,
    pub visited_to: Option<NaiveDate>,
}

impl VisitorFilter {
    fn push(&self, builder: &mut QueryBuilder<'_, Postgres>, scope: &ChurchScope) {
        scope.restrict_to(self.church_id).push_filter(builder, "v.church_id");

        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            builder.push(" AND v.full_name ILIKE ");
            builder.push_bind(like_pattern(search));
        }
        if let Some(status) = self.follow_up_status {
            builder.push(" AND v.follow_up_status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(from) = self.visited_from {
            builder.push(" AND v.visit_date >= ");
            builder.push_bind(from);
        }
        if let Some(to) = self.visited_to {
            builder.push(" AND v.visit_date <= ");
            builder.push_bind(to);
        }
    }
}

const VISITOR_COLUMNS: &str = "id, church_id, full_name, phone, email, address, visit_date, \
                               invited_by, follow_up_status, notes, created_at, updated_at";

impl Visitor {
    pub async fn create(pool: &PgPool, data: CreateVisitor) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Visitor>(&format!(
            "INSERT INTO visitors (church_id, full_name, phone, email, address, visit_date,
                                   invited_by, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {VISITOR_COLUMNS}"
        ))
        .bind(data.church_id)
        .bind(data.full_name)
        .bind(data.phone)
        .bind(data.email)
        .bind(data.address)
        .bind(data.visit_date)
        .bind(data.invited_by)
        .bind(data.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Visitor>(&format!("SELECT {VISITOR_COLUMNS} FROM visitors WHERE id = $1"))
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
            .filter(|visitor| scope.contains(visitor.church_id)))
    }

    pub async fn list(
        pool: &PgPool,
        scope: &ChurchScope,
        filter: &VisitorFilter,
        page: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        if scope.is_empty() {
            return Ok(Page::empty(page));
        }

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {VISITOR_COLUMNS} FROM visitors v WHERE TRUE"
        ));
        filter.push(&mut query, scope);
        query.push(" ORDER BY v.visit_date DESC, v.full_name LIMIT ");
        query.push_bind(page.limit);
        query.push(" OFFSET ");
        query.push_bind(page.offset);

        let visitors = query.build_query_as::<Visitor>().fetch_all(pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM visitors v WHERE TRUE");
        filter.push(&mut count, scope);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok(Page::new(visitors, total, page))
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateVisitor,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Visitor>(&format!(
            "UPDATE visitors SET
                 full_name = COALESCE($2, full_name),
                 phone = COALESCE($3, phone),
                 email = COALESCE($4, email),
                 address = COALESCE($5, address),
                 visit_date = COALESCE($6, visit_date),
                 invited_by = COALESCE($7, invited_by),
                 notes = COALESCE($8, notes),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {VISITOR_COLUMNS}"
        ))
        .bind(id)
        .bind(data.full_name)
        .bind(data.phone)
        .bind(data.email)
        .bind(data.address)
        .bind(data.visit_date)
        .bind(data.invited_by)
        .bind(data.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_follow_up(
        pool: &PgPool,
        id: Uuid,
        data: UpdateFollowUp,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Visitor>(&format!(
            "UPDATE visitors SET
                 follow_up_status = $2,
                 notes = COALESCE($3, notes),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {VISITOR_COLUMNS}"
        ))
        .bind(id)
        .bind(data.follow_up_status.as_str())
        .bind(data.notes)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_up_status_values() {
        assert_eq!(FollowUpStatus::NotInterested.as_str(), "not_interested");
        let parsed: UpdateFollowUp =
            serde_json::from_str(r#"{"follow_up_status":"scheduled"}"#).unwrap();
        assert_eq!(parsed.follow_up_status, FollowUpStatus::Scheduled);
        assert!(serde_json::from_str::<UpdateFollowUp>(r#"{"follow_up_status":"lost"}"#).is_err());
    }

    #[test]
    fn test_create_visitor_validation() {
        let visitor = CreateVisitor {
            church_id: Uuid::new_v4(),
            full_name: "Cornelius".to_string(),
            phone: Some("0".repeat(31)),
            email: None,
            address: None,
            visit_date: NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            invited_by: None,
            notes: None,
        };
        let errors = visitor.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("phone"));
    }

    #[test]
    fn test_filter_date_range_sql() {
        let filter = VisitorFilter {
            follow_up_status: Some(FollowUpStatus::Pending),
            visited_from: NaiveDate::from_ymd_opt(2025, 1, 1),
            visited_to: NaiveDate::from_ymd_opt(2025, 1, 31),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM visitors v WHERE TRUE");
        filter.push(&mut builder, &ChurchScope::All);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM visitors v WHERE TRUE AND v.follow_up_status = $1 \
             AND v.visit_date >= $2 AND v.visit_date <= $3"
        );
    }
}
