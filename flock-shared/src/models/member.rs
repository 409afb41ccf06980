/// Member model and database operations
///
/// A member belongs to exactly one church at a time. Moving a member between
/// churches goes through a transfer request; `church_id` is not part of
/// [`UpdateMember`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE members (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     church_id UUID NOT NULL REFERENCES churches(id),
///     first_name VARCHAR(200) NOT NULL,
///     last_name VARCHAR(200) NOT NULL,
///     gender VARCHAR(16),
///     date_of_birth DATE,
///     age INTEGER CHECK (age IS NULL OR (age >= 0 AND age <= 150)),
///     phone VARCHAR(30),
///     email VARCHAR(255),
///     address VARCHAR(500),
///     marital_status VARCHAR(16),
///     baptism_date DATE,
///     spiritual_status VARCHAR(32) NOT NULL DEFAULT 'interested',
///     physical_status VARCHAR(16) NOT NULL DEFAULT 'healthy',
///     status VARCHAR(16) NOT NULL DEFAULT 'active',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::like_pattern;
use super::pagination::{Page, PageParams};
use super::text_enum;
use crate::auth::scope::ChurchScope;

/// Ages accepted on member forms
pub const MAX_AGE: i32 = 150;

text_enum! {
    /// Spiritual standing
    pub enum SpiritualStatus {
        Baptized => "baptized",
        ProfessionOfFaith => "profession_of_faith",
        Interested => "interested",
        Backslidden => "backslidden",
    }
}

text_enum! {
    /// Physical condition, used for visitation planning
    pub enum PhysicalStatus {
        Healthy => "healthy",
        Sick => "sick",
        Disabled => "disabled",
        Elderly => "elderly",
    }
}

text_enum! {
    /// Membership lifecycle
    pub enum MemberStatus {
        Active => "active",
        Inactive => "inactive",
        Transferred => "transferred",
        Deceased => "deceased",
        Removed => "removed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: Uuid,
    pub church_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i32>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub marital_status: Option<String>,
    pub baptism_date: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub spiritual_status: SpiritualStatus,
    #[sqlx(try_from = "String")]
    pub physical_status: PhysicalStatus,
    #[sqlx(try_from = "String")]
    pub status: MemberStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

fn validate_gender(gender: &str) -> Result<(), ValidationError> {
    match gender {
        "male" | "female" => Ok(()),
        _ => Err(ValidationError::new("gender").with_message("Gender must be male or female".into())),
    }
}

fn validate_marital_status(status: &str) -> Result<(), ValidationError> {
    match status {
        "single" | "married" | "widowed" | "divorced" => Ok(()),
        _ => Err(ValidationError::new("marital_status")
            .with_message("Marital status must be single, married, widowed or divorced".into())),
    }
}

fn validate_not_in_future(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date > Utc::now().date_naive() {
        return Err(ValidationError::new("future_date").with_message("Date cannot be in the future".into()));
    }
    Ok(())
}

/// Member creation form
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMember {
    pub church_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "First name must be 1-200 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 200, message = "Last name must be 1-200 characters"))]
    pub last_name: String,

    #[validate(custom(function = "validate_gender"))]
    pub gender: Option<String>,

    #[validate(custom(function = "validate_not_in_future"))]
    pub date_of_birth: Option<NaiveDate>,

    #[validate(range(min = 0, max = 150, message = "Age must be between 0 and 150"))]
    pub age: Option<i32>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,

    #[validate(custom(function = "validate_marital_status"))]
    pub marital_status: Option<String>,

    #[validate(custom(function = "validate_not_in_future"))]
    pub baptism_date: Option<NaiveDate>,

    #[serde(default = "default_spiritual_status")]
    pub spiritual_status: SpiritualStatus,

    #[serde(default = "default_physical_status")]
    pub physical_status: PhysicalStatus,

    #[serde(default = "default_member_status")]
    pub status: MemberStatus,
}

fn default_spiritual_status() -> SpiritualStatus {
    SpiritualStatus::Interested
}

fn default_physical_status() -> PhysicalStatus {
    PhysicalStatus::Healthy
}

fn default_member_status() -> MemberStatus {
    MemberStatus::Active
}

/// Member edit form; None leaves a column unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMember {
    #[validate(length(min = 1, max = 200, message = "First name must be 1-200 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Last name must be 1-200 characters"))]
    pub last_name: Option<String>,

    #[validate(custom(function = "validate_gender"))]
    pub gender: Option<String>,

    #[validate(custom(function = "validate_not_in_future"))]
    pub date_of_birth: Option<NaiveDate>,

    #[validate(range(min = 0, max = 150, message = "Age must be between 0 and 150"))]
    pub age: Option<i32>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,

    #[validate(custom(function = "validate_marital_status"))]
    pub marital_status: Option<String>,

    #[validate(custom(function = "validate_not_in_future"))]
    pub baptism_date: Option<NaiveDate>,

    pub spiritual_status: Option<SpiritualStatus>,

    pub physical_status: Option<PhysicalStatus>,

    pub status: Option<MemberStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    /// Matches first or last name
    pub search: Option<String>,
    pub church_id: Option<Uuid>,
    pub status: Option<MemberStatus>,
    pub spiritual_status: Option<SpiritualStatus>,
}

impl MemberFilter {
    fn push(&self, builder: &mut QueryBuilder<'_, Postgres>, scope: &ChurchScope) {
        scope.restrict_to(self.church_id).push_filter(builder, "m.church_id");

        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder.push(" AND (m.first_name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR m.last_name ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
        if let Some(status) = self.status {
            builder.push(" AND m.status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(spiritual_status) = self.spiritual_status {
            builder.push(" AND m.spiritual_status = ");
            builder.push_bind(spiritual_status.as_str());
        }
    }
}

const MEMBER_COLUMNS: &str = "id, church_id, first_name, last_name, gender, date_of_birth, age, \
                              phone, email, address, marital_status, baptism_date, \
                              spiritual_status, physical_status, status, created_at, updated_at";

impl Member {
    pub async fn create(pool: &PgPool, data: CreateMember) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "INSERT INTO members (church_id, first_name, last_name, gender, date_of_birth, age,
                                  phone, email, address, marital_status, baptism_date,
                                  spiritual_status, physical_status, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(data.church_id)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.gender)
        .bind(data.date_of_birth)
        .bind(data.age)
        .bind(data.phone)
        .bind(data.email)
        .bind(data.address)
        .bind(data.marital_status)
        .bind(data.baptism_date)
        .bind(data.spiritual_status.as_str())
        .bind(data.physical_status.as_str())
        .bind(data.status.as_str())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a member whose church lies inside `scope`
    pub async fn find_in_scope(
        pool: &PgPool,
        id: Uuid,
        scope: &ChurchScope,
    ) -> Result<Option<Self>, sqlx::Error> {
        Ok(Self::find_by_id(pool, id)
            .await?
            .filter(|member| scope.contains(member.church_id)))
    }

    pub async fn list(
        pool: &PgPool,
        scope: &ChurchScope,
        filter: &MemberFilter,
        page: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        if scope.is_empty() {
            return Ok(Page::empty(page));
        }

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {MEMBER_COLUMNS} FROM members m WHERE TRUE"
        ));
        filter.push(&mut query, scope);
        query.push(" ORDER BY m.last_name, m.first_name LIMIT ");
        query.push_bind(page.limit);
        query.push(" OFFSET ");
        query.push_bind(page.offset);

        let members = query.build_query_as::<Member>().fetch_all(pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM members m WHERE TRUE");
        filter.push(&mut count, scope);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok(Page::new(members, total, page))
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateMember,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "UPDATE members SET
                 first_name = COALESCE($2, first_name),
                 last_name = COALESCE($3, last_name),
                 gender = COALESCE($4, gender),
                 date_of_birth = COALESCE($5, date_of_birth),
                 age = COALESCE($6, age),
                 phone = COALESCE($7, phone),
                 email = COALESCE($8, email),
                 address = COALESCE($9, address),
                 marital_status = COALESCE($10, marital_status),
                 baptism_date = COALESCE($11, baptism_date),
                 spiritual_status = COALESCE($12, spiritual_status),
                 physical_status = COALESCE($13, physical_status),
                 status = COALESCE($14, status),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(id)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.gender)
        .bind(data.date_of_birth)
        .bind(data.age)
        .bind(data.phone)
        .bind(data.email)
        .bind(data.address)
        .bind(data.marital_status)
        .bind(data.baptism_date)
        .bind(data.spiritual_status.map(|s| s.as_str()))
        .bind(data.physical_status.map(|s| s.as_str()))
        .bind(data.status.map(|s| s.as_str()))
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
