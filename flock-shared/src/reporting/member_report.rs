/// Ad-hoc member reports
///
/// The caller picks columns from a fixed list and a set of filters. Each
/// column maps to a fixed SQL expression, so nothing the caller sends is ever
/// spliced into the query text; filter values are bound.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::scope::ChurchScope;
use crate::models::like_pattern;
use crate::models::member::{MemberStatus, SpiritualStatus};

/// Rows returned by one report at most
pub const MAX_REPORT_ROWS: i64 = 5_000;

/// Columns a report may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportField {
    Id,
    FirstName,
    LastName,
    FullName,
    Gender,
    DateOfBirth,
    Age,
    Phone,
    Email,
    Address,
    MaritalStatus,
    BaptismDate,
    SpiritualStatus,
    PhysicalStatus,
    Status,
    ChurchId,
    ChurchName,
}

impl ReportField {
    /// Key of this column in each output row
    pub fn key(&self) -> &'static str {
        match self {
            ReportField::Id => "id",
            ReportField::FirstName => "first_name",
            ReportField::LastName => "last_name",
            ReportField::FullName => "full_name",
            ReportField::Gender => "gender",
            ReportField::DateOfBirth => "date_of_birth",
            ReportField::Age => "age",
            ReportField::Phone => "phone",
            ReportField::Email => "email",
            ReportField::Address => "address",
            ReportField::MaritalStatus => "marital_status",
            ReportField::BaptismDate => "baptism_date",
            ReportField::SpiritualStatus => "spiritual_status",
            ReportField::PhysicalStatus => "physical_status",
            ReportField::Status => "status",
            ReportField::ChurchId => "church_id",
            ReportField::ChurchName => "church_name",
        }
    }

    fn expression(&self) -> &'static str {
        match self {
            ReportField::Id => "m.id",
            ReportField::FirstName => "m.first_name",
            ReportField::LastName => "m.last_name",
            ReportField::FullName => "m.first_name || ' ' || m.last_name",
            ReportField::Gender => "m.gender",
            ReportField::DateOfBirth => "m.date_of_birth",
            ReportField::Age => "m.age",
            ReportField::Phone => "m.phone",
            ReportField::Email => "m.email",
            ReportField::Address => "m.address",
            ReportField::MaritalStatus => "m.marital_status",
            ReportField::BaptismDate => "m.baptism_date",
            ReportField::SpiritualStatus => "m.spiritual_status",
            ReportField::PhysicalStatus => "m.physical_status",
            ReportField::Status => "m.status",
            ReportField::ChurchId => "m.church_id",
            ReportField::ChurchName => "c.name",
        }
    }
}

fn validate_age_range(filters: &MemberReportFilters) -> Result<(), ValidationError> {
    if let (Some(min), Some(max)) = (filters.min_age, filters.max_age) {
        if min > max {
            return Err(ValidationError::new("age_range")
                .with_message("min_age must not exceed max_age".into()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_age_range"))]
pub struct MemberReportFilters {
    pub church_id: Option<Uuid>,
    pub status: Option<MemberStatus>,
    pub spiritual_status: Option<SpiritualStatus>,

    #[validate(length(max = 16, message = "Gender must be at most 16 characters"))]
    pub gender: Option<String>,

    #[validate(range(min = 0, max = 150, message = "Age must be between 0 and 150"))]
    pub min_age: Option<i32>,

    #[validate(range(min = 0, max = 150, message = "Age must be between 0 and 150"))]
    pub max_age: Option<i32>,

    #[validate(length(max = 200, message = "Search must be at most 200 characters"))]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MemberReportRequest {
    #[validate(length(min = 1, max = 17, message = "Select between 1 and 17 fields"))]
    pub fields: Vec<ReportField>,

    #[serde(default)]
    #[validate(nested)]
    pub filters: MemberReportFilters,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberReport {
    pub fields: Vec<ReportField>,
    pub rows: Vec<serde_json::Value>,

    /// Whether more rows matched than were returned
    pub truncated: bool,
}

/// Requested fields without duplicates, in request order
fn distinct_fields(fields: &[ReportField]) -> Vec<ReportField> {
    let mut distinct = Vec::with_capacity(fields.len());
    for field in fields {
        if !distinct.contains(field) {
            distinct.push(*field);
        }
    }
    distinct
}

fn build_query<'a>(
    fields: &[ReportField],
    filters: &'a MemberReportFilters,
    scope: &ChurchScope,
) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT jsonb_build_object(");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            query.push(", ");
        }
        query.push(format!("'{}', {}", field.key(), field.expression()));
    }
    query.push(") FROM members m JOIN churches c ON c.id = m.church_id WHERE TRUE");

    scope.restrict_to(filters.church_id).push_filter(&mut query, "m.church_id");

    if let Some(status) = filters.status {
        query.push(" AND m.status = ");
        query.push_bind(status.as_str());
    }
    if let Some(spiritual_status) = filters.spiritual_status {
        query.push(" AND m.spiritual_status = ");
        query.push_bind(spiritual_status.as_str());
    }
    if let Some(gender) = filters.gender.as_deref() {
        query.push(" AND m.gender = ");
        query.push_bind(gender);
    }
    if let Some(min_age) = filters.min_age {
        query.push(" AND m.age >= ");
        query.push_bind(min_age);
    }
    if let Some(max_age) = filters.max_age {
        query.push(" AND m.age <= ");
        query.push_bind(max_age);
    }
    if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        query.push(" AND (m.first_name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR m.last_name ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }

    query.push(" ORDER BY m.last_name, m.first_name LIMIT ");
    query.push_bind(MAX_REPORT_ROWS + 1);
    query
}

pub async fn run_member_report(
    pool: &PgPool,
    scope: &ChurchScope,
    request: &MemberReportRequest,
) -> Result<MemberReport, sqlx::Error> {
    let fields = distinct_fields(&request.fields);

    if scope.is_empty() {
        return Ok(MemberReport {
            fields,
            rows: Vec::new(),
            truncated: false,
        });
    }

    let mut query = build_query(&fields, &request.filters, scope);
    let mut rows: Vec<serde_json::Value> = query.build_query_scalar().fetch_all(pool).await?;

    let truncated = rows.len() as i64 > MAX_REPORT_ROWS;
    rows.truncate(MAX_REPORT_ROWS as usize);

    tracing::debug!(fields = fields.len(), rows = rows.len(), truncated, "Member report generated");

    Ok(MemberReport {
        fields,
        rows,
        truncated,
    })
}
